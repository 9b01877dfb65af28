//! Forecast sampling
//!
//! Collects N independent forecast completions for one question prompt.
//! Individual sample failures (after retries) or completions with no
//! extractable probability are skipped; a question with zero usable
//! samples is an error for that question only.

use crate::llm::{extract_probability, ChatModel};
use crate::services::{with_retry, RetryConfig};
use crate::types::ForecastSample;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Issues independent forecast requests against the chat model
pub struct ForecastSampler {
    model: Arc<dyn ChatModel>,
    retry: RetryConfig,
    samples_per_question: usize,
}

impl ForecastSampler {
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryConfig, samples_per_question: usize) -> Self {
        Self {
            model,
            retry,
            samples_per_question,
        }
    }

    /// Collect up to N (probability, rationale) samples for one prompt.
    ///
    /// Samples vary only through the model's own sampling; every request
    /// uses the same prompt. Requires at least one usable sample.
    pub async fn sample(&self, prompt: &str) -> Result<Vec<ForecastSample>> {
        let mut samples = Vec::with_capacity(self.samples_per_question);

        for run in 1..=self.samples_per_question {
            let response = match with_retry(&self.retry, "forecast_sample", || {
                self.model.complete(prompt)
            })
            .await
            {
                Ok(text) => text,
                Err(err) => {
                    warn!("Sample {}/{} failed: {}", run, self.samples_per_question, err);
                    continue;
                }
            };

            match extract_probability(&response) {
                Some(probability) => {
                    debug!(
                        "Sample {}/{}: {:.0}%",
                        run,
                        self.samples_per_question,
                        probability * 100.0
                    );
                    samples.push(ForecastSample {
                        probability,
                        rationale: format!("Run {}: {}", run, response),
                    });
                }
                None => {
                    warn!(
                        "Sample {}/{} contained no extractable probability",
                        run, self.samples_per_question
                    );
                }
            }
        }

        if samples.is_empty() {
            anyhow::bail!(
                "no usable forecast samples out of {} attempts",
                self.samples_per_question
            );
        }

        Ok(samples)
    }
}
