//! Forecast aggregation
//!
//! Averages sample probabilities and consolidates the sample rationales
//! into a few representative bullet points via one summarization call.
//! The mean is deterministic; the consolidated rationale is best-effort
//! and falls back to the raw rationales when summarization fails.

use crate::llm::{build_summarization_prompt, ChatModel};
use crate::services::{with_retry, RetryConfig};
use crate::types::{AggregatedForecast, ForecastSample};
use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

/// Combines forecast samples into one submission-ready forecast
pub struct Aggregator {
    model: Arc<dyn ChatModel>,
    retry: RetryConfig,
}

impl Aggregator {
    pub fn new(model: Arc<dyn ChatModel>, retry: RetryConfig) -> Self {
        Self { model, retry }
    }

    /// Arithmetic mean of the sample probabilities, clamped to [0, 1]
    pub fn mean_probability(samples: &[ForecastSample]) -> f64 {
        let sum: f64 = samples.iter().map(|s| s.probability).sum();
        (sum / samples.len() as f64).clamp(0.0, 1.0)
    }

    /// Aggregate samples into one forecast.
    ///
    /// `news` is the research rundown used while sampling; it is appended
    /// to the rationale so the submitted comment shows its sources.
    pub async fn aggregate(
        &self,
        samples: &[ForecastSample],
        news: Option<&str>,
    ) -> Result<AggregatedForecast> {
        anyhow::ensure!(!samples.is_empty(), "cannot aggregate zero samples");

        let probability = Self::mean_probability(samples);

        let rationales: Vec<String> = samples.iter().map(|s| s.rationale.clone()).collect();
        let mut rationale = self.consolidate(&rationales).await;

        if let Some(news) = news {
            rationale.push_str("\n\nUsed the following information from the research step:\n\n");
            rationale.push_str(news);
        }

        Ok(AggregatedForecast {
            probability,
            rationale,
            sample_count: samples.len(),
        })
    }

    /// One summarization call; joined raw rationales on failure
    async fn consolidate(&self, rationales: &[String]) -> String {
        let prompt = build_summarization_prompt(rationales);

        match with_retry(&self.retry, "summarize_rationales", || {
            self.model.complete(&prompt)
        })
        .await
        {
            Ok(summary) => summary,
            Err(err) => {
                warn!("Rationale summarization failed, using raw rationales: {}", err);
                rationales.join("\n\n")
            }
        }
    }
}
