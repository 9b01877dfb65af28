//! Core types for the Metaculus forecasting bot

use serde::{Deserialize, Serialize};
use std::fmt;

/// A binary forecasting question hosted on Metaculus.
///
/// Owned by the platform; this bot only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub resolution_criteria: Option<String>,
    pub fine_print: Option<String>,
    pub status: QuestionStatus,
}

impl Question {
    /// Public URL of the question page
    pub fn url(&self) -> String {
        format!("https://www.metaculus.com/questions/{}/", self.id)
    }

    /// Title truncated for log lines
    pub fn short_title(&self, max_len: usize) -> String {
        if self.title.len() <= max_len {
            self.title.clone()
        } else {
            let mut end = max_len;
            while !self.title.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &self.title[..end])
        }
    }
}

/// Question lifecycle status as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Open,
    Resolved,
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionStatus::Open => write!(f, "open"),
            QuestionStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// One independent LLM forecast for a question.
///
/// Ephemeral: produced per sampling round and discarded after aggregation.
#[derive(Debug, Clone)]
pub struct ForecastSample {
    /// Probability of the question resolving Yes, in [0, 1]
    pub probability: f64,
    /// Free-text reasoning behind the probability
    pub rationale: String,
}

/// The averaged forecast submitted for a question
#[derive(Debug, Clone)]
pub struct AggregatedForecast {
    /// Arithmetic mean of the sample probabilities, clamped to [0, 1]
    pub probability: f64,
    /// Consolidated rationale derived from all sample rationales
    pub rationale: String,
    /// How many successful samples went into the mean
    pub sample_count: usize,
}

/// Outcome of processing a single question within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOutcome {
    Skipped,
    Forecast,
    Submitted,
}

/// Summary of one pipeline run, rendered into the notification email
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub fetched: usize,
    pub skipped: usize,
    pub forecast: usize,
    pub submitted: usize,
    pub failed: usize,
    /// Short per-question failure notes for the email body
    pub failures: Vec<String>,
}

impl RunReport {
    pub fn record(&mut self, outcome: QuestionOutcome) {
        match outcome {
            QuestionOutcome::Skipped => self.skipped += 1,
            QuestionOutcome::Forecast => self.forecast += 1,
            QuestionOutcome::Submitted => {
                self.forecast += 1;
                self.submitted += 1;
            }
        }
    }

    pub fn record_failure(&mut self, question_id: u64, err: &anyhow::Error) {
        self.failed += 1;
        self.failures.push(format!("question {}: {:#}", question_id, err));
    }

    /// A run succeeded when nothing failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Plain-text body for the notification email
    pub fn render(&self) -> String {
        let mut body = format!(
            "Questions fetched: {}\nSkipped (checkpointed): {}\nForecast: {}\nSubmitted: {}\nFailed: {}\n",
            self.fetched, self.skipped, self.forecast, self.submitted, self.failed
        );
        if !self.failures.is_empty() {
            body.push_str("\nFailures:\n");
            for note in &self.failures {
                body.push_str("  - ");
                body.push_str(note);
                body.push('\n');
            }
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_title_truncates() {
        let q = Question {
            id: 1,
            title: "Will the long-dated event with a very descriptive title occur?".to_string(),
            description: String::new(),
            resolution_criteria: None,
            fine_print: None,
            status: QuestionStatus::Open,
        };
        let short = q.short_title(20);
        assert!(short.len() <= 23);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn test_report_success_flag() {
        let mut report = RunReport::default();
        report.record(QuestionOutcome::Submitted);
        assert!(report.is_success());
        report.record_failure(7, &anyhow::anyhow!("sampler gave up"));
        assert!(!report.is_success());
        assert!(report.render().contains("question 7"));
    }

    #[test]
    fn test_submitted_counts_as_forecast() {
        let mut report = RunReport::default();
        report.record(QuestionOutcome::Submitted);
        report.record(QuestionOutcome::Forecast);
        assert_eq!(report.forecast, 2);
        assert_eq!(report.submitted, 1);
    }
}
