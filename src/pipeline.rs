//! Question-processing pipeline
//!
//! The run sequence: fetch open questions, filter against the checkpoint,
//! research, sample, aggregate, submit, checkpoint. Questions are handled
//! one at a time; a failure on one question is logged and the run moves
//! on, while a failure fetching the question list aborts the whole run.

use crate::aggregator::Aggregator;
use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::llm::{build_forecast_prompt, ChatModel};
use crate::platform::Platform;
use crate::sampler::ForecastSampler;
use crate::services::{with_retry, RetryConfig};
use crate::types::{Question, QuestionOutcome, RunReport};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

/// One full forecast-and-submit pass over a tournament
pub struct Pipeline {
    platform: Arc<dyn Platform>,
    research_model: Option<Arc<dyn ChatModel>>,
    sampler: ForecastSampler,
    aggregator: Aggregator,
    checkpoint: Checkpoint,
    retry: RetryConfig,
    submit_predictions: bool,
    use_checkpoint: bool,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: Arc<dyn Platform>,
        research_model: Option<Arc<dyn ChatModel>>,
        sampler: ForecastSampler,
        aggregator: Aggregator,
        checkpoint: Checkpoint,
        retry: RetryConfig,
        config: &Config,
    ) -> Self {
        Self {
            platform,
            research_model,
            sampler,
            aggregator,
            checkpoint,
            retry,
            submit_predictions: config.submit_predictions,
            use_checkpoint: config.use_checkpoint,
        }
    }

    /// Process every open question once.
    ///
    /// Returns the run report; errors only when the question list itself
    /// cannot be fetched.
    pub async fn run_once(&mut self) -> Result<RunReport> {
        let questions = self
            .platform
            .list_open_questions()
            .await
            .context("Failed to fetch open questions")?;

        let mut report = RunReport {
            fetched: questions.len(),
            ..Default::default()
        };

        for question in &questions {
            if self.use_checkpoint && self.checkpoint.contains(question.id) {
                info!("Skipping question {} (already processed)", question.id);
                report.record(QuestionOutcome::Skipped);
                continue;
            }

            info!(
                "Forecasting question {}: {}",
                question.id,
                question.short_title(60)
            );

            match self.process_question(question).await {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    error!("Failed to process question {}: {:#}", question.id, err);
                    report.record_failure(question.id, &err);
                }
            }
        }

        info!(
            "Run complete: {} fetched, {} skipped, {} forecast, {} submitted, {} failed",
            report.fetched, report.skipped, report.forecast, report.submitted, report.failed
        );
        Ok(report)
    }

    async fn process_question(&mut self, question: &Question) -> Result<QuestionOutcome> {
        let news = self.research(question).await;
        let prompt = build_forecast_prompt(question, news.as_deref());

        let samples = self
            .sampler
            .sample(&prompt)
            .await
            .context("sampling failed")?;

        let forecast = self
            .aggregator
            .aggregate(&samples, news.as_deref())
            .await
            .context("aggregation failed")?;

        info!(
            "Aggregated probability for question {}: {:.2} ({} samples)",
            question.id, forecast.probability, forecast.sample_count
        );

        if !self.submit_predictions {
            info!("Submission disabled, not posting question {}", question.id);
            return Ok(QuestionOutcome::Forecast);
        }

        self.platform
            .submit_forecast(question.id, &forecast)
            .await
            .context("submission failed")?;

        // Checkpoint only after a successful submission, so dry runs and
        // failed posts never mark a question as done.
        self.checkpoint.mark_processed(question.id)?;

        Ok(QuestionOutcome::Submitted)
    }

    /// Best-effort research rundown; a failed call degrades to a
    /// no-news prompt rather than failing the question.
    async fn research(&self, question: &Question) -> Option<String> {
        let model = self.research_model.as_ref()?;

        match with_retry(&self.retry, "research", || model.complete(&question.title)).await {
            Ok(news) => Some(news),
            Err(err) => {
                warn!(
                    "Research failed for question {}, forecasting without news: {}",
                    question.id, err
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ApiError;
    use crate::types::{AggregatedForecast, QuestionStatus};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockPlatform {
        questions: Vec<Question>,
        list_fails: bool,
        submissions: Mutex<Vec<(u64, f64)>>,
    }

    impl MockPlatform {
        fn new(questions: Vec<Question>) -> Self {
            Self {
                questions,
                list_fails: false,
                submissions: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                questions: Vec::new(),
                list_fails: true,
                submissions: Mutex::new(Vec::new()),
            }
        }

        fn submissions(&self) -> Vec<(u64, f64)> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Platform for MockPlatform {
        async fn list_open_questions(&self) -> Result<Vec<Question>, ApiError> {
            if self.list_fails {
                return Err(ApiError::ServerError { status: 500 });
            }
            Ok(self.questions.clone())
        }

        async fn submit_forecast(
            &self,
            question_id: u64,
            forecast: &AggregatedForecast,
        ) -> Result<(), ApiError> {
            self.submissions
                .lock()
                .unwrap()
                .push((question_id, forecast.probability));
            Ok(())
        }
    }

    /// Returns canned responses in order; panics when the script runs dry
    struct ScriptedModel {
        responses: Mutex<VecDeque<Result<String, ApiError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<String, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted model ran out of responses")
        }
    }

    fn question(id: u64) -> Question {
        Question {
            id,
            title: format!("Question {}?", id),
            description: "Background.".to_string(),
            resolution_criteria: None,
            fine_print: None,
            status: QuestionStatus::Open,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 1,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_factor: 2.0,
        }
    }

    fn test_config(submit: bool, use_checkpoint: bool) -> Config {
        Config {
            metac_token: "token".to_string(),
            metac_base_url: "http://localhost".to_string(),
            tournament_id: 1,
            perplexity_api_key: None,
            samples_per_question: 5,
            submit_predictions: submit,
            use_checkpoint,
            use_research: false,
            checkpoint_path: "unused.json".to_string(),
            email: None,
        }
    }

    fn ok(text: &str) -> Result<String, ApiError> {
        Ok(text.to_string())
    }

    fn build_pipeline(
        platform: Arc<MockPlatform>,
        model: Arc<ScriptedModel>,
        checkpoint: Checkpoint,
        config: &Config,
    ) -> Pipeline {
        let sampler = ForecastSampler::new(
            model.clone(),
            fast_retry(),
            config.samples_per_question,
        );
        let aggregator = Aggregator::new(model, fast_retry());
        Pipeline::new(
            platform,
            None,
            sampler,
            aggregator,
            checkpoint,
            fast_retry(),
            config,
        )
    }

    fn empty_checkpoint(dir: &tempfile::TempDir) -> Checkpoint {
        Checkpoint::load(dir.path().join("processed_questions.json")).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_reference_scenario() {
        // One question, five samples [0.2, 0.3, 0.25, 0.4, 0.35]: the
        // submitted probability is their mean, with exactly one
        // consolidation call and one submission.
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MockPlatform::new(vec![question(1)]));
        let model = Arc::new(ScriptedModel::new(vec![
            ok("Probability: 20%"),
            ok("Probability: 30%"),
            ok("Probability: 25%"),
            ok("Probability: 40%"),
            ok("Probability: 35%"),
            ok("- consolidated bullets"),
        ]));

        let config = test_config(true, true);
        let mut pipeline = build_pipeline(
            platform.clone(),
            model.clone(),
            empty_checkpoint(&dir),
            &config,
        );

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.submitted, 1);
        assert!(report.is_success());
        // 5 sampler calls + 1 consolidation call
        assert_eq!(model.call_count(), 6);

        let submissions = platform.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].0, 1);
        assert!((submissions[0].1 - 0.30).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_checkpointed_question_is_skipped_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = empty_checkpoint(&dir);
        checkpoint.mark_processed(1).unwrap();

        let platform = Arc::new(MockPlatform::new(vec![question(1)]));
        let model = Arc::new(ScriptedModel::new(vec![]));

        let config = test_config(true, true);
        let mut pipeline = build_pipeline(platform.clone(), model.clone(), checkpoint, &config);

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.submitted, 0);
        // No sampler, aggregator, or submission calls at all
        assert_eq!(model.call_count(), 0);
        assert!(platform.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_checkpoint_ignored_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut checkpoint = empty_checkpoint(&dir);
        checkpoint.mark_processed(1).unwrap();

        let platform = Arc::new(MockPlatform::new(vec![question(1)]));
        let model = Arc::new(ScriptedModel::new(vec![
            ok("Probability: 50%"),
            ok("Probability: 50%"),
            ok("Probability: 50%"),
            ok("Probability: 50%"),
            ok("Probability: 50%"),
            ok("- bullets"),
        ]));

        let config = test_config(true, false);
        let mut pipeline = build_pipeline(platform.clone(), model, checkpoint, &config);

        let report = pipeline.run_once().await.unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(report.submitted, 1);
    }

    #[tokio::test]
    async fn test_submit_disabled_makes_no_submission_and_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("processed_questions.json");

        let platform = Arc::new(MockPlatform::new(vec![question(1)]));
        let model = Arc::new(ScriptedModel::new(vec![
            ok("Probability: 40%"),
            ok("Probability: 40%"),
            ok("Probability: 40%"),
            ok("Probability: 40%"),
            ok("Probability: 40%"),
            ok("- bullets"),
        ]));

        let config = test_config(false, true);
        let mut pipeline = build_pipeline(
            platform.clone(),
            model,
            Checkpoint::load(&checkpoint_path).unwrap(),
            &config,
        );

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.forecast, 1);
        assert_eq!(report.submitted, 0);
        assert!(platform.submissions().is_empty());

        // Dry runs never mark questions as processed
        let reloaded = Checkpoint::load(&checkpoint_path).unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_one_failed_question_does_not_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MockPlatform::new(vec![question(1), question(2)]));
        // Question 1: all samples unusable. Question 2: clean run.
        let model = Arc::new(ScriptedModel::new(vec![
            ok("no number"),
            ok("no number"),
            ok("no number"),
            ok("no number"),
            ok("no number"),
            ok("Probability: 60%"),
            ok("Probability: 60%"),
            ok("Probability: 60%"),
            ok("Probability: 60%"),
            ok("Probability: 60%"),
            ok("- bullets"),
        ]));

        let config = test_config(true, true);
        let mut pipeline = build_pipeline(
            platform.clone(),
            model,
            empty_checkpoint(&dir),
            &config,
        );

        let report = pipeline.run_once().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.submitted, 1);
        assert!(!report.is_success());

        let submissions = platform.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].0, 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MockPlatform::failing());
        let model = Arc::new(ScriptedModel::new(vec![]));

        let config = test_config(true, true);
        let mut pipeline = build_pipeline(platform, model, empty_checkpoint(&dir), &config);

        assert!(pipeline.run_once().await.is_err());
    }

    #[tokio::test]
    async fn test_submission_persists_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("processed_questions.json");

        let platform = Arc::new(MockPlatform::new(vec![question(9)]));
        let model = Arc::new(ScriptedModel::new(vec![
            ok("Probability: 10%"),
            ok("Probability: 10%"),
            ok("Probability: 10%"),
            ok("Probability: 10%"),
            ok("Probability: 10%"),
            ok("- bullets"),
        ]));

        let config = test_config(true, true);
        let mut pipeline = build_pipeline(
            platform,
            model,
            Checkpoint::load(&checkpoint_path).unwrap(),
            &config,
        );

        pipeline.run_once().await.unwrap();

        let reloaded = Checkpoint::load(&checkpoint_path).unwrap();
        assert!(reloaded.contains(9));
    }
}
