//! Metaculus API client
//!
//! Fetches open tournament questions (paginated) and posts predictions
//! plus rationale comments. All calls go through the bounded-retry
//! wrapper and authenticate with the platform token.

use crate::config::Config;
use crate::services::{with_retry, ApiError, RetryConfig};
use crate::types::{AggregatedForecast, Question, QuestionStatus};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Page size for question listing
const PAGE_SIZE: usize = 30;

/// Safety limit on pagination to avoid runaway loops
const MAX_QUESTIONS: usize = 2000;

/// The forecasting platform as seen by the pipeline: a source of open
/// questions and a sink for forecasts.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Fetch every open binary question in the configured tournament
    async fn list_open_questions(&self) -> Result<Vec<Question>, ApiError>;

    /// Post the prediction and its consolidated rationale for a question
    async fn submit_forecast(
        &self,
        question_id: u64,
        forecast: &AggregatedForecast,
    ) -> Result<(), ApiError>;
}

/// Raw question envelope from the Metaculus questions endpoint
#[derive(Debug, Deserialize)]
struct ApiPost {
    id: u64,
    #[serde(default)]
    question: Option<ApiQuestion>,
}

#[derive(Debug, Deserialize)]
struct ApiQuestion {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    resolution_criteria: Option<String>,
    #[serde(default)]
    fine_print: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuestionsPage {
    results: Vec<ApiPost>,
}

/// HTTP client for the Metaculus API
pub struct MetaculusClient {
    client: Client,
    base_url: String,
    token: String,
    tournament_id: u64,
    retry: RetryConfig,
}

impl MetaculusClient {
    pub fn new(config: &Config, retry: RetryConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.metac_base_url.clone(),
            token: config.metac_token.clone(),
            tournament_id: config.tournament_id,
            retry,
        }
    }

    fn auth_value(&self) -> String {
        format!("Token {}", self.token)
    }

    async fn fetch_page(&self, offset: usize) -> Result<Vec<ApiPost>, ApiError> {
        let url = format!("{}/questions/", self.base_url);
        let offset_str = offset.to_string();
        let limit_str = PAGE_SIZE.to_string();
        let project_str = self.tournament_id.to_string();

        let params = [
            ("limit", limit_str.as_str()),
            ("offset", offset_str.as_str()),
            ("has_group", "false"),
            ("order_by", "-activity"),
            ("forecast_type", "binary"),
            ("project", project_str.as_str()),
            ("status", "open"),
            ("format", "json"),
            ("type", "forecast"),
            ("include_description", "true"),
        ];

        debug!("Fetching questions page at offset {}", offset);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_value())
            .query(&params)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        let page: QuestionsPage = response
            .json()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        Ok(page.results)
    }

    /// Parse a raw API post into our Question type
    fn parse_question(post: ApiPost) -> Option<Question> {
        let body = post.question?;
        let title = body.title.filter(|t| !t.is_empty())?;

        Some(Question {
            id: post.id,
            title,
            description: body.description.unwrap_or_default(),
            resolution_criteria: body.resolution_criteria.filter(|s| !s.is_empty()),
            fine_print: body.fine_print.filter(|s| !s.is_empty()),
            status: QuestionStatus::Open,
        })
    }

    async fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<(), ApiError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", self.auth_value())
            .json(payload)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status.as_u16(), &body));
        }

        Ok(())
    }
}

#[async_trait]
impl Platform for MetaculusClient {
    async fn list_open_questions(&self) -> Result<Vec<Question>, ApiError> {
        let mut questions = Vec::new();
        let mut offset = 0;

        loop {
            let posts = with_retry(&self.retry, "list_questions", || self.fetch_page(offset))
                .await?;

            let batch_size = posts.len();
            debug!("Fetched {} questions with offset {}", batch_size, offset);

            for post in posts {
                let id = post.id;
                match Self::parse_question(post) {
                    Some(q) => questions.push(q),
                    None => warn!("Skipping malformed question entry {}", id),
                }
            }

            if batch_size < PAGE_SIZE {
                break;
            }

            offset += batch_size;

            if offset >= MAX_QUESTIONS {
                warn!("Reached safety limit of {} questions", MAX_QUESTIONS);
                break;
            }
        }

        info!("Total open questions fetched: {}", questions.len());
        Ok(questions)
    }

    async fn submit_forecast(
        &self,
        question_id: u64,
        forecast: &AggregatedForecast,
    ) -> Result<(), ApiError> {
        let predict_url = format!("{}/questions/{}/predict/", self.base_url, question_id);
        let prediction = json!({ "prediction": forecast.probability });

        with_retry(&self.retry, "post_prediction", || {
            self.post_json(&predict_url, &prediction)
        })
        .await?;

        // Attach the consolidated rationale as a private note
        let comment_url = format!("{}/comments/", self.base_url);
        let comment = json!({
            "comment_text": forecast.rationale,
            "submit_type": "N",
            "include_latest_prediction": true,
            "question": question_id,
        });

        with_retry(&self.retry, "post_comment", || {
            self.post_json(&comment_url, &comment)
        })
        .await?;

        info!(
            "Posted prediction {:.2} and comment for question {}",
            forecast.probability, question_id
        );
        Ok(())
    }
}
