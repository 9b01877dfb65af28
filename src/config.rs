//! Configuration management for the forecasting bot

use anyhow::Result;
use std::env;

/// Default Metaculus API root
const DEFAULT_BASE_URL: &str = "https://www.metaculus.com/api2";

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Metaculus API token (auth for questions, predictions, and the LLM proxy)
    pub metac_token: String,

    /// Metaculus API base URL
    pub metac_base_url: String,

    /// Tournament whose open questions are forecast
    pub tournament_id: u64,

    /// Perplexity API key for the research step (research disabled when unset)
    pub perplexity_api_key: Option<String>,

    /// Independent forecast samples collected per question
    pub samples_per_question: usize,

    /// Whether predictions are actually posted to the platform
    pub submit_predictions: bool,

    /// Whether previously processed questions are skipped
    pub use_checkpoint: bool,

    /// Whether the online research step runs before sampling
    pub use_research: bool,

    /// Path of the processed-questions checkpoint file
    pub checkpoint_path: String,

    /// Email notification settings (notification skipped when unset)
    pub email: Option<EmailConfig>,
}

/// Settings for the run-status notification email
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// HTTP endpoint of the email delivery API
    pub api_url: String,
    /// Bearer token for the email API
    pub api_key: String,
    pub from: String,
    pub to: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let metac_token = env::var("METACULUS_TOKEN")
            .map_err(|_| anyhow::anyhow!("METACULUS_TOKEN is required"))?;

        let metac_base_url = env::var("METACULUS_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let tournament_id = env::var("TOURNAMENT_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(32506);

        let perplexity_api_key = env::var("PERPLEXITY_API_KEY").ok().filter(|s| !s.is_empty());

        let samples_per_question = env::var("SAMPLES_PER_QUESTION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let submit_predictions = env::var("SUBMIT_PREDICTIONS")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false); // Default to dry runs for safety

        let use_checkpoint = env::var("USE_CHECKPOINT")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let use_research = env::var("USE_RESEARCH")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let checkpoint_path = env::var("CHECKPOINT_PATH")
            .unwrap_or_else(|_| "processed_questions.json".to_string());

        let email = match (
            env::var("EMAIL_API_URL").ok().filter(|s| !s.is_empty()),
            env::var("EMAIL_API_KEY").ok().filter(|s| !s.is_empty()),
            env::var("EMAIL_FROM").ok().filter(|s| !s.is_empty()),
            env::var("EMAIL_TO").ok().filter(|s| !s.is_empty()),
        ) {
            (Some(api_url), Some(api_key), Some(from), Some(to)) => Some(EmailConfig {
                api_url,
                api_key,
                from,
                to,
            }),
            _ => None,
        };

        if samples_per_question == 0 {
            anyhow::bail!("SAMPLES_PER_QUESTION must be at least 1");
        }

        Ok(Self {
            metac_token,
            metac_base_url,
            tournament_id,
            perplexity_api_key,
            samples_per_question,
            submit_predictions,
            use_checkpoint,
            use_research,
            checkpoint_path,
            email,
        })
    }

    /// Whether the research step is both enabled and usable
    pub fn research_enabled(&self) -> bool {
        self.use_research && self.perplexity_api_key.is_some()
    }
}

/// Metaculus LLM proxy endpoints
pub struct MetaculusProxy;

impl MetaculusProxy {
    pub const CHAT_COMPLETIONS_URL: &'static str =
        "https://www.metaculus.com/proxy/openai/v1/chat/completions/";
    pub const MODEL: &'static str = "gpt-4o";
}

/// Perplexity API endpoints
pub struct PerplexityApi;

impl PerplexityApi {
    pub const CHAT_COMPLETIONS_URL: &'static str = "https://api.perplexity.ai/chat/completions";
    pub const MODEL: &'static str = "llama-3.1-sonar-huge-128k-online";
}
