//! Metaculus Forecasting Bot Library
//!
//! A daily automation bot for Metaculus tournaments:
//!
//! 1. **Sampling**: every open question gets N independent LLM forecasts,
//!    each grounded in a search-augmented research rundown.
//! 2. **Aggregation**: the sample probabilities are averaged and the
//!    rationales consolidated into a few bullet points.
//! 3. **Submission**: the averaged prediction and rationale are posted
//!    back to the platform, and the question is checkpointed so the next
//!    run skips it.

pub mod aggregator;
pub mod checkpoint;
pub mod config;
pub mod llm;
pub mod notifier;
pub mod pipeline;
pub mod platform;
pub mod sampler;
pub mod services;
pub mod types;

pub use aggregator::Aggregator;
pub use checkpoint::Checkpoint;
pub use config::{Config, EmailConfig};
pub use llm::{ChatModel, PerplexityModel, ProxyChatModel};
pub use notifier::EmailNotifier;
pub use pipeline::Pipeline;
pub use platform::{MetaculusClient, Platform};
pub use sampler::ForecastSampler;
pub use services::{ApiError, RetryConfig};
pub use types::{AggregatedForecast, ForecastSample, Question, QuestionStatus, RunReport};
