//! Cross-cutting plumbing shared by the platform and LLM clients

pub mod api_errors;
pub mod retry;

pub use api_errors::ApiError;
pub use retry::{with_retry, RetryConfig};
