//! Email notification for run status
//!
//! Sends one email at process exit reporting whether the run succeeded.
//! Delivery is best-effort: a failed send is logged and never affects
//! the run's exit status.

use crate::config::EmailConfig;
use crate::types::RunReport;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info};

/// Client for the HTTP email delivery API
#[derive(Clone)]
pub struct EmailNotifier {
    client: Client,
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Send the end-of-run status email
    pub async fn send_run_report(&self, report: &RunReport) {
        let status = if report.is_success() { "success" } else { "failure" };
        let subject = format!(
            "Forecast bot run {} - {}",
            status,
            Utc::now().format("%Y-%m-%d")
        );

        let payload = json!({
            "from": self.config.from,
            "to": [self.config.to],
            "subject": subject,
            "text": report.render(),
        });

        match self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => {
                if response.status().is_success() {
                    info!("Run report email sent ({})", status);
                } else {
                    error!("Email API returned {}", response.status());
                }
            }
            Err(e) => {
                error!("Failed to send run report email: {}", e);
            }
        }
    }
}
