//! Client for the sourcing service
//!
//! [`SourcingClient`] wraps the two external touchpoints: the one-shot
//! submission POST and the persistent notification channel.

pub mod channel;
pub mod session;

pub use channel::{ChannelEvent, NotificationChannel};
pub use session::{ConnectionState, LogEntry, TaskPhase, TaskSession};

use crate::config::Config;
use crate::error::{Result, SellflowError};
use crate::protocol::{SourcingRequest, TaskStarted};

pub struct SourcingClient {
    http: reqwest::Client,
    submit_url: String,
    notify_url: String,
}

impl SourcingClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("sellflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            submit_url: format!("{}/sourcing", config.submit_base_url()),
            notify_url: config.notify_url(),
        })
    }

    /// Submit one analysis task. A single request-response exchange: no
    /// authentication, no idempotency key, no retry.
    pub async fn submit(&self, query: &str) -> Result<TaskStarted> {
        let response = self
            .http
            .post(&self.submit_url)
            .json(&SourcingRequest {
                query: query.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SellflowError::SubmissionFailed {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Open the notification channel for this service.
    pub async fn open_channel(&self) -> Result<NotificationChannel> {
        NotificationChannel::connect(&self.notify_url).await
    }
}
