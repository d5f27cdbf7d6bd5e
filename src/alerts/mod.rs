//! Outbound alerting: deduplication, formatting and delivery.

pub mod dedup;
pub mod notifier;
pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Why an outbound message did not go through. Logged, never retried in
/// the same cycle.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("telegram request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("telegram returned HTTP {status}: {description}")]
    Status {
        status: reqwest::StatusCode,
        description: String,
    },
    #[error("telegram rejected the call: {0}")]
    Api(String),
}

/// Destination channel for alert text.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotificationError>;
}

/// Writes alerts to the log instead of a chat. Used by `--dry-run`.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        info!(alert = %text, "Dry run, alert not sent");
        Ok(())
    }
}
