//! Outbound delivery transports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// A message for the skipper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// Time of submission
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create a notification stamped with the current time
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// Delivery failures; all are retried
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Could not reach or log in to the server
    #[error("connection failed: {0}")]
    Connect(String),

    /// Server refused the message
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Transport that hands a notification to the outside world
#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    /// Deliver one notification
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;

    /// Name for logs
    fn name(&self) -> &str;
}

/// Mailer that writes notifications to the log
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            "NOTIFY {} | {} ({})",
            notification.subject,
            notification.body,
            notification.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_delivers() {
        let mailer = LogMailer;
        let notification = Notification::new("[Boat] NOTICE", "hello");
        assert!(mailer.deliver(&notification).await.is_ok());
        assert_eq!(mailer.name(), "log");
    }
}
