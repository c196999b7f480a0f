//! Notification Sink
//!
//! Defines the [`Notifier`] seam used by the relay and a Pushover
//! implementation of it.

mod pushover;

pub use pushover::{PushoverConfig, PushoverNotifier, DEFAULT_API_URL};

use thiserror::Error;

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Transport failure or undecodable response
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered but refused the message
    #[error("Notification rejected (HTTP {status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// Notifier settings are unusable
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A push notification channel
///
/// Calls are independent of each other; a failed send carries no state
/// into the next one.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError>;

    /// Human-readable channel name for logs
    fn channel_name(&self) -> &str;
}
