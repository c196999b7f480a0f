//! Alert Event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AlertError;

/// One notification-worthy occurrence reported by the recorder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    channel: String,
    kind: String,
    source_label: String,
    timestamp: DateTime<Utc>,
    /// Original payload, kept for logging only
    raw: serde_json::Value,
}

impl AlertEvent {
    /// Create an event; the channel id must be non-empty
    pub fn new(
        channel: impl Into<String>,
        kind: impl Into<String>,
        source_label: impl Into<String>,
        timestamp: DateTime<Utc>,
        raw: serde_json::Value,
    ) -> Result<Self, AlertError> {
        let channel = channel.into();
        if channel.trim().is_empty() {
            return Err(AlertError::EmptyChannel);
        }

        Ok(Self {
            channel,
            kind: kind.into(),
            source_label: source_label.into(),
            timestamp,
            raw,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Alarm category, e.g. "Motion Alarm"
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Human-readable origin, usually the camera name
    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }
}
