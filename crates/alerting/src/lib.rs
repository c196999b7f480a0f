//! Alerting System
//!
//! Provides the alert event model and cooldown-based deduplication
//! with optional summaries of suppressed alerts.

mod cooldown;
mod event;

pub use cooldown::{
    CooldownConfig, CooldownController, CooldownSettings, CooldownSummary, Decision,
    ALL_CAMERAS_LABEL, GLOBAL_KEY, SUMMARY_TITLE,
};
pub use event::AlertEvent;

use thiserror::Error;

/// Alerting errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    /// Alert without a channel id
    #[error("Alert event has an empty channel id")]
    EmptyChannel,

    /// Cooldown section is inconsistent
    #[error("Invalid cooldown configuration: {0}")]
    InvalidCooldown(String),
}
