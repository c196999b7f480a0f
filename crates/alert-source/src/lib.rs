//! Alert Source
//!
//! Turns the recorder's notifications into a typed event stream:
//! - `Ready` once the source is operational
//! - `Warning` for recoverable problems (bad payloads, dropped connections)
//! - `Alert` for every decoded alarm

mod payload;
mod tcp;

pub use payload::{decode_alert, DecodeError};
pub use tcp::TcpJsonSource;

use alerting::AlertEvent;
use thiserror::Error;
use tokio::sync::mpsc;

/// Events produced by an alert source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Source is accepting alerts
    Ready { endpoint: String },
    /// Non-fatal advisory
    Warning(String),
    /// One alarm from the recorder
    Alert(AlertEvent),
}

/// Fatal source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A producer of [`SourceEvent`]s
///
/// `run` returns once the receiving side of `events` is dropped, or with an
/// error if the source cannot operate at all.
#[async_trait::async_trait]
pub trait AlertSource: Send + Sync {
    async fn run(&self, events: mpsc::Sender<SourceEvent>) -> Result<(), SourceError>;
}
