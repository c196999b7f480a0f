//! Delivery Schedules
//!
//! Decides whether a camera channel is "on duty" at a given instant:
//! - Named recurring time windows (per weekday, minute resolution)
//! - Channel to window mapping with an optional default window
//! - Fail-open resolution for channels without any schedule

mod resolver;
mod window;

pub use resolver::{ScheduleResolver, ScheduleSettings};
pub use window::{TimeRange, TimeWindow, WindowSpec};

use thiserror::Error;

/// Schedule configuration errors
///
/// All of these are raised while building a [`ScheduleResolver`]; a
/// resolver that exists is always internally consistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// `default` or a channel mapping names a window that is not defined
    #[error("{reference} refers to unknown schedule window \"{name}\"")]
    UnknownWindow { reference: String, name: String },

    /// A range is not of the form `HH:MM-HH:MM`
    #[error("window \"{window}\": invalid time range \"{range}\": {reason}")]
    InvalidRange {
        window: String,
        range: String,
        reason: String,
    },

    /// A day key is not a weekday name
    #[error("window \"{window}\": unknown weekday \"{day}\"")]
    InvalidWeekday { window: String, day: String },

    /// The UTC offset is not of the form `+HH:MM` / `-HH:MM`
    #[error("window \"{window}\": invalid UTC offset \"{offset}\"")]
    InvalidOffset { window: String, offset: String },
}
