//! Channel Schedule Resolution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::window::{TimeWindow, WindowSpec};
use crate::ScheduleError;

/// `schedule` section of the configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Named windows
    #[serde(default)]
    pub times: HashMap<String, WindowSpec>,
    /// Window used for channels without an explicit mapping
    #[serde(default)]
    pub default: Option<String>,
    /// Channel id to window name
    #[serde(default)]
    pub channels: HashMap<String, String>,
}

/// Validated, read-only schedule lookup
#[derive(Debug, Clone)]
pub struct ScheduleResolver {
    windows: HashMap<String, TimeWindow>,
    default: Option<String>,
    channels: HashMap<String, String>,
}

impl ScheduleResolver {
    /// Build a resolver, rejecting references to undefined windows
    pub fn new(settings: &ScheduleSettings) -> Result<Self, ScheduleError> {
        let windows = settings
            .times
            .iter()
            .map(|(name, spec)| Ok((name.clone(), TimeWindow::from_spec(name, spec)?)))
            .collect::<Result<HashMap<_, _>, ScheduleError>>()?;

        if let Some(name) = &settings.default {
            if !windows.contains_key(name) {
                return Err(ScheduleError::UnknownWindow {
                    reference: "default schedule".to_string(),
                    name: name.clone(),
                });
            }
        }

        for (channel, name) in &settings.channels {
            if !windows.contains_key(name) {
                return Err(ScheduleError::UnknownWindow {
                    reference: format!("channel {}", channel),
                    name: name.clone(),
                });
            }
        }

        info!(
            "Schedule loaded: {} windows, default={:?}, {} channel mappings",
            windows.len(),
            settings.default,
            settings.channels.len()
        );

        Ok(Self {
            windows,
            default: settings.default.clone(),
            channels: settings.channels.clone(),
        })
    }

    /// Window governing `channel`, or `None` when the channel is unrestricted
    pub fn resolve(&self, channel: &str) -> Option<&TimeWindow> {
        if let Some(name) = self.channels.get(channel) {
            debug!("Schedule \"{}\" found for channel {}", name, channel);
            return self.windows.get(name);
        }

        match &self.default {
            Some(name) => {
                debug!("Using default schedule \"{}\" for channel {}", name, channel);
                self.windows.get(name)
            }
            None => {
                debug!("No schedule found for channel {}, assuming 24x7", channel);
                None
            }
        }
    }

    /// Whether alerts on `channel` should be delivered at `at`
    pub fn is_on_duty(&self, channel: &str, at: DateTime<Utc>) -> bool {
        self.resolve(channel)
            .map_or(true, |window| window.contains(at))
    }

    /// Number of defined windows
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn weekdays_9to5() -> WindowSpec {
        serde_json::from_value(serde_json::json!({
            "days": {
                "mon": ["09:00-17:00"], "tue": ["09:00-17:00"], "wed": ["09:00-17:00"],
                "thu": ["09:00-17:00"], "fri": ["09:00-17:00"]
            }
        }))
        .unwrap()
    }

    fn nights() -> WindowSpec {
        serde_json::from_value(serde_json::json!({
            "days": {
                "mon": ["20:00-06:00"], "tue": ["20:00-06:00"], "wed": ["20:00-06:00"],
                "thu": ["20:00-06:00"], "fri": ["20:00-06:00"], "sat": ["20:00-06:00"],
                "sun": ["20:00-06:00"]
            }
        }))
        .unwrap()
    }

    fn settings(default: Option<&str>, channels: &[(&str, &str)]) -> ScheduleSettings {
        ScheduleSettings {
            times: HashMap::from([
                ("9to5".to_string(), weekdays_9to5()),
                ("nights".to_string(), nights()),
            ]),
            default: default.map(str::to_string),
            channels: channels
                .iter()
                .map(|(c, w)| (c.to_string(), w.to_string()))
                .collect(),
        }
    }

    // Wednesday
    fn midday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_channel_mapping_wins_over_default() {
        let resolver = ScheduleResolver::new(&settings(Some("9to5"), &[("3", "nights")])).unwrap();

        assert_eq!(resolver.resolve("3").map(TimeWindow::name), Some("nights"));
        assert_eq!(resolver.resolve("1").map(TimeWindow::name), Some("9to5"));
        assert!(!resolver.is_on_duty("3", midday()));
        assert!(resolver.is_on_duty("1", midday()));
    }

    #[test]
    fn test_no_default_is_always_on_duty() {
        let resolver = ScheduleResolver::new(&settings(None, &[("3", "nights")])).unwrap();

        assert!(resolver.resolve("1").is_none());
        assert!(resolver.is_on_duty("1", midday()));
        assert_eq!(resolver.window_count(), 2);
    }

    #[test]
    fn test_unknown_default_rejected() {
        let err = ScheduleResolver::new(&settings(Some("weekends"), &[])).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::UnknownWindow {
                reference: "default schedule".to_string(),
                name: "weekends".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_channel_window_rejected() {
        let err = ScheduleResolver::new(&settings(None, &[("7", "lunch")])).unwrap_err();
        assert!(err.to_string().contains("channel 7"));
        assert!(err.to_string().contains("lunch"));
    }

    #[test]
    fn test_malformed_window_rejected() {
        let mut settings = settings(None, &[]);
        settings.times.insert(
            "broken".to_string(),
            serde_json::from_value(serde_json::json!({ "days": { "mon": ["nine-five"] } })).unwrap(),
        );
        assert!(matches!(
            ScheduleResolver::new(&settings),
            Err(ScheduleError::InvalidRange { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_unscheduled_channels_fail_open(channel in "[a-z0-9]{1,8}", secs in 0i64..4_102_444_800) {
            let resolver = ScheduleResolver::new(&settings(None, &[])).unwrap();
            let at = Utc.timestamp_opt(secs, 0).unwrap();
            prop_assert!(resolver.is_on_duty(&channel, at));
        }

        #[test]
        fn prop_contains_is_pure(secs in 0i64..4_102_444_800, other in 0i64..4_102_444_800) {
            let window = TimeWindow::from_spec("nights", &nights()).unwrap();
            let at = Utc.timestamp_opt(secs, 0).unwrap();
            let first = window.contains(at);
            let _ = window.contains(Utc.timestamp_opt(other, 0).unwrap());
            prop_assert_eq!(first, window.contains(at));
        }
    }
}
