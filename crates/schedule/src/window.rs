//! Recurring Time Windows

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ScheduleError;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Raw window definition as it appears in the configuration document
///
/// ```json
/// { "utc_offset": "+01:00", "days": { "mon": ["09:00-17:00"], "sat": ["22:00-06:00"] } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Offset the ranges are expressed in (default: UTC)
    #[serde(default)]
    pub utc_offset: Option<String>,
    /// Weekday name to list of `HH:MM-HH:MM` ranges
    #[serde(default)]
    pub days: BTreeMap<String, Vec<String>>,
}

/// A daily range in minutes since midnight
///
/// `end <= start` means the range runs past midnight into the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: u16,
    end: u16,
}

impl TimeRange {
    /// Parse `HH:MM-HH:MM`; `24:00` is accepted as an end time only
    pub fn parse(text: &str) -> Result<Self, String> {
        let (start, end) = text
            .split_once('-')
            .ok_or_else(|| "expected HH:MM-HH:MM".to_string())?;

        let start = parse_clock(start.trim())?;
        let end = parse_clock(end.trim())?;

        if start == MINUTES_PER_DAY {
            return Err("24:00 is only valid as an end time".to_string());
        }

        Ok(Self { start, end })
    }

    /// Start of the range in minutes since midnight
    pub fn start_minute(&self) -> u16 {
        self.start
    }

    /// End of the range (exclusive) in minutes since midnight
    pub fn end_minute(&self) -> u16 {
        self.end
    }

    /// Whether the range continues past midnight
    pub fn wraps(&self) -> bool {
        self.end <= self.start
    }

    /// Minute falls in the part of the range on its own day
    fn covers_same_day(&self, minute: u16) -> bool {
        if self.wraps() {
            minute >= self.start
        } else {
            minute >= self.start && minute < self.end
        }
    }

    /// Minute falls in the spill-over part on the following day
    fn covers_next_day(&self, minute: u16) -> bool {
        self.wraps() && minute < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

fn parse_clock(text: &str) -> Result<u16, String> {
    let (hours, minutes) = text
        .split_once(':')
        .ok_or_else(|| format!("\"{}\" is not HH:MM", text))?;

    let hours: u16 = hours
        .parse()
        .map_err(|_| format!("\"{}\" has a non-numeric hour", text))?;
    let minutes: u16 = minutes
        .parse()
        .map_err(|_| format!("\"{}\" has a non-numeric minute", text))?;

    if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
        return Err(format!("\"{}\" is not a valid time of day", text));
    }

    Ok(hours * 60 + minutes)
}

fn parse_offset(text: &str) -> Option<FixedOffset> {
    let (sign, rest) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours = two_digits(hours)?;
    let minutes = two_digits(minutes)?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn two_digits(text: &str) -> Option<i32> {
    if text.len() != 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// A named recurring weekly schedule
#[derive(Debug, Clone)]
pub struct TimeWindow {
    name: String,
    offset: FixedOffset,
    /// Ranges indexed by days from Monday
    days: [Vec<TimeRange>; 7],
}

impl TimeWindow {
    /// Build a window from its configuration form
    pub fn from_spec(name: &str, spec: &WindowSpec) -> Result<Self, ScheduleError> {
        let offset = match spec.utc_offset.as_deref() {
            Some(raw) => parse_offset(raw).ok_or_else(|| ScheduleError::InvalidOffset {
                window: name.to_string(),
                offset: raw.to_string(),
            })?,
            None => Utc.fix(),
        };

        let mut days: [Vec<TimeRange>; 7] = Default::default();
        for (day, ranges) in &spec.days {
            let weekday: Weekday = day.parse().map_err(|_| ScheduleError::InvalidWeekday {
                window: name.to_string(),
                day: day.clone(),
            })?;

            for range in ranges {
                let parsed = TimeRange::parse(range).map_err(|reason| ScheduleError::InvalidRange {
                    window: name.to_string(),
                    range: range.clone(),
                    reason,
                })?;
                days[weekday.num_days_from_monday() as usize].push(parsed);
            }
        }

        Ok(Self {
            name: name.to_string(),
            offset,
            days,
        })
    }

    /// Window name as configured
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ranges configured for a weekday
    pub fn ranges(&self, day: Weekday) -> &[TimeRange] {
        &self.days[day.num_days_from_monday() as usize]
    }

    /// Whether `at` falls inside the window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        let minute = (local.hour() * 60 + local.minute()) as u16;
        let today = local.weekday();

        self.ranges(today).iter().any(|r| r.covers_same_day(minute))
            || self
                .ranges(today.pred())
                .iter()
                .any(|r| r.covers_next_day(minute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spec(days: &[(&str, &str)]) -> WindowSpec {
        WindowSpec {
            utc_offset: None,
            days: days
                .iter()
                .map(|(day, range)| (day.to_string(), vec![range.to_string()]))
                .collect(),
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn nine_to_five() -> TimeWindow {
        let range = "09:00-17:00";
        TimeWindow::from_spec(
            "9to5",
            &spec(&[("mon", range), ("tue", range), ("wed", range), ("thu", range), ("fri", range)]),
        )
        .unwrap()
    }

    #[test]
    fn test_range_parsing() {
        let range = TimeRange::parse("09:30-17:05").unwrap();
        assert_eq!(range.start_minute(), 570);
        assert_eq!(range.end_minute(), 1025);
        assert!(!range.wraps());
        assert_eq!(range.to_string(), "09:30-17:05");

        assert!(TimeRange::parse("22:00-06:00").unwrap().wraps());
        assert_eq!(TimeRange::parse("00:00-24:00").unwrap().end_minute(), 1440);
    }

    #[test]
    fn test_range_parsing_rejects_garbage() {
        assert!(TimeRange::parse("0900-1700").is_err());
        assert!(TimeRange::parse("09:00").is_err());
        assert!(TimeRange::parse("25:00-26:00").is_err());
        assert!(TimeRange::parse("09:60-10:00").is_err());
        assert!(TimeRange::parse("24:00-06:00").is_err());
        assert!(TimeRange::parse("ab:00-10:00").is_err());
    }

    #[test]
    fn test_business_hours() {
        let window = nine_to_five();

        // 2024-06-12 is a Wednesday
        assert!(window.contains(at(2024, 6, 12, 9, 0)));
        assert!(window.contains(at(2024, 6, 12, 16, 59)));
        assert!(!window.contains(at(2024, 6, 12, 17, 0)));
        assert!(!window.contains(at(2024, 6, 12, 8, 59)));

        // 2024-06-15 is a Saturday
        assert!(!window.contains(at(2024, 6, 15, 12, 0)));
    }

    #[test]
    fn test_overnight_range_spills_into_next_day() {
        let window = TimeWindow::from_spec("nights", &spec(&[("fri", "22:00-06:00")])).unwrap();

        // Friday 2024-06-14 late, Saturday early
        assert!(window.contains(at(2024, 6, 14, 23, 30)));
        assert!(window.contains(at(2024, 6, 15, 5, 59)));
        assert!(!window.contains(at(2024, 6, 15, 6, 0)));
        // Friday early morning belongs to Thursday's (absent) range
        assert!(!window.contains(at(2024, 6, 14, 3, 0)));
    }

    #[test]
    fn test_full_day() {
        let window = TimeWindow::from_spec("sundays", &spec(&[("sunday", "00:00-24:00")])).unwrap();
        assert!(window.contains(at(2024, 6, 16, 0, 0)));
        assert!(window.contains(at(2024, 6, 16, 23, 59)));
        assert!(!window.contains(at(2024, 6, 17, 0, 0)));
    }

    #[test]
    fn test_utc_offset_shifts_evaluation() {
        let mut spec = spec(&[("wed", "09:00-17:00")]);
        spec.utc_offset = Some("+02:00".to_string());
        let window = TimeWindow::from_spec("cest", &spec).unwrap();

        // 07:30 UTC is 09:30 local
        assert!(window.contains(at(2024, 6, 12, 7, 30)));
        // 15:30 UTC is 17:30 local
        assert!(!window.contains(at(2024, 6, 12, 15, 30)));
    }

    #[test]
    fn test_invalid_spec_errors() {
        let err = TimeWindow::from_spec("w", &spec(&[("funday", "09:00-17:00")])).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidWeekday { .. }));

        let err = TimeWindow::from_spec("w", &spec(&[("mon", "9-5")])).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidRange { .. }));

        let mut bad_offset = spec(&[]);
        bad_offset.utc_offset = Some("CET".to_string());
        let err = TimeWindow::from_spec("w", &bad_offset).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidOffset { .. }));
    }

    #[test]
    fn test_offset_components_must_be_two_digits() {
        assert_eq!(parse_offset("+05:30"), FixedOffset::east_opt(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset("-01:00"), FixedOffset::west_opt(3600));
        for raw in ["+-1:00", "+01:-30", "+1:00", "+01:5", "-+01:00", "+01:60", "+0a:00"] {
            assert_eq!(parse_offset(raw), None, "{raw} should be rejected");
        }
    }

    #[test]
    fn test_spec_deserializes_from_json() {
        let spec: WindowSpec = serde_json::from_str(
            r#"{ "utc_offset": "-05:00", "days": { "mon": ["08:00-12:00", "13:00-17:00"] } }"#,
        )
        .unwrap();
        let window = TimeWindow::from_spec("split", &spec).unwrap();
        assert_eq!(window.ranges(Weekday::Mon).len(), 2);
        assert!(window.ranges(Weekday::Tue).is_empty());
    }
}
