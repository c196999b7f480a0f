//! Recorder Payload Decoding

use alerting::AlertEvent;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Errors decoding one alert line
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed alert JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("alert has no channel id")]
    MissingChannel,
}

/// Channel ids arrive as strings from most firmware, numbers from some
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChannelId {
    Text(String),
    Number(u64),
}

impl ChannelId {
    fn into_string(self) -> String {
        match self {
            ChannelId::Text(text) => text,
            ChannelId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AlarmData {
    #[serde(rename = "Channel ID", default)]
    channel: Option<ChannelId>,
    #[serde(rename = "Alarm Type", default)]
    alarm_type: Option<String>,
    #[serde(rename = "Camera Name", default)]
    camera_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlertPayload {
    data: AlarmData,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

/// Decode one JSON alert; `received_at` is used when the payload has no date
pub fn decode_alert(line: &str, received_at: DateTime<Utc>) -> Result<AlertEvent, DecodeError> {
    let raw: serde_json::Value = serde_json::from_str(line)?;
    let payload: AlertPayload = serde_json::from_value(raw.clone())?;

    let channel = payload
        .data
        .channel
        .map(ChannelId::into_string)
        .ok_or(DecodeError::MissingChannel)?;
    let kind = payload
        .data
        .alarm_type
        .unwrap_or_else(|| "Unknown Alarm".to_string());
    let camera = payload
        .data
        .camera_name
        .unwrap_or_else(|| format!("Camera {}", channel));

    AlertEvent::new(
        channel,
        kind,
        camera,
        payload.date.unwrap_or(received_at),
        raw,
    )
    .map_err(|_| DecodeError::MissingChannel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_full_payload() {
        let line = r#"{"data":{"Channel ID":"3","Alarm Type":"Motion Alarm","Camera Name":"Garage"},"date":"2024-06-15T10:00:00+02:00"}"#;
        let event = decode_alert(line, Utc::now()).unwrap();

        assert_eq!(event.channel(), "3");
        assert_eq!(event.kind(), "Motion Alarm");
        assert_eq!(event.source_label(), "Garage");
        assert_eq!(event.timestamp(), Utc.with_ymd_and_hms(2024, 6, 15, 8, 0, 0).unwrap());
        assert_eq!(event.raw()["data"]["Camera Name"], "Garage");
    }

    #[test]
    fn test_decode_defaults() {
        let received = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let event = decode_alert(r#"{"data":{"Channel ID":7}}"#, received).unwrap();

        assert_eq!(event.channel(), "7");
        assert_eq!(event.kind(), "Unknown Alarm");
        assert_eq!(event.source_label(), "Camera 7");
        assert_eq!(event.timestamp(), received);
    }

    #[test]
    fn test_decode_rejects_missing_channel() {
        let result = decode_alert(r#"{"data":{"Alarm Type":"Video Loss"}}"#, Utc::now());
        assert!(matches!(result, Err(DecodeError::MissingChannel)));

        let result = decode_alert(r#"{"data":{"Channel ID":""}}"#, Utc::now());
        assert!(matches!(result, Err(DecodeError::MissingChannel)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_alert("not json", Utc::now()), Err(DecodeError::Json(_))));
        assert!(matches!(decode_alert(r#"{"date":"x"}"#, Utc::now()), Err(DecodeError::Json(_))));
    }
}
