//! Rating events and the raw records the store hands back
//!
//! A `RatingEvent` is what a participant submits. The store keeps it as a
//! schemaless document (`RawRecord`), so anything read back has to be
//! normalized again before analysis.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// One stored document, keyed by column name
pub type RawRecord = Map<String, Value>;

pub const VIDEO_ID_KEY: &str = "video_id";
/// Key used by records written before `video_id` was introduced
pub const LEGACY_VIDEO_ID_KEY: &str = "videoid";
pub const USERNAME_KEY: &str = "username";
pub const TIMESTAMP_KEY: &str = "timestamp";
pub const DATE_KEY: &str = "date";

/// Keys that identify a row rather than carry a measured value
pub const IDENTIFIER_KEYS: [&str; 6] = [
    VIDEO_ID_KEY,
    LEGACY_VIDEO_ID_KEY,
    USERNAME_KEY,
    TIMESTAMP_KEY,
    DATE_KEY,
    "_id",
];

/// Whether a record key is an identifier column
pub fn is_identifier_key(key: &str) -> bool {
    IDENTIFIER_KEYS.contains(&key)
}

/// One submitted data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEvent {
    pub video_id: String,
    pub username: String,
    /// Position in the video, seconds
    pub timestamp: f64,
    /// Slider readings in submission order
    pub measured_values: Vec<(String, f64)>,
    pub date: Option<String>,
}

impl RatingEvent {
    /// Validate a participant submission
    ///
    /// `names` and `values` are parallel lists, one entry per slider variable.
    pub fn from_submission(
        video_id: &str,
        username: &str,
        timestamp: f64,
        names: &[String],
        values: &[f64],
        date: Option<String>,
    ) -> Result<Self> {
        if video_id.trim().is_empty() {
            return Err(Error::InvalidInput("video id is required".to_string()));
        }
        if username.trim().is_empty() {
            return Err(Error::InvalidInput("username not set".to_string()));
        }
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(Error::InvalidInput(format!(
                "timestamp must be a non-negative number of seconds, got {}",
                timestamp
            )));
        }
        if names.is_empty() {
            return Err(Error::InvalidInput(
                "at least one measured value is required".to_string(),
            ));
        }
        if names.len() != values.len() {
            return Err(Error::InvalidInput(format!(
                "{} variable names but {} values",
                names.len(),
                values.len()
            )));
        }

        let mut measured_values = Vec::with_capacity(names.len());
        for (name, value) in names.iter().zip(values) {
            let name = name.trim();
            if name.is_empty() || is_identifier_key(name) {
                return Err(Error::InvalidInput(format!(
                    "'{}' is not a usable variable name",
                    name
                )));
            }
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "value for '{}' is not a finite number",
                    name
                )));
            }
            if measured_values.iter().any(|(n, _): &(String, f64)| n == name) {
                return Err(Error::InvalidInput(format!(
                    "variable '{}' submitted twice",
                    name
                )));
            }
            measured_values.push((name.to_string(), *value));
        }

        Ok(Self {
            video_id: video_id.trim().to_string(),
            username: username.to_string(),
            timestamp,
            measured_values,
            date,
        })
    }

    /// Reject events positioned after `max_timestamp` seconds
    pub fn check_timestamp_limit(&self, max_timestamp: f64) -> Result<()> {
        if self.timestamp > max_timestamp {
            return Err(Error::InvalidInput(format!(
                "timestamp {} is beyond the accepted maximum of {} seconds",
                self.timestamp, max_timestamp
            )));
        }
        Ok(())
    }

    /// Canonical document layout: identifiers, measured values, date
    pub fn to_record(&self) -> RawRecord {
        let mut record = Map::new();
        record.insert(VIDEO_ID_KEY.to_string(), Value::String(self.video_id.clone()));
        record.insert(USERNAME_KEY.to_string(), Value::String(self.username.clone()));
        record.insert(TIMESTAMP_KEY.to_string(), number(self.timestamp));
        for (name, value) in &self.measured_values {
            record.insert(name.clone(), number(*value));
        }
        if let Some(date) = &self.date {
            record.insert(DATE_KEY.to_string(), Value::String(date.clone()));
        }
        record
    }
}

fn number(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Read a string-ish identifier, coercing numbers
pub fn value_as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Video id of a raw record, from `video_id` or the legacy `videoid`
pub fn record_video_id(record: &RawRecord) -> Option<String> {
    record
        .get(VIDEO_ID_KEY)
        .or_else(|| record.get(LEGACY_VIDEO_ID_KEY))
        .and_then(value_as_identifier)
}

/// Username of a raw record
pub fn record_username(record: &RawRecord) -> Option<String> {
    record.get(USERNAME_KEY).and_then(value_as_identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_submission_round_trips_to_record() {
        let event = RatingEvent::from_submission(
            "42",
            "alice",
            12.5,
            &names(&["value", "value2"]),
            &[61.0, 30.0],
            Some("2018-05-04".to_string()),
        )
        .unwrap();

        let record = event.to_record();
        let keys: Vec<&str> = record.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["video_id", "username", "timestamp", "value", "value2", "date"]
        );
        assert_eq!(record["timestamp"].as_f64(), Some(12.5));
        assert_eq!(record_video_id(&record), Some("42".to_string()));
    }

    #[test]
    fn test_submission_rejects_mismatched_lengths() {
        let result =
            RatingEvent::from_submission("42", "alice", 1.0, &names(&["value"]), &[1.0, 2.0], None);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_submission_rejects_negative_timestamp() {
        let result =
            RatingEvent::from_submission("42", "alice", -1.0, &names(&["value"]), &[1.0], None);
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_limit() {
        let event =
            RatingEvent::from_submission("42", "alice", 1e20, &names(&["value"]), &[1.0], None)
                .unwrap();
        assert!(matches!(
            event.check_timestamp_limit(86_400.0),
            Err(Error::InvalidInput(_))
        ));

        let event =
            RatingEvent::from_submission("42", "alice", 86_400.0, &names(&["value"]), &[1.0], None)
                .unwrap();
        assert!(event.check_timestamp_limit(86_400.0).is_ok());
    }

    #[test]
    fn test_submission_rejects_identifier_as_variable() {
        let result =
            RatingEvent::from_submission("42", "alice", 1.0, &names(&["timestamp"]), &[1.0], None);
        assert!(result.is_err());
    }

    #[test]
    fn test_submission_requires_username() {
        let result = RatingEvent::from_submission("42", "  ", 1.0, &names(&["value"]), &[1.0], None);
        assert!(result.is_err());
    }

    #[test]
    fn test_legacy_video_key_and_numeric_ids() {
        let mut record = RawRecord::new();
        record.insert("videoid".to_string(), Value::from(65107797));
        assert_eq!(record_video_id(&record), Some("65107797".to_string()));

        record.insert("video_id".to_string(), Value::from("7"));
        assert_eq!(record_video_id(&record), Some("7".to_string()));
    }
}
