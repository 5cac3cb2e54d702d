use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Persisted state of one dispatch attempt.
///
/// `pending` is written here when a job is dispatched; `heartbeat` is only
/// ever written by the recording worker once it is capturing audio. Legacy
/// markers name these `oxbow` (attempt) and `now` (heartbeat), and may carry
/// fractional epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_epoch"
    )]
    pub pending: Option<i64>,

    /// Unparsable values decode as `None`
    #[serde(
        default,
        alias = "oxbow",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_attempt"
    )]
    pub attempt: Option<u32>,

    #[serde(
        default,
        alias = "now",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_epoch"
    )]
    pub heartbeat: Option<i64>,
}

impl ProgressRecord {
    /// Marker written at dispatch time
    pub fn dispatched(now: DateTime<Utc>, attempt: u32) -> Self {
        Self {
            pending: Some(now.timestamp()),
            attempt: Some(attempt),
            heartbeat: None,
        }
    }

    pub fn pending_at(&self) -> Option<DateTime<Utc>> {
        self.pending.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn heartbeat_at(&self) -> Option<DateTime<Utc>> {
        self.heartbeat
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Attempt to use when redispatching a stalled start
    pub fn next_attempt(&self) -> u32 {
        self.attempt.map_or(0, |attempt| attempt.saturating_add(1))
    }
}

fn lenient_epoch<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.floor() as i64),
        _ => None,
    })
}

fn lenient_attempt<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatched_round_trips() {
        let now = DateTime::from_timestamp(1_765_317_480, 0).unwrap();
        let record = ProgressRecord::dispatched(now, 2);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"pending":1765317480,"attempt":2}"#);
        assert_eq!(serde_json::from_str::<ProgressRecord>(&json).unwrap(), record);
    }

    #[test]
    fn test_legacy_field_names() {
        let record: ProgressRecord =
            serde_json::from_str(r#"{"now": 1765317480.731, "oxbow": 3}"#).unwrap();
        assert_eq!(record.heartbeat, Some(1_765_317_480));
        assert_eq!(record.attempt, Some(3));
        assert_eq!(record.pending, None);
    }

    #[test]
    fn test_unparsable_attempt_falls_back() {
        let record: ProgressRecord =
            serde_json::from_str(r#"{"pending": 10, "attempt": false}"#).unwrap();
        assert_eq!(record.attempt, None);
        assert_eq!(record.next_attempt(), 0);

        let record: ProgressRecord =
            serde_json::from_str(r#"{"pending": 10, "attempt": "4"}"#).unwrap();
        assert_eq!(record.next_attempt(), 5);
    }

    #[test]
    fn test_timestamps() {
        let record = ProgressRecord {
            pending: Some(60),
            heartbeat: Some(120),
            attempt: None,
        };
        assert_eq!(record.pending_at().unwrap().timestamp(), 60);
        assert_eq!(record.heartbeat_at().unwrap().timestamp(), 120);
    }
}
