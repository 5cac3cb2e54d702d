use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One configured audio stream, as served by the config source.
///
/// Keys are snake_case. Ids may arrive as JSON numbers or strings. Keys not
/// named here are collected into `unknown` and otherwise ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StreamConfig {
    #[serde(rename = "id", default, deserialize_with = "lenient_id")]
    pub stream_id: Option<String>,

    #[serde(
        rename = "podcast_id",
        alias = "group_id",
        default,
        deserialize_with = "lenient_id"
    )]
    pub group_id: Option<String>,

    /// Stable identity used to name dispatched jobs
    #[serde(rename = "gid", alias = "global_id", default, deserialize_with = "lenient_id")]
    pub global_id: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    /// Opaque completion notification target handed to the worker
    #[serde(alias = "callback_target", default)]
    pub callback: Option<String>,

    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Inclusive: the whole day is recorded
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// UTC weekdays, 0 = Sunday
    #[serde(alias = "record_weekdays", default, deserialize_with = "null_as_empty")]
    pub record_days: Vec<u8>,

    /// UTC hours of the day, 0-23
    #[serde(default, deserialize_with = "null_as_empty")]
    pub record_hours: Vec<u8>,

    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

impl StreamConfig {
    /// Short identity for log fields
    pub fn label(&self) -> String {
        format!(
            "{}/{}",
            self.group_id.as_deref().unwrap_or("-"),
            self.stream_id.as_deref().unwrap_or("-")
        )
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, found {other}"
        ))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<u8>>::deserialize(deserializer)?.unwrap_or_default())
}
