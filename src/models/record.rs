//! Raw per-region observations as returned by the statistics API.
//!
//! The upstream schema is not ours; every field is optional and unknown
//! fields are ignored.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};
use tracing::warn;

/// One region/date observation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub positive: Option<i64>,
    #[serde(default)]
    pub death: Option<i64>,
    #[serde(default)]
    pub positive_increase: Option<i64>,
    #[serde(default)]
    pub death_increase: Option<i64>,
    #[serde(default)]
    pub hospitalized_currently: Option<i64>,
    #[serde(default)]
    pub in_icu_currently: Option<i64>,
    #[serde(default)]
    pub on_ventilator_currently: Option<i64>,
    #[serde(default)]
    pub pending: Option<i64>,
    #[serde(default)]
    pub total_test_results: Option<i64>,
    #[serde(default)]
    pub total_test_results_increase: Option<i64>,
}

/// Response envelope: `{"Items": [...]}`
#[derive(Debug, Deserialize)]
pub struct ItemsResponse {
    #[serde(rename = "Items")]
    pub items: Vec<RawRecord>,
}

/// Accepts an RFC 3339 string or epoch milliseconds. Anything else is
/// logged and read as `None` so one bad record cannot fail the response.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
        Other(IgnoredAny),
    }

    let timestamp = match Option::<RawTimestamp>::deserialize(deserializer)? {
        None => None,
        Some(RawTimestamp::Millis(ms)) => {
            let parsed = Utc.timestamp_millis_opt(ms).single();
            if parsed.is_none() {
                warn!(millis = ms, "Timestamp out of range, ignoring");
            }
            parsed
        }
        Some(RawTimestamp::Text(text)) => match DateTime::parse_from_rfc3339(&text) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                warn!(value = %text, error = %e, "Unparseable timestamp, ignoring");
                None
            }
        },
        Some(RawTimestamp::Other(_)) => {
            warn!("Timestamp is neither a string nor an integer, ignoring");
            None
        }
    };
    Ok(timestamp)
}
