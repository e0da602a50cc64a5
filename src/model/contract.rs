use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::ObjectId;

/// Capability every persisted entity implements so a [`Repository`] can store it.
///
/// Identity is assigned once by the repository and never changes afterwards.
/// Timestamps are stamped by the repository, not by calling code.
///
/// [`Repository`]: crate::store::Repository
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> ObjectId;
    fn set_id(&mut self, id: ObjectId);
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

/// Current UTC instant truncated to the millisecond, the precision we persist.
pub fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Fixed-width RFC 3339 (millisecond) serialization so stored timestamps sort
/// lexicographically in chronological order.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Stamped {
        #[serde(with = "timestamp")]
        at: DateTime<Utc>,
    }

    #[test]
    fn test_timestamps_are_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap();
        let json = serde_json::to_string(&Stamped { at: whole }).unwrap();
        assert_eq!(json, r#"{"at":"2026-10-18T09:30:00.000Z"}"#);

        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(back.at, whole);
    }

    #[test]
    fn test_now_is_millisecond_precision() {
        let now = now_utc();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
