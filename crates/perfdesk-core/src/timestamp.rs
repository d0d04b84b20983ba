//! Canonical timestamp handling.
//!
//! Every date that reaches the store is written as RFC 3339 in UTC with
//! millisecond precision and a `Z` suffix (`2024-03-01T09:30:00.000Z`).
//! Callers may hand in a `DateTime`, a loosely formatted string, or nothing
//! at all; [`DateInput::normalize`] folds all three into one value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PerfdeskError, Result};

/// Format a timestamp in the canonical storage form.
pub fn format(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp string.
///
/// Accepts full RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC),
/// and bare `YYYY-MM-DD` dates (UTC midnight).
pub fn parse(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(PerfdeskError::InvalidTimestamp {
        input: input.to_string(),
    })
}

/// A caller-supplied date in whatever shape the caller had at hand.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DateInput {
    Value(DateTime<Utc>),
    Text(String),
    #[default]
    Absent,
}

impl DateInput {
    /// Resolve to a concrete timestamp, using `now` when nothing was given.
    /// The result is cut to millisecond precision, so it equals what a
    /// read of the stored form yields.
    pub fn normalize(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let resolved = match self {
            DateInput::Value(dt) => *dt,
            DateInput::Text(text) => parse(text)?,
            DateInput::Absent => now,
        };
        Ok(resolved.trunc_subsecs(3))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, DateInput::Absent)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(dt: DateTime<Utc>) -> Self {
        DateInput::Value(dt)
    }
}

impl From<Option<DateTime<Utc>>> for DateInput {
    fn from(dt: Option<DateTime<Utc>>) -> Self {
        dt.map(DateInput::Value).unwrap_or_default()
    }
}

impl From<&str> for DateInput {
    fn from(text: &str) -> Self {
        DateInput::Text(text.to_string())
    }
}

impl From<String> for DateInput {
    fn from(text: String) -> Self {
        DateInput::Text(text)
    }
}

/// What a stored timestamp may look like on the way back in. Server-side
/// timestamps arrive as epoch milliseconds.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTime {
    Text(String),
    Millis(i64),
}

impl StoredTime {
    fn into_datetime(self) -> Result<DateTime<Utc>> {
        match self {
            StoredTime::Text(text) => parse(&text),
            StoredTime::Millis(ms) => {
                DateTime::from_timestamp_millis(ms).ok_or(PerfdeskError::InvalidTimestamp {
                    input: ms.to_string(),
                })
            }
        }
    }
}

/// Serde adapter for required timestamp fields.
pub mod canonical {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error> {
        StoredTime::deserialize(deserializer)?
            .into_datetime()
            .map_err(de::Error::custom)
    }
}

/// Serde adapter for optional timestamp fields.
pub mod canonical_opt {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serializer.serialize_some(&format(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<DateTime<Utc>>, D::Error> {
        Option::<StoredTime>::deserialize(deserializer)?
            .map(StoredTime::into_datetime)
            .transpose()
            .map_err(de::Error::custom)
    }
}

/// A timestamp that serializes in canonical form. Handy inside partial
/// update maps where a bare `DateTime` would pick up chrono's own format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Canonical(#[serde(with = "canonical")] pub DateTime<Utc>);
