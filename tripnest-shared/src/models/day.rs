//! Calendar days stored as day-boundary timestamps.
//!
//! Rows keep `start_date` / `end_date` as ISO-8601 timestamps pinned to
//! midnight UTC. Older rows and other backends also hand back plain
//! `YYYY-MM-DD` strings or Postgres-style `YYYY-MM-DD HH:MM:SS`, so parsing is
//! lenient while formatting is always the canonical timestamp form.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parse a stored date into a calendar day, ignoring time of day.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(day);
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|ts| ts.date())
}

/// Canonical stored form: midnight UTC of `day`.
pub fn day_boundary(day: NaiveDate) -> String {
    format!("{}T00:00:00Z", day.format("%Y-%m-%d"))
}

/// Serde adapter for `NaiveDate` fields persisted as day-boundary timestamps.
pub mod as_timestamp {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(day: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::day_boundary(*day))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_day(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid calendar date: {}", raw)))
    }
}
