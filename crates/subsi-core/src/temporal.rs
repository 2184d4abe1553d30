//! # Temporal Types — UTC-Only Timestamps
//!
//! `Timestamp` is UTC, truncated to seconds, and always renders as
//! `YYYY-MM-DDTHH:MM:SSZ`. Credentials issued by external wallets may carry
//! sub-second precision or explicit offsets; those are normalised on the way
//! in so that the canonical bytes of an attestation never depend on how the
//! wallet happened to format its dates.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SubsiError;

/// A UTC-only timestamp, truncated to seconds precision.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time, truncated.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating sub-seconds.
/// - [`Timestamp::parse()`] — strict: only `Z`-suffixed RFC 3339.
/// - [`Timestamp::parse_lenient()`] — any RFC 3339 offset, converted to UTC.
///
/// Deserialization is lenient; serialization is always the strict form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse a `Z`-suffixed RFC 3339 string.
    ///
    /// # Errors
    ///
    /// Returns `SubsiError::Validation` if the string is not RFC 3339 or uses
    /// an explicit offset (even `+00:00`).
    pub fn parse(s: &str) -> Result<Self, SubsiError> {
        if !s.ends_with('Z') {
            return Err(SubsiError::Validation(format!(
                "timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse any RFC 3339 string, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, SubsiError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| SubsiError::Validation(format!("invalid RFC 3339 timestamp {s:?}: {e}")))?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Create a timestamp from Unix epoch seconds.
    pub fn from_epoch_secs(secs: i64) -> Result<Self, SubsiError> {
        DateTime::from_timestamp(secs, 0)
            .map(Self)
            .ok_or_else(|| SubsiError::Validation(format!("invalid Unix timestamp: {secs}")))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as ISO 8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_lenient(&s).map_err(serde::de::Error::custom)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_has_no_subseconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2025, 10, 3, 0, 21, 16).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(216_000_000).unwrap());
        assert_eq!(ts.to_iso8601(), "2025-10-03T00:21:16Z");
    }

    #[test]
    fn test_parse_strict_rejects_offsets() {
        assert!(Timestamp::parse("2024-01-01T00:00:00Z").is_ok());
        assert!(Timestamp::parse("2024-01-01T00:00:00+00:00").is_err());
        assert!(Timestamp::parse("2024-01-01").is_err());
    }

    #[test]
    fn test_parse_lenient_converts_offset() {
        let ts = Timestamp::parse_lenient("2026-01-15T17:00:00+05:00").unwrap();
        assert_eq!(ts.to_iso8601(), "2026-01-15T12:00:00Z");
    }

    #[test]
    fn test_epoch_roundtrip() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z").unwrap();
        assert_eq!(Timestamp::from_epoch_secs(ts.epoch_secs()).unwrap(), ts);
    }

    #[test]
    fn test_serde_normalises_wallet_formats() {
        let ts: Timestamp = serde_json::from_str("\"2025-10-03T00:21:16.216Z\"").unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"2025-10-03T00:21:16Z\"");
        assert!(serde_json::from_str::<Timestamp>("\"yesterday\"").is_err());
    }
}
