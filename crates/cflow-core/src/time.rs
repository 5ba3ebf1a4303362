//! Timestamp normalization.
//!
//! Every timestamp coming from a tracker is converted to `DateTime<Utc>`
//! before it reaches the graph. Accepted inputs:
//! - RFC 3339, including a trailing `Z` (`2023-01-01T00:00:00Z`)
//! - ISO 8601 with a colon-less offset, as Jira sends (`2023-01-01T10:00:00.000+0000`)
//! - naive date-times, read as UTC (`2023-01-01T00:00:00`)

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{CflowError, CflowResult};

/// Normalized timestamp representation.
pub type Timestamp = DateTime<Utc>;

/// Parse a tracker timestamp string into a UTC timestamp.
pub fn parse_timestamp(raw: &str) -> CflowResult<Timestamp> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }

    Err(CflowError::parse(format!("invalid ISO-8601 timestamp '{}'", raw)))
}

/// Parse an optional timestamp; `None` and empty strings stay `None`.
pub fn parse_optional_timestamp(raw: Option<&str>) -> CflowResult<Option<Timestamp>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_timestamp(s).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trailing_z() {
        let ts = parse_timestamp("2023-01-01T00:00:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_offset_is_preserved_as_instant() {
        let ts = parse_timestamp("2023-01-01T02:30:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 1, 1, 0, 30, 0).unwrap());
    }

    #[test]
    fn test_jira_offset_without_colon() {
        let ts = parse_timestamp("2024-03-05T10:15:30.123+0100").unwrap();
        assert_eq!(ts.timestamp(), Utc.with_ymd_and_hms(2024, 3, 5, 9, 15, 30).unwrap().timestamp());
        assert_eq!(ts.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn test_naive_is_utc() {
        let ts = parse_timestamp("2023-06-01T12:00:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_invalid() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, CflowError::Parse(_)));
    }

    #[test]
    fn test_optional() {
        assert!(parse_optional_timestamp(None).unwrap().is_none());
        assert!(parse_optional_timestamp(Some("")).unwrap().is_none());
        assert!(parse_optional_timestamp(Some("2023-01-01T00:00:00Z")).unwrap().is_some());
        assert!(parse_optional_timestamp(Some("nope")).is_err());
    }
}
