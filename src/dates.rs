//! Textual date encodings shared by the form, the wire payloads and the
//! detail view.
//!
//! The remote API is not consistent about offsets: timestamps may come back
//! as RFC 3339 (`2024-03-01T14:30:00Z`) or as a bare local date-time
//! (`2024-03-01T14:30:00`). Bare values are read as UTC, and everything the
//! client edits or displays is UTC as well.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Deserializer};

/// Calendar date as edited in the form.
pub const DATE_INPUT_FORMAT: &str = "%Y-%m-%d";
/// Date-time as edited in the form, truncated to the minute.
pub const DATETIME_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parse a timestamp from the API or from user input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Parse a calendar date; full timestamps are accepted and keep their date part.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_INPUT_FORMAT) {
        return Some(date);
    }
    // The date as written, not shifted into UTC.
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    parse_timestamp(raw).map(|dt| dt.date_naive())
}

pub fn date_input(date: NaiveDate) -> String {
    date.format(DATE_INPUT_FORMAT).to_string()
}

pub fn datetime_input(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_INPUT_FORMAT).to_string()
}

/// Parse the minute-precision form value back into a full timestamp.
pub fn parse_datetime_input(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_INPUT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Calendar date on the wire: midnight UTC, millisecond precision.
pub fn date_to_wire(date: NaiveDate) -> String {
    timestamp_to_wire(&date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Timestamp on the wire with seconds and sub-seconds zeroed.
pub fn timestamp_to_wire(dt: &DateTime<Utc>) -> String {
    let truncated = dt
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(*dt);
    truncated.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `Mar 01, 2024`
pub fn display_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

/// `Mar 01, 2024 14:30`
pub fn display_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%b %d, %Y %H:%M").to_string()
}

pub fn deserialize_calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid calendar date '{}'", raw)))
}

pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_accepts_offsets_and_naive_values() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-01T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T16:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T14:30"), Some(expected));
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("next tuesday"), None);
    }

    #[test]
    fn test_calendar_date_keeps_date_part_of_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_calendar_date("2024-03-01"), Some(expected));
        assert_eq!(parse_calendar_date("2024-03-01T00:00:00.000Z"), Some(expected));
        assert_eq!(parse_calendar_date("03/01/2024"), None);
    }

    #[test]
    fn test_calendar_date_ignores_offset() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(parse_calendar_date("2024-03-01T00:00:00+05:30"), Some(expected));
        assert_eq!(parse_calendar_date("2024-03-01T23:30:00-08:00"), Some(expected));
    }

    #[test]
    fn test_datetime_input_truncates_to_minute_and_submit_zeroes_seconds() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 59).unwrap();
        let edited = datetime_input(&dt);
        assert_eq!(edited, "2024-03-01T14:30");

        let restored = parse_datetime_input(&edited).unwrap();
        assert_eq!(timestamp_to_wire(&restored), "2024-03-01T14:30:00.000Z");
        assert_eq!(timestamp_to_wire(&dt), "2024-03-01T14:30:00.000Z");
    }

    #[test]
    fn test_date_to_wire_is_midnight_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(date_to_wire(date), "2024-01-15T00:00:00.000Z");
        assert_eq!(date_input(date), "2024-01-15");
    }

    #[test]
    fn test_display_formats() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
        assert_eq!(display_datetime(&dt), "Mar 01, 2024 09:05");
        assert_eq!(display_date(dt.date_naive()), "Mar 01, 2024");
    }
}
