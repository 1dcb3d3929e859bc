//! Timestamp normalization.
//!
//! Feeds and relay messages carry publication times in whatever shape the
//! source emits. The ledger stores one canonical form and announcements
//! render another; both go through [`parse_timestamp`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::error::{FeedheraldError, Result};

/// Canonical format persisted in the ledger's `published` columns.
pub const LEDGER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-facing format used in announcement footers.
pub const DISPLAY_FORMAT: &str = "%d %B %Y, %I:%M %p";

/// Rendered in place of a timestamp that could not be parsed.
pub const INVALID_DATE: &str = "Invalid date";

/// Naive layouts tried after RFC 3339 and RFC 2822, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a source timestamp into UTC. Returns `None` for unrecognized input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_with_offset(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Parse keeping the source's own UTC offset; naive inputs get `+00:00`.
fn parse_with_offset(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt);
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().fixed_offset());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Normalize a source timestamp to [`LEDGER_FORMAT`].
///
/// Fails with [`FeedheraldError::Persistence`] so callers skip the write
/// instead of storing a value the ledger cannot order.
pub fn normalize_timestamp(raw: &str) -> Result<String> {
    parse_timestamp(raw)
        .map(|dt| dt.format(LEDGER_FORMAT).to_string())
        .ok_or_else(|| FeedheraldError::Persistence(format!("unrecognized timestamp '{raw}'")))
}

/// Format a source timestamp for display in its own offset, or
/// [`INVALID_DATE`].
pub fn display_timestamp(raw: &str) -> String {
    match parse_with_offset(raw) {
        Some(dt) => dt.format(DISPLAY_FORMAT).to_string(),
        None => {
            tracing::warn!(raw, "failed to parse timestamp for display");
            INVALID_DATE.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_feed_formats() {
        let cases = [
            ("2024-01-01T00:00:00", "2024-01-01 00:00:00"),
            ("2024-01-01T07:30:00+07:00", "2024-01-01 00:30:00"),
            ("2024-03-05T10:15:30.250Z", "2024-03-05 10:15:30"),
            ("Tue, 02 Jan 2024 08:00:00 GMT", "2024-01-02 08:00:00"),
            ("Tue, 02 Jan 2024 15:00:00 +0700", "2024-01-02 08:00:00"),
            ("2024-01-01 12:34:56", "2024-01-01 12:34:56"),
            ("2024-06-30", "2024-06-30 00:00:00"),
        ];

        for (raw, expected) in cases {
            assert_eq!(normalize_timestamp(raw).expect(raw), expected, "input: {raw}");
        }
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "   ", "yesterday", "2024-13-45T99:00:00"] {
            let err = normalize_timestamp(raw).unwrap_err();
            assert!(matches!(err, FeedheraldError::Persistence(_)), "input: {raw:?}");
        }
    }

    #[test]
    fn display_uses_twelve_hour_clock() {
        assert_eq!(
            display_timestamp("2024-01-01T13:05:00Z"),
            "01 January 2024, 01:05 PM"
        );
        assert_eq!(display_timestamp("not a date"), INVALID_DATE);
    }

    #[test]
    fn display_keeps_source_offset() {
        assert_eq!(
            display_timestamp("2024-01-01T19:05:00+07:00"),
            "01 January 2024, 07:05 PM"
        );
        assert_eq!(
            display_timestamp("Tue, 02 Jan 2024 15:00:00 +0700"),
            "02 January 2024, 03:00 PM"
        );
        assert_eq!(
            normalize_timestamp("2024-01-01T19:05:00+07:00").unwrap(),
            "2024-01-01 12:05:00"
        );
    }
}
