//! Lenient date/time parsing.
//!
//! Timestamp quality does not affect referential correctness, so parsing is
//! deliberately forgiving: values in RFC 3339 form (trailing `Z` or an
//! explicit offset) are accepted, date-only values fall back to midnight UTC,
//! and anything else degrades to `None` instead of failing the entry.

use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::trace;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Parses an instant, accepting RFC 3339 or a plain `YYYY-MM-DD` date
/// (interpreted as midnight UTC). Returns `None` for anything else.
pub fn parse_datetime(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(datetime) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(datetime);
    }
    match parse_date(raw) {
        Some(date) => Some(date.midnight().assume_utc()),
        None => {
            trace!(value = raw, "unparseable timestamp degraded to null");
            None
        }
    }
}

/// Parses a `YYYY-MM-DD` calendar date. Returns `None` on failure.
pub fn parse_date(raw: &str) -> Option<Date> {
    match Date::parse(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            trace!(value = raw, "unparseable date degraded to null");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn test_parse_utc_marker() {
        assert_eq!(
            parse_datetime("2020-01-01T00:00:00Z"),
            Some(datetime!(2020-01-01 00:00:00 UTC))
        );
    }

    #[test]
    fn test_parse_explicit_offset_preserved() {
        let parsed = parse_datetime("2015-06-09T11:13:00-04:00").unwrap();
        assert_eq!(
            parsed.to_offset(time::UtcOffset::UTC),
            datetime!(2015-06-09 15:13:00 UTC)
        );
        assert_eq!(parsed.offset(), time::macros::offset!(-4));
    }

    #[test]
    fn test_parse_fractional_seconds() {
        let parsed = parse_datetime("2020-01-01T12:30:00.123Z").unwrap();
        assert_eq!(parsed.millisecond(), 123);
    }

    #[test]
    fn test_date_only_falls_back_to_midnight_utc() {
        assert_eq!(
            parse_datetime("1970-01-01"),
            Some(datetime!(1970-01-01 00:00:00 UTC))
        );
    }

    #[test]
    fn test_garbage_degrades_to_none() {
        assert_eq!(parse_datetime("not-a-date"), None);
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_datetime("2020-13-01T00:00:00Z"), None);
        assert_eq!(parse_datetime("2020-01-32"), None);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("1970-01-01"), Some(date!(1970-01-01)));
        assert_eq!(parse_date("1970-01-32"), None);
        assert_eq!(parse_date("1970-01-01T00:00:00Z"), None);
    }
}
