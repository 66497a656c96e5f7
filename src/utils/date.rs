//! Lenient publication date parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Formats without an offset, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Formats carrying a numeric offset.
const OFFSET_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%Y-%m-%d %H:%M:%S %z",
];

/// Parse a feed date in any of the common RSS/Atom spellings.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Like [`parse_date`], falling back to the Unix epoch.
pub fn parse_date_or_epoch(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(parse_date).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 5).unwrap()
    }

    #[test]
    fn test_rfc2822_variants() {
        assert_eq!(parse_date("Tue, 02 Jan 2024 15:04:05 +0000"), Some(expected()));
        assert_eq!(parse_date("Tue, 2 Jan 2024 15:04:05 GMT"), Some(expected()));
        assert_eq!(parse_date("Tue, 02 Jan 2024 16:04:05 +0100"), Some(expected()));
    }

    #[test]
    fn test_rfc3339_and_naive() {
        assert_eq!(parse_date("2024-01-02T15:04:05Z"), Some(expected()));
        assert_eq!(parse_date("2024-01-02T17:04:05+02:00"), Some(expected()));
        assert_eq!(parse_date("2024-01-02 15:04:05"), Some(expected()));
        assert_eq!(
            parse_date("2024-01-02"),
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unparseable_falls_back_to_epoch() {
        assert_eq!(parse_date("yesterday-ish"), None);
        assert_eq!(parse_date_or_epoch(Some("garbage")), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(parse_date_or_epoch(None), DateTime::<Utc>::UNIX_EPOCH);
    }
}
