use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a feed timestamp.
///
/// RSS dates are RFC 2822 in theory; in practice publishers also send
/// RFC 3339, bare `YYYY-MM-DD HH:MM:SS` (read as UTC), or a plain date
/// (UTC midnight). Returns `None` for anything else, including empty input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_supported_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();

        assert_eq!(parse_timestamp("2024-03-05T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T09:30:00-05:00"), Some(expected));
        assert_eq!(
            parse_timestamp("Tue, 05 Mar 2024 14:30:00 GMT"),
            Some(expected)
        );
        assert_eq!(
            parse_timestamp("Tue, 05 Mar 2024 09:30:00 -0500"),
            Some(expected)
        );
        assert_eq!(parse_timestamp("2024-03-05 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("  2024-03-05T14:30:00  "), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-05"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_unparseable_input() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-13-45"), None);
    }
}
