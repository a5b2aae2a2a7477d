use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a loosely formatted timestamp into UTC.
///
/// Accepts RFC 3339 (with a trailing `Z` normalized to `+00:00`), naive
/// datetimes, bare dates, and RFC 2822. Returns `None` for anything else so
/// callers can decide whether an unparseable date is tolerable.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = match trimmed.strip_suffix('Z') {
        Some(stripped) => format!("{stripped}+00:00"),
        None => trimmed.to_string(),
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(parsed.with_timezone(&Utc));
    }

    // Naive timestamps are assumed to be UTC.
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    DateTime::parse_from_rfc2822(trimmed)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
