//! Header helpers for API payloads: lookup, `Date:` parsing, charset decoding.
//!
//! The mail API already unfolds headers and resolves RFC 2047 encoded
//! words, so only the lookups and the date/charset fallbacks remain here.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Case-insensitive header lookup; returns the first match.
pub fn get_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Read the `charset` parameter from a `Content-Type` value.
///
/// `text/html; charset="ISO-8859-1"` → `Some("ISO-8859-1")`.
pub fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"').trim();
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// Parse an API `internalDate` (milliseconds since the Unix epoch, as a string).
pub fn parse_internal_date(millis: &str) -> Option<DateTime<Utc>> {
    let ms: i64 = millis.trim().parse().ok()?;
    Utc.timestamp_millis_opt(ms).single()
}

/// Parse a `Date:` header value with multiple fallback formats.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // "Fri, 15 Mar 2024 10:00:00 +0000 (UTC)": drop the trailing comment
    let no_comment = match trimmed.find(" (") {
        Some(pos) => trimmed[..pos].trim(),
        None => trimmed,
    };
    let no_dow = strip_day_of_week(no_comment);
    let candidate = replace_named_tz(&no_dow);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    warn!(date = trimmed, "Could not parse date header");
    None
}

/// Decode body bytes using a named charset, falling back to lossy UTF-8.
pub fn decode_charset(charset: Option<&str>, bytes: &[u8]) -> String {
    let Some(charset) = charset else {
        return String::from_utf8_lossy(bytes).into_owned();
    };
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            let rest = rest.strip_prefix(',').unwrap_or(rest);
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CEST", "+0200"),
        ("CET", "+0100"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_get_header_case_insensitive() {
        let h = headers(&[("SUBJECT", "Hi"), ("From", "a@b.com")]);
        assert_eq!(get_header(&h, "subject"), Some("Hi"));
        assert_eq!(get_header(&h, "from"), Some("a@b.com"));
        assert_eq!(get_header(&h, "date"), None);
    }

    #[test]
    fn test_charset_param() {
        assert_eq!(
            charset_param("text/html; charset=\"ISO-8859-1\"").as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(
            charset_param("text/plain; format=flowed; Charset=utf-8").as_deref(),
            Some("utf-8")
        );
        assert_eq!(charset_param("text/plain"), None);
    }

    #[test]
    fn test_parse_internal_date() {
        let dt = parse_internal_date("1710496800000").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 15));
        assert!(parse_internal_date("not a number").is_none());
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Fri, 15 Mar 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.day(), 15);
    }

    #[test]
    fn test_parse_date_with_comment_and_named_tz() {
        assert!(parse_date("Fri, 15 Mar 2024 10:00:00 +0000 (UTC)").is_some());
        assert!(parse_date("15 Mar 2024 10:00:00 PST").is_some());
    }

    #[test]
    fn test_parse_date_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday-ish").is_none());
    }

    #[test]
    fn test_decode_charset_latin1() {
        assert_eq!(decode_charset(Some("ISO-8859-1"), &[0x63, 0x61, 0x66, 0xE9]), "café");
        assert_eq!(decode_charset(None, "plain".as_bytes()), "plain");
        assert_eq!(decode_charset(Some("x-unknown"), b"abc"), "abc");
    }
}
