//! Date window filtering and `YYYY/MM/DD` option parsing.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};

use crate::error::{FetchError, Result};

/// `true` iff `timestamp` lies in `[from, to]`.
///
/// A missing timestamp fails the window whenever either bound is set.
pub fn passes_date_window(
    timestamp: Option<DateTime<Utc>>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> bool {
    if from.is_none() && to.is_none() {
        return true;
    }
    let Some(ts) = timestamp else {
        return false;
    };
    from.is_none_or(|f| ts >= f) && to.is_none_or(|t| ts <= t)
}

/// Parse a configuration date. Accepts `YYYY/MM/DD` and `YYYY-MM-DD`.
pub fn parse_config_date(value: &str, what: &str) -> Result<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| FetchError::Config(format!("Invalid {what} '{value}': expected YYYY/MM/DD")))
}

/// First instant of `date` (UTC).
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last representable instant of `date` (UTC), so the whole day is included.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + TimeDelta::days(1) - TimeDelta::nanoseconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_bounds_accepts_everything() {
        assert!(passes_date_window(None, None, None));
        assert!(passes_date_window(Some(at(1999, 1, 1, 0)), None, None));
    }

    #[test]
    fn test_missing_timestamp_fails_any_bound() {
        assert!(!passes_date_window(None, Some(at(2024, 1, 1, 0)), None));
        assert!(!passes_date_window(None, None, Some(at(2024, 1, 1, 0))));
    }

    #[test]
    fn test_inclusive_bounds() {
        let from = start_of_day(day(2024, 1, 1));
        let to = end_of_day(day(2024, 12, 31));
        assert!(passes_date_window(Some(from), Some(from), Some(to)));
        assert!(passes_date_window(Some(at(2024, 12, 31, 23)), Some(from), Some(to)));
        assert!(!passes_date_window(Some(at(2025, 1, 1, 0)), Some(from), Some(to)));
        assert!(!passes_date_window(Some(at(2023, 12, 31, 23)), Some(from), Some(to)));
    }

    #[test]
    fn test_widening_never_rejects() {
        let from = Some(start_of_day(day(2024, 3, 1)));
        let to = Some(end_of_day(day(2024, 3, 31)));
        let samples = [
            None,
            Some(at(2024, 2, 28, 12)),
            Some(at(2024, 3, 15, 12)),
            Some(at(2024, 4, 2, 12)),
        ];
        for ts in samples {
            let narrow = passes_date_window(ts, from, to);
            if narrow {
                assert!(passes_date_window(ts, None, to));
                assert!(passes_date_window(ts, from, None));
                assert!(passes_date_window(ts, None, None));
            }
            if passes_date_window(ts, from, None) || passes_date_window(ts, None, to) {
                assert!(passes_date_window(ts, None, None));
            }
        }
    }

    #[test]
    fn test_parse_config_date_formats() {
        assert_eq!(parse_config_date("2024/03/15", "date").unwrap(), day(2024, 3, 15));
        assert_eq!(parse_config_date("2024-03-15", "date").unwrap(), day(2024, 3, 15));
        assert!(matches!(
            parse_config_date("15/03/2024", "date_from"),
            Err(FetchError::Config(_))
        ));
        assert!(parse_config_date("2024/02/30", "date").is_err());
    }
}
