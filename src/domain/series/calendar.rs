//! Timestamp parsing and the weekday-only trading calendar.
//!
//! Forecast dates never consult an exchange holiday calendar: a "trading day"
//! is any Monday to Friday.

use crate::domain::errors::ForecastError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Naive formats tried in order after the date-only form.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parses a timestamp in any of the accepted representations.
///
/// Order: `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, fractional seconds, ISO 8601
/// with a `T` separator, then RFC 3339 with an offset (kept as wall time).
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ForecastError> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.naive_local())
        .map_err(|_| ForecastError::DateParse {
            raw: raw.to_string(),
        })
}

/// A last-observation timestamp as stored by a data source: either already a
/// date/time value or text that still has to be parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Native(NaiveDateTime),
    Text(String),
}

impl RawTimestamp {
    pub fn parse(&self) -> Result<NaiveDateTime, ForecastError> {
        match self {
            RawTimestamp::Native(dt) => Ok(*dt),
            RawTimestamp::Text(raw) => parse_timestamp(raw),
        }
    }

    /// Label used in results, independent of how the value was stored.
    pub fn label(&self) -> String {
        match self {
            RawTimestamp::Native(dt) => dt.format(super::types::TIMESTAMP_FORMAT).to_string(),
            RawTimestamp::Text(raw) => raw.clone(),
        }
    }
}

impl From<NaiveDateTime> for RawTimestamp {
    fn from(dt: NaiveDateTime) -> Self {
        RawTimestamp::Native(dt)
    }
}

/// Outcome of resolving a seed timestamp; `caveat` is set when the value
/// could not be parsed and `now` was substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTimestamp {
    pub value: NaiveDateTime,
    pub caveat: Option<String>,
}

/// Resolves `raw`, falling back to `now` with a recorded warning.
pub fn resolve_or_now(raw: &RawTimestamp, now: NaiveDateTime) -> ResolvedTimestamp {
    match raw.parse() {
        Ok(value) => ResolvedTimestamp {
            value,
            caveat: None,
        },
        Err(e) => {
            let caveat = format!("{}; forecast dates start from the current time instead", e);
            warn!("{}", caveat);
            ResolvedTimestamp {
                value: now,
                caveat: Some(caveat),
            }
        }
    }
}

pub fn is_weekend(dt: &NaiveDateTime) -> bool {
    matches!(dt.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Advances one calendar day, then skips Saturday and Sunday.
pub fn next_trading_day(dt: NaiveDateTime) -> NaiveDateTime {
    let mut next = dt + Duration::days(1);
    while is_weekend(&next) {
        next += Duration::days(1);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, min, s).unwrap())
    }

    #[test]
    fn test_parse_accepted_formats() {
        let expected = at(2024, 1, 5, 0, 0, 0);
        assert_eq!(parse_timestamp("2024-01-05").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-05 00:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp(" 2024-01-05T00:00:00 ").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-01-05 18:45:10.250").unwrap(),
            at(2024, 1, 5, 18, 45, 10) + Duration::milliseconds(250)
        );
        assert_eq!(
            parse_timestamp("2024-01-05T10:00:00+03:00").unwrap(),
            at(2024, 1, 5, 10, 0, 0)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(err.kind(), "date_parse_error");
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("2024-13-45").is_err());
    }

    #[test]
    fn test_friday_rolls_to_monday() {
        // 2024-01-05 is a Friday
        let friday = at(2024, 1, 5, 0, 0, 0);
        let next = next_trading_day(friday);
        assert_eq!(next, at(2024, 1, 8, 0, 0, 0));
        assert_eq!(next.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_weekend_seed_lands_on_monday() {
        let saturday = at(2024, 1, 6, 12, 0, 0);
        assert_eq!(next_trading_day(saturday), at(2024, 1, 8, 12, 0, 0));
        let sunday = at(2024, 1, 7, 0, 0, 0);
        assert_eq!(next_trading_day(sunday), at(2024, 1, 8, 0, 0, 0));
    }

    #[test]
    fn test_midweek_advances_one_day() {
        let tuesday = at(2024, 1, 2, 0, 0, 0);
        assert_eq!(next_trading_day(tuesday), at(2024, 1, 3, 0, 0, 0));
    }

    #[test]
    fn test_resolve_falls_back_to_now_with_caveat() {
        let now = at(2024, 6, 1, 9, 30, 0);
        let resolved = resolve_or_now(&RawTimestamp::Text("n/a".to_string()), now);
        assert_eq!(resolved.value, now);
        assert!(resolved.caveat.unwrap().contains("n/a"));

        let resolved = resolve_or_now(&RawTimestamp::Text("2024-01-05".to_string()), now);
        assert_eq!(resolved.value, at(2024, 1, 5, 0, 0, 0));
        assert!(resolved.caveat.is_none());
    }

    #[test]
    fn test_raw_timestamp_untagged_serde() {
        let native: RawTimestamp = serde_json::from_str("\"2024-01-05T00:00:00\"").unwrap();
        assert_eq!(native, RawTimestamp::Native(at(2024, 1, 5, 0, 0, 0)));

        let text: RawTimestamp = serde_json::from_str("\"2024-01-05\"").unwrap();
        assert_eq!(text, RawTimestamp::Text("2024-01-05".to_string()));
        assert_eq!(text.parse().unwrap(), at(2024, 1, 5, 0, 0, 0));
        assert_eq!(native.label(), "2024-01-05 00:00:00");
    }
}
