use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Wire format of a calendar date
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors produced when parsing a [`Date`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("date must be formatted as YYYY-MM-DD")]
    Malformed,

    #[error("date must be between 1800-01-01 and 2200-01-01")]
    OutOfRange,
}

/// Calendar date used by the release-date filters.
///
/// The zero value means "unset": it formats as an empty string, so it
/// round-trips through the query-string validators, and it is embedded in
/// rendered queries as the JSON literal `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date(Option<NaiveDate>);

impl Date {
    pub fn zero() -> Self {
        Self(None)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|d| Self(Some(d)))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    pub fn naive(&self) -> Option<NaiveDate> {
        self.0
    }

    /// Parse `YYYY-MM-DD`; the empty string yields the zero date
    pub fn parse(value: &str) -> Result<Self, DateError> {
        if value.is_empty() {
            return Ok(Self::zero());
        }

        // chrono accepts unpadded fields, the wire format does not
        if value.len() != 10 {
            return Err(DateError::Malformed);
        }

        let date = NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| DateError::Malformed)?;

        if date < earliest() || date > latest() {
            return Err(DateError::OutOfRange);
        }

        Ok(Self(Some(date)))
    }

    /// Test fixture helper; panics on invalid input
    pub fn must_parse(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|e| panic!("invalid date {value:?}: {e}"))
    }

    /// Text embedded into a rendered query: a quoted date, or `null` when unset
    pub fn query_literal(&self) -> String {
        match self.0 {
            Some(date) => format!("\"{}\"", date.format(DATE_FORMAT)),
            None => "null".to_string(),
        }
    }
}

fn earliest() -> NaiveDate {
    NaiveDate::from_ymd_opt(1800, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn latest() -> NaiveDate {
    NaiveDate::from_ymd_opt(2200, 1, 1).unwrap_or(NaiveDate::MAX)
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            None => Ok(()),
        }
    }
}

impl Serialize for Date {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(date) => serializer.collect_str(&date.format(DATE_FORMAT)),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_date() {
        let date = Date::parse("2021-06-01").unwrap();
        assert_eq!(date, Date::from_ymd(2021, 6, 1).unwrap());
        assert_eq!(date.to_string(), "2021-06-01");
    }

    #[test]
    fn test_empty_is_zero() {
        let date = Date::parse("").unwrap();
        assert!(date.is_zero());
        assert_eq!(date.to_string(), "");
        assert_eq!(Date::parse(&date.to_string()).unwrap(), date);
    }

    #[test]
    fn test_round_trip() {
        for raw in ["1800-01-01", "1999-12-31", "2024-02-29", "2200-01-01"] {
            let date = Date::parse(raw).unwrap();
            assert_eq!(Date::parse(&date.to_string()).unwrap(), date);
        }
    }

    #[test]
    fn test_malformed() {
        for raw in ["2021-6-1", "01/06/2021", "2021-13-01", "yesterday", "2021-06-01T00:00:00Z"] {
            assert_eq!(Date::parse(raw), Err(DateError::Malformed), "{raw}");
        }
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(Date::parse("1799-12-31"), Err(DateError::OutOfRange));
        assert_eq!(Date::parse("2200-01-02"), Err(DateError::OutOfRange));
    }

    #[test]
    fn test_query_literal() {
        assert_eq!(Date::zero().query_literal(), "null");
        assert_eq!(Date::must_parse("2020-01-31").query_literal(), "\"2020-01-31\"");
        assert_eq!(serde_json::to_string(&Date::zero()).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&Date::must_parse("2020-01-31")).unwrap(),
            "\"2020-01-31\""
        );
    }

    #[test]
    #[should_panic]
    fn test_must_parse_panics() {
        Date::must_parse("not-a-date");
    }
}
