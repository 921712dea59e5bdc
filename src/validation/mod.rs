//! Query-parameter validators.
//!
//! Each validator turns the raw string of one parameter into a typed
//! [`ParamValue`] or a [`ValidationReason`]. Validators are grouped into
//! [`ValidatorSet`]s, one per search surface; call sites ask the set for the
//! concrete type they expect (`size`, `date`, `sort`, ...) so no untyped
//! value escapes this module.

use crate::models::{ClosedEnum, Date, DateError, ReleaseSort, ReleaseType, Sort, Suggestion};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Largest page a caller may request
pub const MAX_LIMIT: usize = 1000;

/// Facet fields a caller may aggregate on
pub const AGGREGATION_FIELDS: &[&str] = &["content_types", "topic", "dimensions", "population_type"];

/// Why a parameter was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    NonNumeric,
    Negative,
    TooHigh,
    Malformed,
    OutOfRange,
    Unknown,
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValidationReason::NonNumeric => "value is not a number",
            ValidationReason::Negative => "value is negative",
            ValidationReason::TooHigh => "value exceeds the maximum",
            ValidationReason::Malformed => "value is malformed",
            ValidationReason::OutOfRange => "value is out of range",
            ValidationReason::Unknown => "value is not recognised",
        };
        f.write_str(text)
    }
}

/// A parameter failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {param} parameter")]
pub struct ValidationError {
    pub param: String,
    pub reason: ValidationReason,
}

impl ValidationError {
    pub fn new(param: impl Into<String>, reason: ValidationReason) -> Self {
        Self {
            param: param.into(),
            reason,
        }
    }
}

/// Typed result of a successful validation
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Size(usize),
    Date(Date),
    Sort(Sort),
    ReleaseSort(ReleaseSort),
    ReleaseType(ReleaseType),
    Suggestion(Suggestion),
    Flag(bool),
    Field(String),
}

impl ParamValue {
    /// Canonical string form; parsing it again yields the same value
    pub fn format(&self) -> String {
        match self {
            ParamValue::Size(n) => n.to_string(),
            ParamValue::Date(d) => d.to_string(),
            ParamValue::Sort(s) => s.format(),
            ParamValue::ReleaseSort(s) => s.format(),
            ParamValue::ReleaseType(t) => t.format(),
            ParamValue::Suggestion(s) => s.format(),
            ParamValue::Flag(b) => b.to_string(),
            ParamValue::Field(f) => f.clone(),
        }
    }
}

/// Parses one parameter
pub type ValidateFn = fn(&str) -> Result<ParamValue, ValidationReason>;

pub fn validate_limit(raw: &str) -> Result<ParamValue, ValidationReason> {
    let n = parse_integer(raw)?;
    if n > MAX_LIMIT as i64 {
        return Err(ValidationReason::TooHigh);
    }
    Ok(ParamValue::Size(n as usize))
}

pub fn validate_offset(raw: &str) -> Result<ParamValue, ValidationReason> {
    let n = parse_integer(raw)?;
    usize::try_from(n)
        .map(ParamValue::Size)
        .map_err(|_| ValidationReason::TooHigh)
}

fn parse_integer(raw: &str) -> Result<i64, ValidationReason> {
    let n: i64 = raw.trim().parse().map_err(|_| ValidationReason::NonNumeric)?;
    if n < 0 {
        return Err(ValidationReason::Negative);
    }
    Ok(n)
}

pub fn validate_date(raw: &str) -> Result<ParamValue, ValidationReason> {
    Date::parse(raw).map(ParamValue::Date).map_err(|e| match e {
        DateError::Malformed => ValidationReason::Malformed,
        DateError::OutOfRange => ValidationReason::OutOfRange,
    })
}

pub fn validate_sort(raw: &str) -> Result<ParamValue, ValidationReason> {
    Sort::parse(raw)
        .map(ParamValue::Sort)
        .map_err(|_| ValidationReason::Unknown)
}

pub fn validate_release_sort(raw: &str) -> Result<ParamValue, ValidationReason> {
    ReleaseSort::parse(raw)
        .map(ParamValue::ReleaseSort)
        .map_err(|_| ValidationReason::Unknown)
}

pub fn validate_release_type(raw: &str) -> Result<ParamValue, ValidationReason> {
    ReleaseType::parse(raw)
        .map(ParamValue::ReleaseType)
        .map_err(|_| ValidationReason::Unknown)
}

pub fn validate_suggestion(raw: &str) -> Result<ParamValue, ValidationReason> {
    Suggestion::parse(raw)
        .map(ParamValue::Suggestion)
        .map_err(|_| ValidationReason::Unknown)
}

pub fn validate_flag(raw: &str) -> Result<ParamValue, ValidationReason> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "true" | "1" => Ok(ParamValue::Flag(true)),
        "false" | "0" => Ok(ParamValue::Flag(false)),
        _ => Err(ValidationReason::Malformed),
    }
}

pub fn validate_aggregation_field(raw: &str) -> Result<ParamValue, ValidationReason> {
    let field = raw.trim().to_ascii_lowercase();
    if AGGREGATION_FIELDS.contains(&field.as_str()) {
        Ok(ParamValue::Field(field))
    } else {
        Err(ValidationReason::Unknown)
    }
}

/// Named validators for one search surface
#[derive(Debug, Clone)]
pub struct ValidatorSet {
    validators: HashMap<&'static str, ValidateFn>,
}

impl ValidatorSet {
    /// Validators shared by every surface
    fn paging() -> Self {
        let mut validators: HashMap<&'static str, ValidateFn> = HashMap::new();
        validators.insert("limit", validate_limit);
        validators.insert("offset", validate_offset);
        Self { validators }
    }

    /// Validators for the content search
    pub fn search() -> Self {
        let mut set = Self::paging();
        set.validators.insert("sort", validate_sort);
        set.validators.insert("fromDate", validate_date);
        set.validators.insert("toDate", validate_date);
        set.validators.insert("highlight", validate_flag);
        set.validators.insert("latest", validate_flag);
        set.validators.insert("upcoming", validate_flag);
        set.validators.insert("published", validate_flag);
        set.validators.insert("suggest", validate_suggestion);
        set.validators.insert("agg", validate_aggregation_field);
        set
    }

    /// Validators for the release calendar search
    pub fn release() -> Self {
        let mut set = Self::paging();
        set.validators.insert("sort", validate_release_sort);
        set.validators.insert("fromDate", validate_date);
        set.validators.insert("toDate", validate_date);
        set.validators.insert("release-type", validate_release_type);
        set.validators.insert("subtype-provisional", validate_flag);
        set.validators.insert("subtype-confirmed", validate_flag);
        set.validators.insert("subtype-postponed", validate_flag);
        set.validators.insert("census", validate_flag);
        set.validators.insert("highlight", validate_flag);
        set
    }

    pub fn contains(&self, param: &str) -> bool {
        self.validators.contains_key(param)
    }

    /// Run the named validator
    pub fn validate(&self, param: &str, raw: &str) -> Result<ParamValue, ValidationError> {
        let validator = self
            .validators
            .get(param)
            .ok_or_else(|| ValidationError::new(param, ValidationReason::Unknown))?;
        validator(raw).map_err(|reason| ValidationError::new(param, reason))
    }

    pub fn size(&self, param: &str, raw: &str) -> Result<usize, ValidationError> {
        match self.validate(param, raw)? {
            ParamValue::Size(n) => Ok(n),
            _ => Err(mismatch(param)),
        }
    }

    pub fn date(&self, param: &str, raw: &str) -> Result<Date, ValidationError> {
        match self.validate(param, raw)? {
            ParamValue::Date(d) => Ok(d),
            _ => Err(mismatch(param)),
        }
    }

    pub fn sort(&self, param: &str, raw: &str) -> Result<Sort, ValidationError> {
        match self.validate(param, raw)? {
            ParamValue::Sort(s) => Ok(s),
            _ => Err(mismatch(param)),
        }
    }

    pub fn release_sort(&self, param: &str, raw: &str) -> Result<ReleaseSort, ValidationError> {
        match self.validate(param, raw)? {
            ParamValue::ReleaseSort(s) => Ok(s),
            _ => Err(mismatch(param)),
        }
    }

    pub fn release_type(&self, param: &str, raw: &str) -> Result<ReleaseType, ValidationError> {
        match self.validate(param, raw)? {
            ParamValue::ReleaseType(t) => Ok(t),
            _ => Err(mismatch(param)),
        }
    }

    pub fn suggestion(&self, param: &str, raw: &str) -> Result<Suggestion, ValidationError> {
        match self.validate(param, raw)? {
            ParamValue::Suggestion(s) => Ok(s),
            _ => Err(mismatch(param)),
        }
    }

    pub fn flag(&self, param: &str, raw: &str) -> Result<bool, ValidationError> {
        match self.validate(param, raw)? {
            ParamValue::Flag(b) => Ok(b),
            _ => Err(mismatch(param)),
        }
    }

    pub fn field(&self, param: &str, raw: &str) -> Result<String, ValidationError> {
        match self.validate(param, raw)? {
            ParamValue::Field(f) => Ok(f),
            _ => Err(mismatch(param)),
        }
    }
}

// A validator registered under a name returned a different value type
fn mismatch(param: &str) -> ValidationError {
    ValidationError::new(param, ValidationReason::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit() {
        assert_eq!(validate_limit("10"), Ok(ParamValue::Size(10)));
        assert_eq!(validate_limit("0"), Ok(ParamValue::Size(0)));
        assert_eq!(validate_limit("1000"), Ok(ParamValue::Size(1000)));
        assert_eq!(validate_limit("1001"), Err(ValidationReason::TooHigh));
        assert_eq!(validate_limit("-1"), Err(ValidationReason::Negative));
        assert_eq!(validate_limit("ten"), Err(ValidationReason::NonNumeric));
        assert_eq!(validate_limit(""), Err(ValidationReason::NonNumeric));
    }

    #[test]
    fn test_offset() {
        assert_eq!(validate_offset("5000"), Ok(ParamValue::Size(5000)));
        assert_eq!(validate_offset("-3"), Err(ValidationReason::Negative));
        assert_eq!(validate_offset("3.5"), Err(ValidationReason::NonNumeric));
    }

    #[test]
    fn test_date() {
        assert_eq!(validate_date(""), Ok(ParamValue::Date(Date::zero())));
        assert_eq!(validate_date("2021/01/01"), Err(ValidationReason::Malformed));
        assert_eq!(validate_date("1700-01-01"), Err(ValidationReason::OutOfRange));
    }

    #[test]
    fn test_enums_case_insensitive() {
        assert_eq!(validate_sort("TITLE"), Ok(ParamValue::Sort(Sort::Title)));
        assert_eq!(validate_sort("bogus"), Err(ValidationReason::Unknown));
        assert_eq!(
            validate_release_type("Type-Upcoming"),
            Ok(ParamValue::ReleaseType(ReleaseType::Upcoming))
        );
        assert_eq!(validate_release_sort("newest"), Err(ValidationReason::Unknown));
    }

    #[test]
    fn test_round_trip_law() {
        let cases: &[(ValidateFn, &str)] = &[
            (validate_limit, "25"),
            (validate_offset, "40"),
            (validate_date, "2021-06-01"),
            (validate_date, ""),
            (validate_sort, "Release_Date"),
            (validate_release_sort, "title_desc"),
            (validate_release_type, "cancelled"),
            (validate_suggestion, "TERM"),
            (validate_flag, ""),
            (validate_flag, "false"),
            (validate_aggregation_field, "Topic"),
        ];

        for (validator, raw) in cases {
            let value = validator(raw).unwrap();
            assert_eq!(validator(&value.format()).unwrap(), value, "input {raw:?}");
        }
    }

    #[test]
    fn test_sets_share_paging() {
        let search = ValidatorSet::search();
        let release = ValidatorSet::release();
        for set in [&search, &release] {
            assert!(set.contains("limit"));
            assert!(set.contains("offset"));
        }
        assert!(search.contains("agg"));
        assert!(!release.contains("agg"));
        assert!(release.contains("release-type"));
    }

    #[test]
    fn test_typed_accessors() {
        let set = ValidatorSet::search();
        assert_eq!(set.size("limit", "7").unwrap(), 7);
        assert_eq!(set.sort("sort", "title").unwrap(), Sort::Title);

        let err = set.size("limit", "1001").unwrap_err();
        assert_eq!(err.param, "limit");
        assert_eq!(err.reason, ValidationReason::TooHigh);
        assert_eq!(err.to_string(), "Invalid limit parameter");

        // asking for the wrong type is rejected rather than coerced
        assert!(set.date("limit", "7").is_err());
    }

    #[test]
    fn test_release_sort_differs_from_search_sort() {
        let release = ValidatorSet::release();
        assert_eq!(
            release.release_sort("sort", "title_asc").unwrap(),
            ReleaseSort::TitleAsc
        );
        assert!(release.sort("sort", "title_asc").is_err());
    }
}
