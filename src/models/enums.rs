use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// A string did not match any member of a closed enumeration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Closed enumeration with a case-insensitive string form
pub trait ClosedEnum: FromStr + Display + Sized {
    const KIND: &'static str;

    fn parse(value: &str) -> Result<Self, UnknownVariant> {
        value.parse().map_err(|_| UnknownVariant {
            kind: Self::KIND,
            value: value.to_string(),
        })
    }

    /// Test fixture helper; panics on unknown input
    fn must_parse(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|e| panic!("{e}"))
    }

    fn format(&self) -> String {
        self.to_string()
    }
}

/// Sort order of the content search
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, EnumString, Display, AsRefStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    #[strum(to_string = "relevance")]
    Relevance,
    #[strum(to_string = "title")]
    Title,
    #[strum(to_string = "release_date_asc")]
    ReleaseDateAsc,
    #[strum(to_string = "release_date_desc", serialize = "release_date")]
    ReleaseDateDesc,
    #[strum(to_string = "first_letter")]
    FirstLetter,
}

impl ClosedEnum for Sort {
    const KIND: &'static str = "sort";
}

/// Sort order of the release calendar
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, EnumString, Display, AsRefStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseSort {
    #[strum(to_string = "release_date_asc")]
    ReleaseDateAsc,
    #[default]
    #[strum(to_string = "release_date_desc")]
    ReleaseDateDesc,
    #[strum(to_string = "title_asc")]
    TitleAsc,
    #[strum(to_string = "title_desc")]
    TitleDesc,
}

impl ClosedEnum for ReleaseSort {
    const KIND: &'static str = "sort";
}

/// Lifecycle bucket of a calendar entry
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, EnumString, Display, AsRefStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseType {
    #[strum(to_string = "type-upcoming", serialize = "upcoming")]
    Upcoming,
    #[default]
    #[strum(to_string = "type-published", serialize = "published")]
    Published,
    #[strum(to_string = "type-cancelled", serialize = "cancelled")]
    Cancelled,
}

impl ClosedEnum for ReleaseType {
    const KIND: &'static str = "release-type";
}

/// Suggester rendered into the content sub-query
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, EnumString, Display, AsRefStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Suggestion {
    #[default]
    #[strum(to_string = "phrase")]
    Phrase,
    #[strum(to_string = "term")]
    Term,
}

impl ClosedEnum for Suggestion {
    const KIND: &'static str = "suggest";
}
