//! Search API gateway and reindex pipeline for the publishing site's
//! Elasticsearch cluster.
//!
//! Read path: query string → [`validation`] → [`query`] templates →
//! [`elasticsearch`] multi-search → [`transformer`] → JSON response.
//!
//! Write path: [`reindex`] pulls every published page from the CMS and the
//! datasets catalogue into a fresh index, then moves the `ons` alias onto it.

pub mod api;
pub mod config;
pub mod elasticsearch;
pub mod error;
pub mod health;
pub mod metrics;
pub mod models;
pub mod query;
pub mod reindex;
pub mod transformer;
pub mod validation;

pub use error::{AppError, Result};
