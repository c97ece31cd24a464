//! REST API client module for the COVID-19 statistics service.
//!
//! `StatsSource` is the seam the data service fetches through; `ApiClient`
//! is the reqwest implementation. Every endpoint answers with an
//! `{"Items": [...]}` envelope of raw records.

pub mod client;
pub mod error;

pub use client::{
    normalize_endpoint, ApiClient, StatsSource, DEFAULT_API_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::ApiError;
