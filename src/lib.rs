//! covidcache - fetch, cache and reshape COVID-19 statistics for tables.
//!
//! The entry point is [`DataService`]: it turns a `{type, state?, dateString?}`
//! request into display-ready rows plus column headers, reusing a local
//! cache entry while it is younger than the configured TTL.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod render;
pub mod service;
pub mod stores;
pub mod utils;

pub use service::{DataOrigin, DataService, GetParams, RequestKind, ServiceError, TableData};
