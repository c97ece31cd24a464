//! The data service: request dispatch, cache freshness and refetching.
//!
//! `DataService::get` never fails. Invalid requests, network errors, empty
//! payloads and corrupted cache entries are logged, and the caller gets the
//! best data still available (a stale cache entry, or an empty table).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api::StatsSource;
use crate::cache::{CacheEntry, CacheManager, CacheStore};
use crate::models::{
    build_headers, regions, DisplayRows, HeaderDescriptor, RawRecord, RegionDirectory, StateRow,
    TableRow, TotalRow,
};

/// Default cache TTL: 4 hours.
pub const DEFAULT_CACHE_TTL_HOURS: f64 = 4.0;

const MILLIS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;

/// Prefix shared by every cache key the service writes.
const CACHE_KEY_PREFIX: &str = "covidResponse";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No usable data returned for {0}")]
    EmptyResponse(String),

    #[error("Failed to fetch {key}: {cause:#}")]
    Fetch { key: String, cause: anyhow::Error },
}

// ============================================================================
// Requests
// ============================================================================

/// Loosely-typed request as sent by UI code: `{type, state?, dateString?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub date_string: Option<String>,
}

impl GetParams {
    /// Aggregate-by-region request for a date (`YYYYMMDD`).
    pub fn total(date_string: &str) -> Self {
        Self {
            kind: "total".to_string(),
            date_string: Some(date_string.to_string()),
            ..Default::default()
        }
    }

    /// Time-series request for one region.
    pub fn state(code: &str) -> Self {
        Self {
            kind: "state".to_string(),
            state: Some(code.to_string()),
            ..Default::default()
        }
    }
}

/// A validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Total { date_string: String },
    State { state: String },
}

impl RequestKind {
    pub fn from_params(params: &GetParams) -> Result<Self, ServiceError> {
        fn required(value: &Option<String>, name: &str, kind: &str) -> Result<String, ServiceError> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(ServiceError::InvalidRequest(format!(
                    "missing {} for {} request",
                    name, kind
                ))),
            }
        }

        match params.kind.as_str() {
            "total" => {
                let date_string = required(&params.date_string, "dateString", "total")?;
                // Interpolated into the request path and cache key
                let is_date = date_string.len() == 8
                    && date_string.bytes().all(|b| b.is_ascii_digit())
                    && NaiveDate::parse_from_str(&date_string, "%Y%m%d").is_ok();
                if !is_date {
                    return Err(ServiceError::InvalidRequest(format!(
                        "dateString must be YYYYMMDD, got {:?}",
                        date_string
                    )));
                }
                Ok(RequestKind::Total { date_string })
            }
            "state" => {
                let state = required(&params.state, "state", "state")?;
                if state.len() != 2 || !state.bytes().all(|b| b.is_ascii_alphabetic()) {
                    return Err(ServiceError::InvalidRequest(format!(
                        "state must be a two-letter code, got {:?}",
                        state
                    )));
                }
                Ok(RequestKind::State { state })
            }
            other => Err(ServiceError::InvalidRequest(format!(
                "unknown request type {:?}",
                other
            ))),
        }
    }

    /// Path relative to the API root
    pub fn path(&self) -> String {
        match self {
            RequestKind::Total { date_string } => format!("states/{}", date_string),
            RequestKind::State { state } => format!("state/{}", state),
        }
    }

    pub fn cache_key(&self) -> String {
        match self {
            RequestKind::Total { date_string } => format!("{}-{}", CACHE_KEY_PREFIX, date_string),
            RequestKind::State { state } => format!("{}-{}", CACHE_KEY_PREFIX, state),
        }
    }

    /// Row fields that never become visible columns.
    pub fn excluded_fields(&self) -> &'static [&'static str] {
        match self {
            RequestKind::Total { .. } => &[
                "positiveIncrease",
                "deathIncrease",
                "totalTestResultsIncrease",
                "stateName",
            ],
            RequestKind::State { .. } => &[
                "positiveIncrease",
                "deathIncrease",
                "totalTestResultsIncrease",
                "day",
                "state",
                "country",
            ],
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Where the returned table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    /// Fresh cache entry, no request made
    Cache,
    /// Fetched from the API just now
    Network,
    /// The fetch failed; this is the previous cache entry
    Fallback,
    /// Nothing available
    Empty,
}

/// Renderable table: `{headers, data}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableData {
    pub headers: Vec<HeaderDescriptor>,
    pub data: DisplayRows,
    #[serde(skip)]
    pub origin: DataOrigin,
    /// Epoch milliseconds of the underlying fetch
    #[serde(skip)]
    pub timestamp: Option<i64>,
}

impl TableData {
    pub fn empty() -> Self {
        Self {
            headers: Vec::new(),
            data: DisplayRows::Total(Vec::new()),
            origin: DataOrigin::Empty,
            timestamp: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.data.is_empty()
    }

    /// Time since the underlying fetch, if it is known
    pub fn age(&self) -> Option<Duration> {
        self.timestamp
            .map(|ts| Duration::milliseconds(Utc::now().timestamp_millis() - ts))
    }
}

/// A row type the service can produce from raw records.
pub trait ServiceRow: TableRow + Serialize + DeserializeOwned + Send + Sync {
    fn from_record(record: &RawRecord) -> Self;

    fn into_rows(rows: Vec<Self>) -> DisplayRows;
}

impl ServiceRow for TotalRow {
    fn from_record(record: &RawRecord) -> Self {
        TotalRow::from_record(record)
    }

    fn into_rows(rows: Vec<Self>) -> DisplayRows {
        DisplayRows::Total(rows)
    }
}

impl ServiceRow for StateRow {
    fn from_record(record: &RawRecord) -> Self {
        StateRow::from_record(record)
    }

    fn into_rows(rows: Vec<Self>) -> DisplayRows {
        DisplayRows::State(rows)
    }
}

/// Outcome of one lookup: the best entry available plus what happened.
struct Resolution<R> {
    entry: Option<CacheEntry<R>>,
    outcome: Result<DataOrigin, ServiceError>,
}

impl<R: ServiceRow> Resolution<R> {
    fn into_table(self) -> (TableData, Result<DataOrigin, ServiceError>) {
        let table = match self.entry {
            Some(entry) => TableData {
                headers: entry.headers,
                data: R::into_rows(entry.data),
                origin: match &self.outcome {
                    Ok(origin) => *origin,
                    Err(_) => DataOrigin::Fallback,
                },
                timestamp: entry.timestamp,
            },
            None => TableData::empty(),
        };
        (table, self.outcome)
    }
}

// ============================================================================
// Service
// ============================================================================

/// Fetch, reshape and cache statistics tables.
pub struct DataService {
    source: Arc<dyn StatsSource>,
    cache: CacheManager,
    cache_ttl_ms: AtomicI64,
}

impl DataService {
    pub fn new(source: Arc<dyn StatsSource>, store: Arc<dyn CacheStore>) -> Self {
        Self {
            source,
            cache: CacheManager::new(store),
            cache_ttl_ms: AtomicI64::new(hours_to_millis(DEFAULT_CACHE_TTL_HOURS)),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::milliseconds(self.cache_ttl_ms.load(Ordering::Relaxed))
    }

    /// Replace the TTL used by every later freshness check, including for
    /// entries already cached. Negative or non-finite values become zero.
    pub fn set_cache_ttl(&self, hours: f64) {
        let ms = hours_to_millis(hours);
        debug!(ttl_ms = ms, "Cache TTL updated");
        self.cache_ttl_ms.store(ms, Ordering::Relaxed);
    }

    pub fn get_states(&self) -> &'static RegionDirectory {
        regions()
    }

    /// Cached table if fresh, otherwise fetch. Never fails.
    pub async fn get(&self, params: &GetParams) -> TableData {
        self.get_or_degrade(params, false).await
    }

    /// Like `get`, but always fetches.
    pub async fn refresh(&self, params: &GetParams) -> TableData {
        self.get_or_degrade(params, true).await
    }

    /// Like `get`, but reports failures instead of falling back.
    pub async fn try_get(&self, params: &GetParams) -> Result<TableData, ServiceError> {
        let kind = RequestKind::from_params(params)?;
        let (table, outcome) = self.dispatch(&kind, false).await;
        outcome.map(|_| table)
    }

    async fn get_or_degrade(&self, params: &GetParams, force: bool) -> TableData {
        let kind = match RequestKind::from_params(params) {
            Ok(kind) => kind,
            Err(e) => {
                error!(error = %e, params = ?params, "Error getting data");
                return TableData::empty();
            }
        };

        let (table, outcome) = self.dispatch(&kind, force).await;
        if let Err(e) = outcome {
            error!(error = %e, "Error loading covid19 data");
            if table.origin == DataOrigin::Fallback {
                warn!(key = %kind.cache_key(), cached_at = ?table.timestamp, "Serving previous cache entry");
            }
        }
        table
    }

    async fn dispatch(
        &self,
        kind: &RequestKind,
        force: bool,
    ) -> (TableData, Result<DataOrigin, ServiceError>) {
        match kind {
            RequestKind::Total { .. } => self.resolve::<TotalRow>(kind, force).await.into_table(),
            RequestKind::State { .. } => self.resolve::<StateRow>(kind, force).await.into_table(),
        }
    }

    async fn resolve<R: ServiceRow>(&self, kind: &RequestKind, force: bool) -> Resolution<R> {
        let key = kind.cache_key();

        let prior = match self.cache.load::<R>(&key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %format!("{:#}", e), "Unreadable cache entry, treating as miss");
                None
            }
        };

        let ttl = self.cache_ttl();
        if !force && prior.as_ref().is_some_and(|entry| entry.is_fresh(ttl)) {
            debug!(key = %key, "Cache hit");
            return Resolution {
                entry: prior,
                outcome: Ok(DataOrigin::Cache),
            };
        }

        debug!(key = %key, cached = prior.is_some(), force = force, "Cache miss or stale");
        match self.fetch::<R>(kind, &key).await {
            Ok(entry) => Resolution {
                entry: Some(entry),
                outcome: Ok(DataOrigin::Network),
            },
            Err(e) => Resolution {
                entry: prior,
                outcome: Err(e),
            },
        }
    }

    async fn fetch<R: ServiceRow>(
        &self,
        kind: &RequestKind,
        key: &str,
    ) -> Result<CacheEntry<R>, ServiceError> {
        let records = self
            .source
            .fetch_items(&kind.path())
            .await
            .map_err(|cause| ServiceError::Fetch {
                key: key.to_string(),
                cause,
            })?;

        let rows: Vec<R> = records.iter().map(R::from_record).collect();
        if rows.is_empty() {
            return Err(ServiceError::EmptyResponse(key.to_string()));
        }

        let headers = build_headers(R::field_names(), kind.excluded_fields());
        let entry = CacheEntry::new(headers, rows);

        // A failed write still leaves the caller with fresh data
        match self.cache.save(key, &entry) {
            Ok(()) => info!(key = %key, rows = entry.data.len(), "Cached fresh data"),
            Err(e) => warn!(key = %key, error = %format!("{:#}", e), "Failed to write cache entry"),
        }

        Ok(entry)
    }
}

fn hours_to_millis(hours: f64) -> i64 {
    if hours.is_finite() && hours > 0.0 {
        (hours * MILLIS_PER_HOUR).round() as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_dispatch() {
        let total = RequestKind::from_params(&GetParams::total("20200420")).unwrap();
        assert_eq!(total.path(), "states/20200420");
        assert_eq!(total.cache_key(), "covidResponse-20200420");

        let state = RequestKind::from_params(&GetParams::state("CA")).unwrap();
        assert_eq!(state.path(), "state/CA");
        assert_eq!(state.cache_key(), "covidResponse-CA");
        assert!(state.excluded_fields().contains(&"country"));
        assert!(!total.excluded_fields().contains(&"state"));
    }

    #[test]
    fn test_invalid_requests() {
        let bogus = GetParams {
            kind: "bogus".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            RequestKind::from_params(&bogus),
            Err(ServiceError::InvalidRequest(_))
        ));

        let no_state = GetParams {
            kind: "state".to_string(),
            state: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(RequestKind::from_params(&no_state).is_err());

        let no_date = GetParams {
            kind: "total".to_string(),
            ..Default::default()
        };
        assert!(RequestKind::from_params(&no_date).is_err());
    }

    #[test]
    fn test_malformed_date_string_is_rejected() {
        for bad in ["2020/04/20", "2020_04_20", "20201340", "2020042", "202004201", "２０２００４２０"] {
            assert!(
                matches!(
                    RequestKind::from_params(&GetParams::total(bad)),
                    Err(ServiceError::InvalidRequest(_))
                ),
                "{:?} should be rejected",
                bad
            );
        }

        let padded = RequestKind::from_params(&GetParams::total(" 20200229 ")).unwrap();
        assert_eq!(padded.cache_key(), "covidResponse-20200229");
    }

    #[test]
    fn test_malformed_state_code_is_rejected() {
        for bad in ["C/A", "CAL", "C", "../"] {
            assert!(RequestKind::from_params(&GetParams::state(bad)).is_err(), "{:?}", bad);
        }
        assert!(RequestKind::from_params(&GetParams::state("wa")).is_ok());
    }

    #[test]
    fn test_params_deserialize_from_ui_shape() {
        let params: GetParams =
            serde_json::from_str(r#"{"type": "state", "state": "NY"}"#).unwrap();
        assert_eq!(params, GetParams::state("NY"));

        let params: GetParams =
            serde_json::from_str(r#"{"type": "total", "dateString": "20200420"}"#).unwrap();
        assert_eq!(params, GetParams::total("20200420"));
    }

    #[test]
    fn test_hours_to_millis() {
        assert_eq!(hours_to_millis(4.0), 4 * 60 * 60 * 1000);
        assert_eq!(hours_to_millis(0.5), 30 * 60 * 1000);
        assert_eq!(hours_to_millis(-1.0), 0);
        assert_eq!(hours_to_millis(f64::NAN), 0);
    }

    #[test]
    fn test_empty_table_serializes_as_empty_shape() {
        let json = serde_json::to_value(TableData::empty()).unwrap();
        assert_eq!(json, serde_json::json!({"headers": [], "data": []}));
    }
}
