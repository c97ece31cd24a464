//! HTTP client for the COVID-19 statistics API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::{debug, info};

use super::ApiError;
use crate::models::{ItemsResponse, RawRecord};

/// Default API root, always ending in `/`
pub const DEFAULT_API_ENDPOINT: &str = "https://johnpangilinan-covid19-api.herokuapp.com/api/";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Source of raw statistics records.
///
/// `path` is relative to the API root, e.g. `states/20200420` or `state/CA`.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch_items(&self, path: &str) -> Result<Vec<RawRecord>>;
}

/// Client for the statistics API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
}

impl ApiClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT_SECS)
    }

    pub fn with_timeout(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: normalize_endpoint(endpoint),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }
}

#[async_trait]
impl StatsSource for ApiClient {
    async fn fetch_items(&self, path: &str) -> Result<Vec<RawRecord>> {
        let url = self.url(path);
        info!(url = %url, "Fetching data from API");

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send GET request to {}", url))?;

        let response = Self::check_response(response).await?;

        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        debug!(url = %url, bytes = text.len(), "Response received");

        let parsed: ItemsResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
            .with_context(|| format!("Failed to parse JSON response from {}", url))?;

        Ok(parsed.items)
    }
}

/// Ensure the endpoint ends with exactly one `/`
pub fn normalize_endpoint(endpoint: &str) -> String {
    format!("{}/", endpoint.trim().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("https://x.test/api"), "https://x.test/api/");
        assert_eq!(normalize_endpoint("https://x.test/api/"), "https://x.test/api/");
        assert_eq!(normalize_endpoint("https://x.test/api//"), "https://x.test/api/");
    }

    #[test]
    fn test_url_building() {
        let client = ApiClient::new("https://x.test/api").unwrap();
        assert_eq!(client.url("state/CA"), "https://x.test/api/state/CA");
        assert_eq!(client.url("/states/20200420"), "https://x.test/api/states/20200420");
        assert_eq!(ApiClient::new(DEFAULT_API_ENDPOINT).unwrap().endpoint(), DEFAULT_API_ENDPOINT);
    }
}
