use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::provider::{FootballApi, Params};

/// Why a single attempt against the API failed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("api reported errors: {0}")]
    Api(String),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

/// Client for the API-Football v3 REST API.
#[derive(Clone)]
pub struct ApiFootballClient {
    http: Client,
    base_url: Url,
    api_key: String,
    host: String,
    max_retries: u32,
    retry_delay: Duration,
    requests: std::sync::Arc<AtomicU64>,
}

impl ApiFootballClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        // A trailing slash keeps `join` from dropping the last path segment.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).context("Invalid API base URL")?;
        let host = base_url.host_str().unwrap_or_default().to_string();
        Ok(ApiFootballClient {
            http,
            base_url,
            api_key: api_key.to_string(),
            host,
            max_retries: max_retries.max(1),
            retry_delay,
            requests: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    async fn attempt(&self, endpoint: &str, params: &Params) -> Result<Value, ApiError> {
        let url = self.base_url.join(endpoint.trim_start_matches('/'))?;
        self.requests.fetch_add(1, Ordering::Relaxed);

        let resp = self
            .http
            .get(url)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .query(params)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ApiError::Status(status));
        }

        let body: Value = resp.json().await?;
        if let Some(errors) = api_errors(&body) {
            return Err(ApiError::Api(errors));
        }
        Ok(body)
    }
}

#[async_trait]
impl FootballApi for ApiFootballClient {
    fn name(&self) -> &str {
        "API-Football"
    }

    async fn fetch(&self, endpoint: &str, params: &Params) -> Option<Value> {
        for attempt in 1..=self.max_retries {
            debug!("GET {} {:?} (attempt {})", endpoint, params, attempt);
            match self.attempt(endpoint, params).await {
                Ok(body) => return Some(body),
                Err(e) => warn!(
                    "{} attempt {}/{} for {} failed: {}",
                    self.name(),
                    attempt,
                    self.max_retries,
                    endpoint,
                    e
                ),
            }
            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        None
    }

    fn requests_made(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}

/// API-Football answers 200 with a populated `errors` field (array or
/// object) for quota and parameter problems.
fn api_errors(body: &Value) -> Option<String> {
    match body.get("errors") {
        Some(Value::Array(a)) if !a.is_empty() => Some(Value::Array(a.clone()).to_string()),
        Some(Value::Object(o)) if !o.is_empty() => Some(Value::Object(o.clone()).to_string()),
        _ => None,
    }
}
