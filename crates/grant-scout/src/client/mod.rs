//! Upstream Simpler Grants API client.
//!
//! Thin reqwest wrapper with bounded retries for transport faults, a typed
//! error taxonomy for HTTP failures, and passive tracking of the upstream
//! rate-limit headers. Response decoding and error classification live in
//! [`interpret_response`] so they can be tested without a socket.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::GrantsApiConfig;

const ERROR_MESSAGE_MAX_LEN: usize = 500;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

/// Failures talking to the upstream grants API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("rate limited by upstream, retry after {retry_after}s: {message}")]
    RateLimited { retry_after: u64, message: String },

    #[error("upstream returned {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error("network failure after {attempts} attempt(s): {source}")]
    Network {
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },
}

/// Snapshot of upstream health from a probe request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiHealth {
    pub status: String,
    pub response_time_ms: u64,
    pub rate_limit_remaining: Option<u64>,
}

/// Last-seen upstream rate-limit headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub reset_epoch: Option<u64>,
}

/// Abstraction over the opportunity search backend so services and tests
/// can swap the real client for a stub.
#[async_trait]
pub trait OpportunitySource: Send + Sync {
    async fn search_opportunities(&self, filters: Map<String, Value>) -> Result<Value, ApiError>;
    async fn search_agencies(&self, filters: Map<String, Value>) -> Result<Value, ApiError>;
    async fn get_opportunity(&self, opportunity_id: &str) -> Result<Value, ApiError>;
    async fn health(&self) -> Result<ApiHealth, ApiError>;
}

/// HTTP client for the Simpler Grants API.
pub struct GrantsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: usize,
    rate_limit: Mutex<RateLimitState>,
}

impl GrantsApiClient {
    pub fn new(config: &GrantsApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|source| ApiError::Network {
                attempts: 0,
                source,
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            rate_limit: Mutex::new(RateLimitState::default()),
        })
    }

    /// Rate-limit headers observed on the most recent response.
    pub fn rate_limit_state(&self) -> RateLimitState {
        *self.rate_limit.lock().expect("rate limit mutex poisoned")
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            let result = self
                .http
                .post(&url)
                .header("X-Api-Key", &self.api_key)
                .json(&body)
                .send()
                .await;

            match result {
                Ok(response) => return self.decode(response).await,
                Err(source) if is_transient(&source) && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        path,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(ApiError::Network {
                        attempts: attempt + 1,
                        source,
                    })
                }
            }
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;

        loop {
            let result = self
                .http
                .get(&url)
                .header("X-Api-Key", &self.api_key)
                .send()
                .await;

            match result {
                Ok(response) => return self.decode(response).await,
                Err(source) if is_transient(&source) && attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        path,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(ApiError::Network {
                        attempts: attempt + 1,
                        source,
                    })
                }
            }
        }
    }

    async fn decode(&self, response: reqwest::Response) -> Result<Value, ApiError> {
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.unwrap_or_default();
        let body: Option<Value> = serde_json::from_str(&text).ok();

        let outcome = interpret_response(status, &headers, body);
        self.record_rate_limit(&headers);
        outcome
    }

    fn record_rate_limit(&self, headers: &HeaderMap) {
        let observed = rate_limit_from_headers(headers);
        if observed.remaining.is_some() || observed.reset_epoch.is_some() {
            let mut state = self.rate_limit.lock().expect("rate limit mutex poisoned");
            *state = observed;
            debug!(remaining = ?observed.remaining, "upstream rate limit observed");
        }
    }
}

/// Merge caller filters with the defaults the discovery tools always apply,
/// then wrap them in the upstream search envelope.
fn search_body(filters: Map<String, Value>) -> Value {
    let mut filters = filters;
    filters
        .entry("opportunity_status".to_string())
        .or_insert_with(|| json!({"one_of": ["posted", "forecasted"]}));

    json!({
        "filters": Value::Object(filters),
        "pagination": {
            "page_size": 25,
            "page_offset": 1,
            "sort_order": [{"order_by": "opportunity_id", "sort_direction": "descending"}],
        },
    })
}

#[async_trait]
impl OpportunitySource for GrantsApiClient {
    async fn search_opportunities(&self, filters: Map<String, Value>) -> Result<Value, ApiError> {
        self.post_json("/opportunities/search", search_body(filters))
            .await
    }

    async fn search_agencies(&self, filters: Map<String, Value>) -> Result<Value, ApiError> {
        let body = json!({
            "filters": Value::Object(filters),
            "pagination": {
                "page_size": 25,
                "page_offset": 1,
                "sort_order": [{"order_by": "agency_code", "sort_direction": "ascending"}],
            },
        });
        self.post_json("/agencies/search", body).await
    }

    async fn get_opportunity(&self, opportunity_id: &str) -> Result<Value, ApiError> {
        self.get_json(&format!("/opportunities/{opportunity_id}"))
            .await
    }

    async fn health(&self) -> Result<ApiHealth, ApiError> {
        let started = Instant::now();
        self.post_json("/opportunities/search", search_body(Map::new()))
            .await?;

        Ok(ApiHealth {
            status: "healthy".to_string(),
            response_time_ms: started.elapsed().as_millis() as u64,
            rate_limit_remaining: self.rate_limit_state().remaining,
        })
    }
}

/// Classify an upstream HTTP exchange. Pure so the taxonomy is unit-testable:
/// 2xx passes the body through, 429 surfaces `Retry-After`, and anything else
/// becomes [`ApiError::Upstream`] with a truncated message.
pub fn interpret_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: Option<Value>,
) -> Result<Value, ApiError> {
    if status.is_success() {
        return Ok(body.unwrap_or(Value::Null));
    }

    let message = truncated_message(&body, status);

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = header_u64(headers, "retry-after").unwrap_or(60);
        return Err(ApiError::RateLimited {
            retry_after,
            message,
        });
    }

    Err(ApiError::Upstream {
        status: status.as_u16(),
        message,
        body,
    })
}

fn truncated_message(body: &Option<Value>, status: StatusCode) -> String {
    let raw = body
        .as_ref()
        .and_then(|b| b.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("upstream error")
                .to_string()
        });

    if raw.len() > ERROR_MESSAGE_MAX_LEN {
        raw.chars().take(ERROR_MESSAGE_MAX_LEN).collect()
    } else {
        raw
    }
}

fn rate_limit_from_headers(headers: &HeaderMap) -> RateLimitState {
    RateLimitState {
        remaining: header_u64(headers, "x-ratelimit-remaining"),
        reset_epoch: header_u64(headers, "x-ratelimit-reset"),
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Only transport-level faults are retried. HTTP error statuses already
/// reached the server and are never replayed.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn backoff_delay(attempt: usize) -> Duration {
    let exp = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt as u32);
    exp.min(RETRY_MAX_DELAY)
}
