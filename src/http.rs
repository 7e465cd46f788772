//! HTTP fetch layer with per-run response memoization.
//!
//! One GET-JSON primitive plus a URL-keyed cache. The cache lives inside
//! the client value, which is created fresh per resolution run and never
//! shared across runs; it exists to avoid refetching when different
//! computation phases request the same page.

use crate::error::AuditError;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Settings for the underlying HTTP client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("skyaudit/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Per-run HTTP client with a URL-keyed response cache.
pub struct FetchClient {
    client: reqwest::Client,
    cache: Mutex<HashMap<String, Value>>,
}

impl FetchClient {
    pub fn new(settings: &HttpSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// GET a JSON document. Any non-2xx response is an error carrying
    /// the status code; a JSON parse failure propagates as such.
    pub async fn get_json(&self, url: &str) -> Result<Value, AuditError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuditError::InvalidDocument {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// GET a JSON document, memoizing per exact URL (query string and
    /// cursor included) for the lifetime of this client.
    pub async fn get_json_cached(&self, url: &str) -> Result<Value, AuditError> {
        if let Some(hit) = self.cache.lock().await.get(url) {
            trace!("cache hit for {}", url);
            return Ok(hit.clone());
        }

        let value = self.get_json(url).await?;
        self.cache
            .lock()
            .await
            .insert(url.to_string(), value.clone());
        Ok(value)
    }

    /// POST a JSON body and parse the JSON response. Never cached.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value, AuditError> {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| map_request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuditError::InvalidDocument {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// Number of cached responses (used by the run summary).
    pub async fn cached_responses(&self) -> usize {
        self.cache.lock().await.len()
    }
}

/// Build a URL with percent-encoded query parameters. The returned
/// string is canonical, so it doubles as the cache key.
pub fn build_url(base: &str, params: &[(&str, &str)]) -> Result<String, AuditError> {
    reqwest::Url::parse_with_params(base, params)
        .map(|url| url.to_string())
        .map_err(|e| AuditError::InvalidDocument {
            url: base.to_string(),
            message: format!("invalid URL: {e}"),
        })
}

fn map_request_error(url: &str, e: &reqwest::Error) -> AuditError {
    let message = if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("cannot connect: {e}")
    } else {
        e.to_string()
    };

    AuditError::Network {
        url: url.to_string(),
        message,
    }
}
