use reqwest::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::config::{REQUEST_MAX_RETRIES, REQUEST_TIMEOUT_MS, RETRY_BASE_DELAY_MS};
use crate::error::{ClientError, ClientResult, UserNotice};
use crate::session::Session;

/// Per-call options for [`Transport::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<serde_json::Value>,
    /// Extra attempts after the first, spent only on transient failures
    /// (HTTP 429/5xx and transport errors).
    pub retries: u32,
    pub timeout: Duration,
    /// Skip bearer-token injection (auth endpoints).
    pub skip_auth: bool,
    /// Suppress the user-facing failure notice.
    pub silent: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        RequestOptions {
            method: Method::GET,
            body: None,
            retries: REQUEST_MAX_RETRIES,
            timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            skip_auth: false,
            silent: false,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: serde_json::Value) -> Self {
        RequestOptions {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }
}

/// Normalized success payload: the `data` envelope is unwrapped when the
/// backend wraps its response, so callers always get the payload itself.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub data: serde_json::Value,
    pub status: u16,
    pub message: Option<String>,
}

/// Resilient request client every network call goes through: enforces a
/// per-call deadline, retries transient failures with linear backoff, and
/// classifies failures into [`ClientError`].
pub struct Transport {
    base_url: Url,
    client: reqwest::Client,
    session: Arc<Session>,
    retry_base_delay: Duration,
}

impl Transport {
    pub fn new(base_url: Url, session: Arc<Session>) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Transport {
            base_url,
            client,
            session,
            retry_base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        })
    }

    /// Shrink the linear backoff base (tests).
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn request(&self, path: &str, opts: RequestOptions) -> ClientResult<ApiResponse> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::Network(format!("Invalid URL {path}: {e}")))?;

        let mut retries_used = 0u32;
        loop {
            match self.attempt(&url, &opts).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && retries_used < opts.retries => {
                    retries_used += 1;
                    // Linear backoff: base, 2*base, 3*base, ...
                    let delay = self.retry_base_delay.saturating_mul(retries_used);
                    warn!(
                        "Request to {} failed ({}), retry {}/{} in {:?}",
                        url, e, retries_used, opts.retries, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    if !opts.silent {
                        self.session.notify(notice_for(&e));
                    }
                    // A rejected session means the token is dead everywhere,
                    // unless the user is mid sign-in (a wrong password must
                    // not bounce them off the auth page).
                    if e.status() == Some(401) && !self.session.in_auth_flow() {
                        self.session.invalidate().await;
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, url: &Url, opts: &RequestOptions) -> ClientResult<ApiResponse> {
        let mut request = self.client.request(opts.method.clone(), url.clone());
        if !opts.skip_auth {
            if let Some(token) = self.session.bearer_token().await {
                request = request.bearer_auth(token);
            }
        }
        if let Some(body) = &opts.body {
            request = request.json(body);
        }

        debug!("{} {}", opts.method, url);
        let response = tokio::time::timeout(opts.timeout, request.send())
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(ClientError::Api { status, body: text });
        }

        let value: serde_json::Value = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))?
        };

        // Unwrap the `{data, message}` envelope when the backend uses one.
        let (data, message) = match &value {
            serde_json::Value::Object(map) if map.contains_key("data") => (
                map.get("data").cloned().unwrap_or(serde_json::Value::Null),
                map.get("message")
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string()),
            ),
            _ => (value, None),
        };

        Ok(ApiResponse {
            data,
            status,
            message,
        })
    }
}

fn notice_for(error: &ClientError) -> UserNotice {
    match error.status() {
        Some(status) => UserNotice::for_status(status),
        None => UserNotice::network(),
    }
}
