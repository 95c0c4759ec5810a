//! Authenticated request gateway.
//!
//! Every call to the backend goes through [`Gateway::request`]: the bearer
//! token from the session is attached, JSON bodies are serialised, and non-2xx
//! responses are normalised into [`RequestError`]. The gateway never retries,
//! never writes to the cache and never navigates.

mod options;

pub use options::{HttpMethod, RequestOptions};

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{generic_status_message, ClientError, NetworkError, RequestError};
use crate::session::SessionStore;

/// Status and decoded body of a response, before error normalisation
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionStore>,
    log_requests: bool,
}

impl Gateway {
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        // Url::join drops the last segment of a base without a trailing slash
        let base = format!("{}/", config.api.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&base)
            .map_err(|e| ClientError::Config(format!("invalid API base URL '{}': {}", base, e)))?;

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("lendflow-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(GatewayInner {
                http,
                base_url,
                session,
                log_requests: config.api.enable_request_logging,
            }),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.inner.session
    }

    /// Performs the call and returns the decoded body of a 2xx response
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, ClientError> {
        let response = self.send(path, options).await?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(ClientError::Request(request_error(response.status, &response.body)))
        }
    }

    /// Performs the call without turning non-2xx statuses into errors
    pub async fn send(&self, path: &str, options: RequestOptions) -> Result<RawResponse, NetworkError> {
        let url = self.url_for(path, &options)?;
        let method = options.method;

        let mut builder = self.inner.http.request(method.into(), url);
        if !options.anonymous {
            if let Some(token) = self.inner.session.token() {
                builder = builder.bearer_auth(token);
            }
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(%method, path, error = %e, "request could not be sent");
            NetworkError::from(e)
        })?;

        let status = response.status().as_u16();
        let text = response.text().await?;

        if self.inner.log_requests {
            tracing::info!(%method, path, status, "request completed");
        } else {
            tracing::debug!(%method, path, status, "request completed");
        }

        Ok(RawResponse {
            status,
            body: decode_body(&text),
        })
    }

    fn url_for(&self, path: &str, options: &RequestOptions) -> Result<Url, NetworkError> {
        let mut url = self
            .inner
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| NetworkError::new(format!("invalid request path '{}': {}", path, e)))?;

        if !options.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &options.params {
                pairs.append_pair(name, value);
            }
        }

        Ok(url)
    }
}

/// Empty bodies decode to `null`; non-JSON text is kept as a JSON string
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// `message` from the error body, then `error`, when they are non-empty strings
pub(crate) fn error_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|field| body.get(field).and_then(Value::as_str))
        .map(str::trim)
        .find(|message| !message.is_empty())
        .map(str::to_string)
}

pub(crate) fn request_error(status: u16, body: &Value) -> RequestError {
    let message = error_message(body).unwrap_or_else(|| generic_status_message(status));
    RequestError::new(status, message)
}
