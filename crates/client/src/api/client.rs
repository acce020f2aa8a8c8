//! The authenticated request pipeline.
//!
//! Every call stamps a correlation id, attaches the bearer token when one
//! exists, and funnels the response through a single status taxonomy. A 401
//! triggers one refresh-and-replay cycle; the refresh itself is single-flight
//! across concurrent requests (see [`RefreshCoordinator`]). A second 401 on
//! the replayed request is terminal.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use fluxgate_common::{retry, RetryConfig};
use fluxgate_domain::{RefreshRequest, TokenResponse};

use crate::auth::refresh::RefreshTicket;
use crate::auth::{RefreshCoordinator, SessionStore};
use crate::errors::{http_retry_policy, ApiError};
use crate::notify::{Notifier, Signal, TracingNotifier};

/// All console endpoints live under this prefix.
const API_PREFIX: &str = "/api/v1";

/// Correlation id header stamped on every outbound request.
const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Server origin, without the `/api/v1` prefix.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: ApiClientConfig,
    session: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
}

impl ApiClientBuilder {
    #[must_use]
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            config: ApiClientConfig::default(),
            session,
            notifier: Arc::new(TracingNotifier),
        }
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Validate the configuration and construct the client.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] for an unparsable base URL or an
    /// unbuildable HTTP client.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let base_url = self.config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|err| ApiError::Config(format!("invalid base url {base_url:?}: {err}")))?;

        let http = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|err| ApiError::Config(format!("failed to build http client: {err}")))?;

        Ok(ApiClient {
            http,
            config: ApiClientConfig { base_url, ..self.config },
            session: self.session,
            refresh: RefreshCoordinator::new(),
            notifier: self.notifier,
        })
    }
}

/// One outbound call, carried through dispatch and the optional replay.
struct OutboundRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    /// Set once the request has been replayed after a refresh; a 401 on a
    /// replayed request is terminal.
    replayed: bool,
}

/// Authenticated HTTP client for the console backend.
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiClientConfig,
    session: Arc<SessionStore>,
    refresh: RefreshCoordinator,
    notifier: Arc<dyn Notifier>,
}

impl ApiClient {
    #[must_use]
    pub fn builder(session: Arc<SessionStore>) -> ApiClientBuilder {
        ApiClientBuilder::new(session)
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// `GET path` under `/api/v1`.
    ///
    /// # Errors
    /// Any [`ApiError`] the pipeline produces.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::GET, path, None).await
    }

    /// `GET path` retried under the given budget.
    ///
    /// Deterministic rejections (4xx other than 429) stop immediately; on
    /// exhaustion the last failure is returned unchanged.
    ///
    /// # Errors
    /// The last [`ApiError`] observed.
    pub async fn get_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        config: RetryConfig,
    ) -> Result<T, ApiError> {
        retry(config, http_retry_policy, || self.get::<T>(path)).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    /// Any [`ApiError`] the pipeline produces.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::POST, path, Some(to_body(body)?)).await
    }

    /// `POST path` without a body.
    ///
    /// # Errors
    /// Any [`ApiError`] the pipeline produces.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::POST, path, None).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    /// Any [`ApiError`] the pipeline produces.
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::PUT, path, Some(to_body(body)?)).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    /// Any [`ApiError`] the pipeline produces.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::DELETE, path, None).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let mut request = OutboundRequest {
            method,
            path: path.to_string(),
            body,
            replayed: false,
        };

        let response = self.send_with_refresh(&mut request).await?;
        decode(response).await
    }

    /// Dispatch, intercepting the first 401 with a refresh-and-replay cycle.
    async fn send_with_refresh(
        &self,
        request: &mut OutboundRequest,
    ) -> Result<reqwest::Response, ApiError> {
        let response = self.dispatch(request).await?;

        if response.status().as_u16() == 401 && !request.replayed {
            debug!(path = %request.path, "access token rejected, refreshing");
            self.refresh_access_token().await?;

            request.replayed = true;
            let replayed = self.dispatch(request).await?;
            return self.classify(replayed).await;
        }

        self.classify(response).await
    }

    /// Send one HTTP request with the bearer token and correlation id.
    async fn dispatch(&self, request: &OutboundRequest) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{API_PREFIX}{}", self.config.base_url, request.path);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header(REQUEST_ID_HEADER, correlation_id())
            .header(CONTENT_TYPE, "application/json");

        if let Some(token) = self.session.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|err| {
            let message = format!("{} {}: {err}", request.method, request.path);
            warn!(%message, "request never reached the server");
            self.notifier.surface(Signal::NetworkUnreachable, &message);
            ApiError::Network(message)
        })
    }

    /// Map a response through the status taxonomy, surfacing terminal
    /// failures to the notifier.
    async fn classify(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));

        let error = ApiError::from_status(status.as_u16(), message.clone());
        let signal = match &error {
            ApiError::Unauthorized(_) => Signal::Unauthorized,
            ApiError::Forbidden(_) => Signal::Forbidden,
            ApiError::NotFound(_) => Signal::NotFound,
            ApiError::RateLimited(_) => Signal::RateLimited,
            ApiError::Server { .. } => Signal::ServerError,
            _ => Signal::RequestFailed,
        };
        self.notifier.surface(signal, &message);

        Err(error)
    }

    /// Obtain a fresh access token, joining an in-flight refresh if one is
    /// already running.
    async fn refresh_access_token(&self) -> Result<String, ApiError> {
        match self.refresh.begin() {
            RefreshTicket::Owner => {
                let outcome = self.run_refresh().await;

                if let Err(error) = &outcome {
                    // The session is over. Clear credentials and tell the
                    // operator exactly once, regardless of how many requests
                    // were queued behind this refresh.
                    warn!(%error, "token refresh failed, ending session");
                    self.session.clear();
                    self.notifier.surface(Signal::Unauthorized, "session expired, sign in again");
                    self.notifier.session_ended();
                }

                self.refresh.complete(&outcome);
                outcome
            }
            RefreshTicket::Waiter(receiver) => receiver
                .await
                .map_err(|_| ApiError::RefreshFailed("refresh was abandoned".to_string()))?,
        }
    }

    /// The actual refresh call. Bypasses the pipeline: no bearer token
    /// requirement and, crucially, no 401 interception.
    async fn run_refresh(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .session
            .refresh_token()
            .ok_or_else(|| ApiError::RefreshFailed("no refresh token held".to_string()))?;

        let url = format!("{}{API_PREFIX}/auth/refresh", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .header(REQUEST_ID_HEADER, correlation_id())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|err| ApiError::RefreshFailed(format!("refresh request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::RefreshFailed(format!(
                "refresh endpoint returned {}",
                status.as_u16()
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|err| ApiError::RefreshFailed(format!("invalid refresh response: {err}")))?;

        let pair = self.session.apply_refresh(&tokens);
        debug!("access token refreshed");
        Ok(pair.access_token)
    }

    /// Run a request with the replay already "used up", so a 401 maps
    /// straight to [`ApiError::Unauthorized`] instead of triggering a
    /// refresh. Login uses this: a 401 there means bad credentials.
    pub(crate) async fn execute_unguarded<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ApiError> {
        let mut request = OutboundRequest {
            method,
            path: path.to_string(),
            body,
            replayed: true,
        };

        let response = self.send_with_refresh(&mut request).await?;
        decode(response).await
    }
}

fn to_body<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body)
        .map_err(|err| ApiError::Decode(format!("failed to serialize request body: {err}")))
}

/// Decode a successful response body, treating 204/empty bodies as JSON null.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| ApiError::Network(format!("failed to read response body: {err}")))?;

    if status.as_u16() == 204 || body.is_empty() {
        return serde_json::from_value(Value::Null)
            .map_err(|err| ApiError::Decode(format!("empty response: {err}")));
    }

    serde_json::from_str(&body).map_err(|err| ApiError::Decode(format!("bad response body: {err}")))
}

/// Pull the backend's `{"error": "..."}` (or `message`) out of a failure body.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Correlation id: millisecond timestamp plus a random suffix.
fn correlation_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{millis:x}-{:06x}", rand::random::<u32>() & 0xff_ffff)
}

#[cfg(test)]
mod tests {
    //! Unit tests for pipeline helpers; end-to-end behavior is covered by
    //! the wiremock suite in `tests/`.
    use super::*;

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(
            extract_error_message(r#"{"error": "nope", "message": "other"}"#),
            Some("nope".to_string())
        );
        assert_eq!(
            extract_error_message(r#"{"message": "fallback"}"#),
            Some("fallback".to_string())
        );
        assert_eq!(extract_error_message("not json"), None);
        assert_eq!(extract_error_message(r#"{"error": 42}"#), None);
    }

    #[test]
    fn correlation_ids_are_unique_enough() {
        let a = correlation_id();
        let b = correlation_id();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }

    #[test]
    fn builder_rejects_garbage_base_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = Arc::new(SessionStore::new(fluxgate_common::Vault::open(dir.path())));

        let result = ApiClient::builder(session).base_url("not a url").build();
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn builder_strips_trailing_slash() {
        let dir = tempfile::TempDir::new().unwrap();
        let session = Arc::new(SessionStore::new(fluxgate_common::Vault::open(dir.path())));

        let client = ApiClient::builder(session)
            .base_url("http://localhost:9000/")
            .build()
            .unwrap();
        assert_eq!(client.config.base_url, "http://localhost:9000");
    }
}
