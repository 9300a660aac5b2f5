//! HTTP transport for the CopyHub backend.
//!
//! Every request goes through [`ApiClient::execute`], which
//! - attaches `Authorization: Bearer <token>` when the session holds one,
//! - turns non-success responses into [`ApiError::Status`] with the
//!   backend's own message,
//! - retries idempotent requests on transient failures with exponential
//!   backoff,
//! - on an authentication failure refreshes the tokens once and retries the
//!   request once. If the refresh is rejected the session is signed out and
//!   the original error is returned. Concurrent requests that fail together
//!   share one refresh.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use crate::cache::ApiCache;
use crate::config::{ApiConfig, RetryPolicy};
use crate::error::ApiError;
use crate::session::Session;

/// Longest backend body echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

// =============================================================================
// Requests
// =============================================================================

/// A file part of a multipart upload.
#[derive(Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FileUpload {
    #[must_use]
    pub fn pdf(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: "application/pdf".to_string(),
            data,
        }
    }
}

impl std::fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Multipart body kept in owned form so it can be rebuilt for each attempt.
#[derive(Debug, Clone, Default)]
pub(crate) struct MultipartBody {
    fields: Vec<(String, String)>,
    files: Vec<(String, FileUpload)>,
}

impl MultipartBody {
    pub(crate) fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub(crate) fn file(mut self, name: &str, file: FileUpload) -> Self {
        self.files.push((name.to_string(), file));
        self
    }

    fn to_form(&self) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for (name, file) in &self.files {
            let part = reqwest::multipart::Part::bytes(file.data.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            form = form.part(name.clone(), part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

/// Everything needed to (re)send one backend request.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    authenticated: bool,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            authenticated: true,
        }
    }

    pub(crate) fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub(crate) fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub(crate) fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub(crate) fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub(crate) fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub(crate) fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub(crate) fn multipart(mut self, body: MultipartBody) -> Self {
        self.body = RequestBody::Multipart(body);
        self
    }

    /// Send without a bearer token and never trigger a refresh.
    pub(crate) const fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    fn is_idempotent(&self) -> bool {
        self.method == Method::GET
    }
}

/// A successful backend response.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub(crate) fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE)?.to_str().ok()
    }

    /// Decode the body as JSON. An empty body decodes as `null`, so `()` and
    /// `Option<T>` responses need no special casing.
    pub(crate) fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        Ok(serde_json::from_slice(body)?)
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the CopyHub backend.
///
/// Cheap to clone; clones share the connection pool and the response cache.
/// The client holds no tokens itself: each call takes the [`Session`] whose
/// tokens it should use and update.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    config: ApiConfig,
    cache: ApiCache,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("copyhub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                config,
                cache: ApiCache::default(),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// The shared response cache.
    #[must_use]
    pub fn cache(&self) -> &ApiCache {
        &self.inner.cache
    }

    /// Send a request with auth refresh and retry, and decode the JSON body.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        session: &Session,
        request: ApiRequest,
    ) -> Result<T, ApiError> {
        self.execute(session, &request).await?.json()
    }

    /// Send a request whose response body is irrelevant.
    pub(crate) async fn send(&self, session: &Session, request: ApiRequest) -> Result<(), ApiError> {
        self.execute(session, &request).await.map(drop)
    }

    /// Send a request, refreshing the session once on an auth failure.
    #[instrument(
        skip(self, session, request),
        fields(method = %request.method, path = %request.path)
    )]
    pub(crate) async fn execute(
        &self,
        session: &Session,
        request: &ApiRequest,
    ) -> Result<RawResponse, ApiError> {
        let sent_token = session.access_token().await;
        match self.send_with_retry(session, request).await {
            Err(err) if request.authenticated && err.is_auth_failure() => {
                tracing::debug!(error = %err, "Request was not authorized, refreshing tokens");
                let seen = sent_token.as_ref().map(ExposeSecret::expose_secret);
                if let Err(refresh_err) = self.refresh_unless_renewed(session, seen).await {
                    tracing::warn!(error = %refresh_err, "Token refresh failed, signing out");
                    session.sign_out().await;
                    return Err(err);
                }
                self.send_with_retry(session, request).await
            }
            result => result,
        }
    }

    /// Send a request, retrying idempotent ones on transient failures.
    async fn send_with_retry(
        &self,
        session: &Session,
        request: &ApiRequest,
    ) -> Result<RawResponse, ApiError> {
        let policy = if request.is_idempotent() {
            self.inner.config.retry
        } else {
            RetryPolicy::none()
        };

        let mut attempt = 0;
        loop {
            match self.send_once(session, request).await {
                Err(err) if attempt < policy.max_retries && err.is_transient() => {
                    let delay = policy.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        error = %err,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Transient backend failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Send a request exactly once.
    pub(crate) async fn send_once(
        &self,
        session: &Session,
        request: &ApiRequest,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url(&request.path, &request.query)?;
        let mut builder = self.inner.http.request(request.method.clone(), url);

        if request.authenticated
            && let Some(token) = session.access_token().await
        {
            builder = builder.bearer_auth(token.expose_secret());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(body) => builder.multipart(body.to_form()?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        if !status.is_success() {
            let err = error_from_response(status, &body);
            tracing::debug!(status = status.as_u16(), error = %err, "Backend returned an error");
            return Err(err);
        }

        Ok(RawResponse { headers, body })
    }

    /// Join a path and query onto the base URL.
    fn url(&self, path: &str, query: &[(String, String)]) -> Result<Url, ApiError> {
        let mut url = self.inner.config.base_url.join(path.trim_start_matches('/'))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

// =============================================================================
// Error normalization
// =============================================================================

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(alias = "Message")]
    message: Option<String>,
    title: Option<String>,
    error: Option<String>,
}

/// Build an [`ApiError::Status`] from a failed response.
///
/// The message is the first of: a JSON `message`/`Message`/`title`/`error`
/// field, a JSON string body, the raw text body, the status reason.
pub(crate) fn error_from_response(status: StatusCode, body: &[u8]) -> ApiError {
    let from_json = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error).or(b.title))
        .or_else(|| serde_json::from_slice::<String>(body).ok());

    let message = from_json
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .or_else(|| {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();
            (!text.is_empty() && !text.starts_with('<'))
                .then(|| text.chars().take(MAX_ERROR_BODY_CHARS).collect())
        })
        .unwrap_or_else(|| {
            status.canonical_reason().map_or_else(
                || format!("Request failed with status {}", status.as_u16()),
                |reason| format!("Request failed with status {}: {reason}", status.as_u16()),
            )
        });

    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn message(status: u16, body: &str) -> String {
        match error_from_response(StatusCode::from_u16(status).unwrap(), body.as_bytes()) {
            ApiError::Status { message, .. } => message,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_message_from_json_field() {
        assert_eq!(message(400, r#"{"message":"Copy count too high"}"#), "Copy count too high");
        assert_eq!(message(400, r#"{"Message":"Agency not approved"}"#), "Agency not approved");
        assert_eq!(
            message(400, r#"{"title":"One or more validation errors occurred."}"#),
            "One or more validation errors occurred."
        );
    }

    #[test]
    fn test_error_message_from_text_and_string_bodies() {
        assert_eq!(message(409, "\"Order already paid\""), "Order already paid");
        assert_eq!(message(500, "boom"), "boom");
    }

    #[test]
    fn test_error_message_falls_back_to_status() {
        assert_eq!(message(401, ""), "Request failed with status 401: Unauthorized");
        assert_eq!(
            message(502, "<html>Bad gateway</html>"),
            "Request failed with status 502: Bad Gateway"
        );
        assert!(
            error_from_response(StatusCode::UNAUTHORIZED, b"").is_auth_failure(),
            "an empty 401 must still trigger a refresh"
        );
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        let response = RawResponse {
            headers: HeaderMap::new(),
            body: Vec::new(),
        };
        response.json::<()>().unwrap();
        let missing: Option<u32> = response.json().unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_url_joins_under_base_path() {
        let client = ApiClient::new(ApiConfig::new("https://api.copyhub.test/api").unwrap()).unwrap();
        let url = client
            .url(
                "/orders/mine",
                &[("state".to_string(), "Pending".to_string())],
            )
            .unwrap();
        assert_eq!(url.as_str(), "https://api.copyhub.test/api/orders/mine?state=Pending");
    }
}
