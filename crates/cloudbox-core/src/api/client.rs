//! HTTP client for the Cloudbox API.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::error::{ApiError, ApiResult};
use crate::auth::mask_secret;

pub const API_KEY_HEADER: &str = "x-api-key";

const AUTHORIZATION_HEADER: &str = "authorization";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How requests are authenticated.
#[derive(Clone, Default)]
pub enum ApiAuth {
    /// Sent as `X-API-Key`
    ApiKey(String),
    /// Sent as `Authorization: Bearer`
    Bearer(String),
    #[default]
    None,
}

impl ApiAuth {
    /// Header name and value to attach, if any.
    pub fn header(&self) -> Option<(&'static str, String)> {
        match self {
            ApiAuth::ApiKey(key) => Some((API_KEY_HEADER, key.clone())),
            ApiAuth::Bearer(token) => Some((AUTHORIZATION_HEADER, format!("Bearer {token}"))),
            ApiAuth::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ApiAuth::None)
    }
}

impl fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiAuth::ApiKey(key) => write!(f, "ApiKey({})", mask_secret(key)),
            ApiAuth::Bearer(token) => write!(f, "Bearer({})", mask_secret(token)),
            ApiAuth::None => write!(f, "None"),
        }
    }
}

/// Exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
    }
}

/// Request payload, kept cloneable so it can be re-sent on retry.
#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Bytes {
        data: Vec<u8>,
        content_type: &'static str,
    },
}

pub struct ApiClientBuilder {
    base_url: String,
    auth: ApiAuth,
    timeout: Duration,
    retry: RetryPolicy,
    http: Option<Client>,
}

impl ApiClientBuilder {
    pub fn auth(mut self, auth: ApiAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use a preconfigured reqwest client instead of building one.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn build(self) -> ApiResult<ApiClient> {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(&format!("{trimmed}/"))
            .map_err(|e| ApiError::InvalidRequest(format!("base URL '{trimmed}': {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidRequest(format!(
                "base URL '{trimmed}' must use http or https"
            )));
        }

        let http = match self.http {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout)
                .user_agent(concat!("cloudbox/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| ApiError::InvalidRequest(format!("HTTP client: {e}")))?,
        };

        Ok(ApiClient {
            http,
            base_url,
            auth: self.auth,
            retry: self.retry,
        })
    }
}

/// Authenticated client for the sandbox service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    auth: ApiAuth,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            auth: ApiAuth::None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            http: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &ApiAuth {
        &self.auth
    }

    /// Resolve a path (with or without leading slash) against the base URL.
    pub fn url(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("path '{path}': {e}")))
    }

    pub(crate) fn url_with_query(&self, path: &str, query: &[(&str, &str)]) -> ApiResult<Url> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// WebSocket URL for a path: `http` becomes `ws`, `https` becomes `wss`.
    pub fn ws_url(&self, path: &str) -> ApiResult<Url> {
        let mut url = self.url(path)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| ApiError::InvalidRequest(format!("cannot use {scheme} for {url}")))?;
        Ok(url)
    }

    fn headers(&self, body: &RequestBody) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some((name, value)) = self.auth.header()
            && let Ok(value) = HeaderValue::from_str(&value)
        {
            headers.insert(name, value);
        }
        if let RequestBody::Bytes { content_type, .. } = body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        headers
    }

    /// Send a request, retrying transient failures per the retry policy.
    ///
    /// Non-idempotent requests are retried only when the server rejected them
    /// with 429 or the connection was never established.
    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        body: RequestBody,
    ) -> ApiResult<Response> {
        let max_attempts = self.retry.max_attempts.max(1);
        let idempotent = is_idempotent(&method);
        let mut attempt = 1;

        loop {
            debug!(%method, %url, attempt, "Sending API request");
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .headers(self.headers(&body));
            request = match &body {
                RequestBody::Empty => request,
                RequestBody::Json(value) => request.json(value),
                RequestBody::Bytes { data, .. } => request.body(data.clone()),
            };

            let (err, retryable) = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    let err = ApiError::from_status(status, &text);
                    let retryable = err.is_retryable()
                        && (idempotent || matches!(err, ApiError::RateLimited(_)));
                    (err, retryable)
                }
                Err(e) => {
                    // A POST that never connected was never seen by the server
                    let connect_failed = e.is_connect();
                    let (err, transient) = ApiError::from_transport(e);
                    (err, transient && (idempotent || connect_failed))
                }
            };

            if !retryable || attempt >= max_attempts {
                return Err(err);
            }

            let delay = self.retry.delay_for(attempt);
            warn!(error = %err, attempt, ?delay, "Retrying API request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(e).0)?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
        let response = self.send(Method::GET, url, RequestBody::Empty).await?;
        Self::decode(response).await
    }

    pub(crate) async fn post_json<B, T>(&self, url: Url, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body =
            serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let response = self.send(Method::POST, url, RequestBody::Json(body)).await?;
        Self::decode(response).await
    }

    /// Send without caring about the response body.
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: Url,
        body: RequestBody,
    ) -> ApiResult<()> {
        self.send(method, url, body).await.map(|_| ())
    }
}

fn is_idempotent(method: &Method) -> bool {
    !matches!(*method, Method::POST | Method::PATCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_post_and_patch_are_non_idempotent() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::PUT));
        assert!(is_idempotent(&Method::DELETE));
        assert!(!is_idempotent(&Method::POST));
        assert!(!is_idempotent(&Method::PATCH));
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1000));
    }

    #[test]
    fn urls_join_under_base_path() {
        let client = ApiClient::builder("https://api.example.com/v1/")
            .build()
            .unwrap();
        assert_eq!(
            client.url("/sandboxes/abc").unwrap().as_str(),
            "https://api.example.com/v1/sandboxes/abc"
        );
        assert_eq!(
            client.ws_url("sandboxes/abc/commands/stream").unwrap().as_str(),
            "wss://api.example.com/v1/sandboxes/abc/commands/stream"
        );
        let url = client
            .url_with_query("files", &[("path", "/tmp/a b")])
            .unwrap();
        assert_eq!(url.query(), Some("path=%2Ftmp%2Fa+b"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(ApiClient::builder("ftp://example.com").build().is_err());
        assert!(ApiClient::builder("not a url").build().is_err());
    }

    #[test]
    fn auth_headers_and_debug_masking() {
        let key = ApiAuth::ApiKey("sk_live_1234567890".into());
        assert_eq!(
            key.header(),
            Some((API_KEY_HEADER, "sk_live_1234567890".to_string()))
        );
        assert_eq!(format!("{key:?}"), "ApiKey(sk_l...7890)");

        let bearer = ApiAuth::Bearer("tok".into());
        assert_eq!(
            bearer.header(),
            Some(("authorization", "Bearer tok".to_string()))
        );
        assert!(ApiAuth::None.header().is_none());
    }
}
