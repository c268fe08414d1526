//! Backend token endpoints: code exchange and refresh.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::OAuthError;
use super::types::TokenBundle;

const EXCHANGE_PATH: &str = "/auth/workos-callback";
const REFRESH_PATH: &str = "/auth/refresh";

/// Exchanges a refresh token for a new token bundle.
#[async_trait]
pub trait OAuthRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, OAuthError>;
}

/// Exchanges an authorization code for a token bundle.
#[async_trait]
pub trait CodeExchanger: Send + Sync {
    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<TokenBundle, OAuthError>;
}

/// Client for the Cloudbox backend's auth endpoints.
#[derive(Debug, Clone)]
pub struct BackendAuthClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest<'a> {
    code: &'a str,
    source: &'static str,
    redirect_uri: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_bundle(self) -> Option<TokenBundle> {
        let access_token = self.access_token.filter(|t| !t.trim().is_empty())?;
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Some(TokenBundle {
            access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_at,
        })
    }
}

impl BackendAuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_for_tokens<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<TokenResponse, String> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request to {path} failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("{path} returned {status}: {}", text.trim()));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| format!("invalid response from {path}: {e}"))
    }
}

#[async_trait]
impl CodeExchanger for BackendAuthClient {
    async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<TokenBundle, OAuthError> {
        debug!("Exchanging authorization code at {}", EXCHANGE_PATH);
        let body = ExchangeRequest {
            code,
            source: "cli",
            redirect_uri,
        };
        self.post_for_tokens(EXCHANGE_PATH, &body)
            .await
            .map_err(OAuthError::ExchangeFailed)?
            .into_bundle()
            .ok_or_else(|| OAuthError::ExchangeFailed("response has no access token".into()))
    }
}

#[async_trait]
impl OAuthRefresher for BackendAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, OAuthError> {
        debug!("Refreshing access token at {}", REFRESH_PATH);
        self.post_for_tokens(REFRESH_PATH, &RefreshRequest { refresh_token })
            .await
            .map_err(OAuthError::RefreshFailed)?
            .into_bundle()
            .ok_or_else(|| OAuthError::RefreshFailed("response has no access token".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_access_token_is_rejected() {
        let response = TokenResponse {
            access_token: Some(String::new()),
            refresh_token: None,
            expires_at: None,
            expires_in: None,
        };
        assert!(response.into_bundle().is_none());
    }

    #[test]
    fn expires_in_is_converted_to_epoch() {
        let before = Utc::now().timestamp();
        let bundle = TokenResponse {
            access_token: Some("tok".into()),
            refresh_token: None,
            expires_at: None,
            expires_in: Some(3600),
        }
        .into_bundle()
        .unwrap();
        let expires_at = bundle.expires_at.unwrap();
        assert!(expires_at >= before + 3600);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = BackendAuthClient::new("http://localhost:8080/");
        assert_eq!(
            client.endpoint(REFRESH_PATH),
            "http://localhost:8080/auth/refresh"
        );
    }
}
