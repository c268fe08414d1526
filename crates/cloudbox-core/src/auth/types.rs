//! Core types for authentication
//!
//! Defines the OAuth token bundle and the allow-listed identity providers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::OAuthError;

/// Seconds before expiry at which a cached access token is refreshed.
pub const REFRESH_SKEW_SECS: i64 = 300;

/// Access token plus optional refresh token and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    /// Access token for API calls
    pub access_token: String,
    /// Refresh token for obtaining new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token expiration time (epoch seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl TokenBundle {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// A bundle without an access token cannot authenticate anything.
    pub fn is_valid(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// Whether the access token must be refreshed before use at `now`.
    ///
    /// Tokens without an expiry never need a refresh. Tokens expiring within
    /// [`REFRESH_SKEW_SECS`] (or already expired) do.
    pub fn needs_refresh(&self, now: i64) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => expires_at - now <= REFRESH_SKEW_SECS,
        }
    }

    /// Check if the credential can be refreshed
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    /// Get a display-safe version of the access token (masked)
    pub fn masked(&self) -> String {
        mask_secret(&self.access_token)
    }
}

/// Mask a secret for display, keeping at most four characters on each side.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Identity providers accepted by the authorize endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OAuthProvider {
    #[serde(rename = "GoogleOAuth")]
    Google,
    #[serde(rename = "GitHubOAuth")]
    GitHub,
    #[serde(rename = "MicrosoftOAuth")]
    Microsoft,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 3] = [
        OAuthProvider::Google,
        OAuthProvider::GitHub,
        OAuthProvider::Microsoft,
    ];

    /// Wire value sent as the `provider` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "GoogleOAuth",
            OAuthProvider::GitHub => "GitHubOAuth",
            OAuthProvider::Microsoft => "MicrosoftOAuth",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = OAuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        OAuthProvider::ALL
            .into_iter()
            .find(|provider| provider.as_str() == value)
            .ok_or_else(|| OAuthError::InvalidProvider(value.to_string()))
    }
}
