//! Error types for the login flow

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a redirect was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowFailure {
    /// The `state` parameter did not match the one we issued.
    StateMismatch,
    /// The provider redirected with an `error` parameter.
    Provider {
        error: String,
        description: Option<String>,
    },
    /// The redirect had neither `code` nor `error`.
    MissingCode,
    /// Pasted input could not be understood.
    InvalidCallback(String),
}

impl fmt::Display for FlowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowFailure::StateMismatch => {
                write!(f, "state mismatch in callback (possible CSRF attack)")
            }
            FlowFailure::Provider {
                error,
                description: Some(description),
            } => write!(f, "{error}: {description}"),
            FlowFailure::Provider {
                error,
                description: None,
            } => write!(f, "{error}"),
            FlowFailure::MissingCode => write!(f, "callback did not include an authorization code"),
            FlowFailure::InvalidCallback(reason) => write!(f, "invalid callback: {reason}"),
        }
    }
}

/// Errors returned by the OAuth login flow and token refresh.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("invalid provider '{0}' (expected one of GoogleOAuth, GitHubOAuth, MicrosoftOAuth)")]
    InvalidProvider(String),

    #[error("invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    #[error("callback port {port} is already in use")]
    PortInUse { port: u16 },

    #[error("failed to start callback listener: {0}")]
    Listener(#[source] std::io::Error),

    #[error("timed out after {0:?} waiting for the login redirect")]
    Timeout(Duration),

    #[error("OAuth flow failed: {0}")]
    Flow(FlowFailure),

    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
}

impl OAuthError {
    /// State mismatches and provider errors are both flow failures.
    pub fn is_flow_error(&self) -> bool {
        matches!(self, OAuthError::Flow(_))
    }
}

impl From<FlowFailure> for OAuthError {
    fn from(failure: FlowFailure) -> Self {
        OAuthError::Flow(failure)
    }
}
