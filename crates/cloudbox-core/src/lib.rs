//! Cloudbox SDK
//!
//! Authentication (browser OAuth and API keys), credential storage, CLI
//! configuration and a typed client for the sandbox service API.

pub mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod paths;

pub use api::{ApiAuth, ApiClient, ApiError, RetryPolicy};
pub use auth::{OAuthClient, OAuthConfig, OAuthError, TokenBundle, TokenManager};
pub use config::{CliConfig, EnvOverrides, OutputPreference, ResolvedConfig};
pub use credentials::{CredentialBackend, CredentialRecord, DEFAULT_PROFILE};
