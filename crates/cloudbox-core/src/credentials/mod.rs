//! Credential storage
//!
//! Per-profile credential records (API key and/or OAuth tokens) behind a
//! [`CredentialBackend`] trait, with these implementations:
//! - `KeyringBackend`: the OS keychain (macOS / Windows, `keychain` feature)
//! - [`YamlFileBackend`]: `~/.cloudbox/credentials.yaml`, mode 0600
//! - [`MemoryBackend`]: in-process map
//! - [`FallbackBackend`]: ordered composite of the above

mod fallback;
mod file;
#[cfg(all(feature = "keychain", any(target_os = "macos", target_os = "windows")))]
mod keyring;
mod memory;

pub use fallback::FallbackBackend;
pub use file::YamlFileBackend;
#[cfg(all(feature = "keychain", any(target_os = "macos", target_os = "windows")))]
pub use keyring::KeyringBackend;
pub use memory::MemoryBackend;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::auth::TokenBundle;

/// Profile used when none is selected.
pub const DEFAULT_PROFILE: &str = "default";

/// Set to any non-empty value to skip the OS keychain.
pub const NO_KEYRING_ENV: &str = "CLOUDBOX_NO_KEYRING";

/// Credentials stored for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<TokenBundle>,
}

impl CredentialRecord {
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            oauth_token: None,
        }
    }

    pub fn with_token(token: TokenBundle) -> Self {
        Self {
            api_key: None,
            oauth_token: Some(token),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.oauth_token.is_none()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The backing vault does not exist or cannot be reached at all.
    #[error("{backend} is unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("{backend} error: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },
}

impl CredentialError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CredentialError::Unavailable { .. })
    }
}

pub type CredentialResult<T> = Result<T, CredentialError>;

/// A place credential records can be loaded from and written to.
pub trait CredentialBackend: Send + Sync {
    /// Short name used in logs and status output.
    fn name(&self) -> &'static str;

    fn load(&self, profile: &str) -> CredentialResult<Option<CredentialRecord>>;

    fn store(&self, profile: &str, record: &CredentialRecord) -> CredentialResult<()>;

    /// Removing a profile that has no record is not an error.
    fn delete(&self, profile: &str) -> CredentialResult<()>;
}

fn keyring_disabled() -> bool {
    std::env::var(NO_KEYRING_ENV).is_ok_and(|v| !v.trim().is_empty())
}

#[cfg(all(feature = "keychain", any(target_os = "macos", target_os = "windows")))]
fn push_keyring(backends: &mut Vec<Box<dyn CredentialBackend>>) {
    if keyring_disabled() {
        debug!("OS keychain disabled via {}", NO_KEYRING_ENV);
        return;
    }
    backends.push(Box::new(KeyringBackend::default()));
}

#[cfg(not(all(feature = "keychain", any(target_os = "macos", target_os = "windows"))))]
fn push_keyring(_backends: &mut Vec<Box<dyn CredentialBackend>>) {
    debug!(
        disabled = keyring_disabled(),
        "OS keychain not compiled in; using credentials file"
    );
}

/// Build the default chain: OS keychain (when available) then the YAML file.
pub fn default_backend() -> anyhow::Result<FallbackBackend> {
    let mut backends: Vec<Box<dyn CredentialBackend>> = Vec::new();
    push_keyring(&mut backends);
    backends.push(Box::new(YamlFileBackend::new(crate::paths::credentials_path()?)));
    Ok(FallbackBackend::new(backends))
}
