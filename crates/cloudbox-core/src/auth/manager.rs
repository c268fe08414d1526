//! Token Manager
//!
//! Hands out a usable access token for a profile, refreshing it through the
//! backend when it is about to expire.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::refresh::OAuthRefresher;
use super::types::TokenBundle;
use crate::credentials::{CredentialBackend, CredentialRecord, CredentialResult};

/// Cached-token access for one profile.
pub struct TokenManager {
    store: Arc<dyn CredentialBackend>,
    refresher: Arc<dyn OAuthRefresher>,
    profile: String,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn CredentialBackend>,
        refresher: Arc<dyn OAuthRefresher>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            store,
            refresher,
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Access token to use right now, or `None` when not authenticated.
    pub async fn access_token(&self) -> Option<String> {
        self.access_token_at(Utc::now().timestamp()).await
    }

    /// Same as [`access_token`](Self::access_token) with an explicit clock.
    ///
    /// Performs at most one refresh call. Failures are logged and reported
    /// as `None`.
    pub async fn access_token_at(&self, now: i64) -> Option<String> {
        let mut record = match self.store.load(&self.profile) {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(profile = %self.profile, "No stored credentials");
                return None;
            }
            Err(e) => {
                warn!(profile = %self.profile, error = %e, "Failed to load credentials");
                return None;
            }
        };

        let token = record.oauth_token.take().filter(TokenBundle::is_valid)?;
        if !token.needs_refresh(now) {
            return Some(token.access_token);
        }

        let Some(refresh_token) = token.refresh_token.clone().filter(|t| !t.is_empty()) else {
            info!(profile = %self.profile, "Access token expired and no refresh token is stored");
            return None;
        };

        let refreshed = match self.refresher.refresh(&refresh_token).await {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!(profile = %self.profile, error = %e, "Token refresh failed");
                return None;
            }
        };

        let updated = TokenBundle {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
            expires_at: refreshed.expires_at,
        };
        let access_token = updated.access_token.clone();
        info!(profile = %self.profile, token = %updated.masked(), "Refreshed access token");

        record.oauth_token = Some(updated);
        if let Err(e) = self.store.store(&self.profile, &record) {
            warn!(profile = %self.profile, error = %e, "Failed to persist refreshed token");
        }

        Some(access_token)
    }

    /// Persist a freshly obtained token, keeping any stored API key.
    pub fn save_login(&self, token: TokenBundle) -> CredentialResult<()> {
        let mut record = self.store.load(&self.profile)?.unwrap_or_default();
        record.oauth_token = Some(token);
        self.store.store(&self.profile, &record)
    }

    /// Drop the OAuth token, keeping any stored API key.
    ///
    /// Returns `true` when a token was removed.
    pub fn logout(&self) -> CredentialResult<bool> {
        let Some(mut record) = self.store.load(&self.profile)? else {
            return Ok(false);
        };
        if record.oauth_token.take().is_none() {
            return Ok(false);
        }
        if record.is_empty() {
            self.store.delete(&self.profile)?;
        } else {
            self.store.store(&self.profile, &record)?;
        }
        Ok(true)
    }

    pub fn stored(&self) -> CredentialResult<Option<CredentialRecord>> {
        self.store.load(&self.profile)
    }
}
