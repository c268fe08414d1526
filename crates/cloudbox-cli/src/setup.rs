//! CLI setup module
//!
//! Loads configuration and credentials and builds the API client for one
//! invocation.

use anyhow::{Context, Result, bail};
use cloudbox_core::auth::BackendAuthClient;
use cloudbox_core::config::{ConfigError, ResolvedConfig};
use cloudbox_core::credentials::default_backend;
use cloudbox_core::{
    ApiAuth, ApiClient, CliConfig, CredentialBackend, EnvOverrides, OAuthConfig, TokenManager,
};
use std::sync::Arc;
use tracing::debug;

use crate::cli::Cli;
use crate::output::OutputFormat;

/// Everything a command needs from the environment.
pub struct CliContext {
    pub config: CliConfig,
    env: EnvOverrides,
    profile_flag: Option<String>,
    api_key_flag: Option<String>,
    format_flag: Option<OutputFormat>,
    credentials: Arc<dyn CredentialBackend>,
}

impl CliContext {
    pub fn load(cli: &Cli) -> Result<Self> {
        let config = CliConfig::load().context("failed to load configuration")?;
        let mut env = EnvOverrides::from_env();
        if let Some(base_url) = &cli.base_url {
            env.base_url = Some(base_url.clone());
        }
        let credentials: Arc<dyn CredentialBackend> =
            Arc::new(default_backend().context("failed to open credential store")?);

        Ok(Self {
            config,
            env,
            profile_flag: cli.profile.clone(),
            api_key_flag: cli.api_key.clone().filter(|k| !k.trim().is_empty()),
            format_flag: cli.format,
            credentials,
        })
    }

    /// Flag > `CLOUDBOX_PROFILE` > active profile. The profile must exist.
    pub fn profile(&self) -> Result<String> {
        let profile = self
            .profile_flag
            .clone()
            .or_else(|| self.env.profile.clone())
            .unwrap_or_else(|| self.config.active_profile.clone());
        if !self.config.has_profile(&profile) {
            return Err(ConfigError::ProfileNotFound(profile).into());
        }
        Ok(profile)
    }

    pub fn resolved(&self) -> Result<ResolvedConfig> {
        Ok(self
            .config
            .resolve(self.profile_flag.as_deref(), &self.env)?)
    }

    /// `--format` wins, then the profile's `output` setting.
    pub fn format(&self) -> OutputFormat {
        if let Some(format) = self.format_flag {
            return format;
        }
        self.resolved()
            .map(|resolved| resolved.output.into())
            .unwrap_or_default()
    }

    pub fn has_api_key_flag(&self) -> bool {
        self.api_key_flag.is_some()
    }

    pub fn credentials(&self) -> Arc<dyn CredentialBackend> {
        self.credentials.clone()
    }

    pub fn token_manager(&self) -> Result<TokenManager> {
        let resolved = self.resolved()?;
        let refresher = Arc::new(BackendAuthClient::new(resolved.base_url));
        Ok(TokenManager::new(
            self.credentials.clone(),
            refresher,
            resolved.profile,
        ))
    }

    pub fn oauth_config(&self) -> Result<OAuthConfig> {
        let resolved = self.resolved()?;
        Ok(OAuthConfig::new(resolved.base_url).with_env_overrides())
    }

    /// `--api-key`/`CLOUDBOX_API_KEY`, then a stored key, then the login token.
    pub async fn api_auth(&self) -> Result<ApiAuth> {
        if let Some(key) = &self.api_key_flag {
            debug!("Using API key from flag or environment");
            return Ok(ApiAuth::ApiKey(key.clone()));
        }

        let manager = self.token_manager()?;
        let stored = manager
            .stored()
            .context("failed to read stored credentials")?;
        if let Some(key) = stored.and_then(|record| record.api_key) {
            debug!(profile = manager.profile(), "Using stored API key");
            return Ok(ApiAuth::ApiKey(key));
        }

        match manager.access_token().await {
            Some(token) => {
                debug!(profile = manager.profile(), "Using login token");
                Ok(ApiAuth::Bearer(token))
            }
            None => bail!(
                "not authenticated for profile '{}'; run `cloudbox login` or set an API key",
                manager.profile()
            ),
        }
    }

    /// Authenticated client for the resolved profile.
    pub async fn client(&self) -> Result<ApiClient> {
        let resolved = self.resolved()?;
        let auth = self.api_auth().await?;
        let client = ApiClient::builder(resolved.base_url)
            .auth(auth)
            .timeout(resolved.timeout)
            .build()?;
        Ok(client)
    }
}
