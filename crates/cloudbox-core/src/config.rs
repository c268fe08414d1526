//! CLI configuration file support
//!
//! Loads profile-scoped settings from `~/.cloudbox/config.yaml` and merges them
//! with environment overrides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::credentials::DEFAULT_PROFILE;

pub const DEFAULT_BASE_URL: &str = "https://api.cloudbox.dev";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const PROFILE_ENV: &str = "CLOUDBOX_PROFILE";
pub const BASE_URL_ENV: &str = "CLOUDBOX_BASE_URL";
pub const TEMPLATE_ENV: &str = "CLOUDBOX_TEMPLATE";
pub const TIMEOUT_ENV: &str = "CLOUDBOX_TIMEOUT";
pub const OUTPUT_ENV: &str = "CLOUDBOX_OUTPUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("unknown config key '{0}' (expected base_url, default_template, timeout or output)")]
    UnknownKey(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("profile '{0}' not found")]
    ProfileNotFound(String),

    #[error("profile '{0}' already exists")]
    ProfileExists(String),

    #[error("invalid profile name '{0}' (use letters, digits, '-' or '_')")]
    InvalidProfileName(String),
}

/// How command results are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputPreference {
    #[default]
    Table,
    Json,
    Plain,
}

impl OutputPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputPreference::Table => "table",
            OutputPreference::Json => "json",
            OutputPreference::Plain => "plain",
        }
    }
}

impl fmt::Display for OutputPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputPreference {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(OutputPreference::Table),
            "json" => Ok(OutputPreference::Json),
            "plain" => Ok(OutputPreference::Plain),
            other => Err(ConfigError::InvalidValue {
                key: ConfigKey::Output.as_str().to_string(),
                reason: format!("'{other}' is not one of table, json, plain"),
            }),
        }
    }
}

/// Settings stored for one profile. Unset values fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_template: Option<String>,
    /// Request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputPreference>,
}

/// Settable configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    DefaultTemplate,
    Timeout,
    Output,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 4] = [
        ConfigKey::BaseUrl,
        ConfigKey::DefaultTemplate,
        ConfigKey::Timeout,
        ConfigKey::Output,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::BaseUrl => "base_url",
            ConfigKey::DefaultTemplate => "default_template",
            ConfigKey::Timeout => "timeout",
            ConfigKey::Output => "output",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownKey(value.to_string()))
    }
}

fn default_active_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

/// Contents of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_active_profile")]
    pub active_profile: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            active_profile: default_active_profile(),
            profiles: BTreeMap::new(),
        }
    }
}

/// Environment variables that override file values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub profile: Option<String>,
    pub base_url: Option<String>,
    pub template: Option<String>,
    pub timeout: Option<String>,
    pub output: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            profile: read(PROFILE_ENV),
            base_url: read(BASE_URL_ENV),
            template: read(TEMPLATE_ENV),
            timeout: read(TIMEOUT_ENV),
            output: read(OUTPUT_ENV),
        }
    }
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    pub profile: String,
    pub base_url: String,
    pub default_template: Option<String>,
    pub timeout: Duration,
    pub output: OutputPreference,
}

fn validate_base_url(value: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: ConfigKey::BaseUrl.as_str().to_string(),
        reason,
    };
    let url = Url::parse(value.trim()).map_err(|e| invalid(format!("'{value}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("'{value}' must use http or https")));
    }
    Ok(value.trim().trim_end_matches('/').to_string())
}

fn validate_timeout(value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(ConfigError::InvalidValue {
            key: ConfigKey::Timeout.as_str().to_string(),
            reason: format!("'{value}' is not a positive number of seconds"),
        }),
    }
}

fn validate_profile_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidProfileName(name.to_string()))
    }
}

impl CliConfig {
    /// Load configuration from the default path
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::load_from_path(crate::paths::config_path()?)?)
    }

    /// Load configuration from a specific path; a missing file yields defaults
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        Ok(self.save_to_path(crate::paths::config_path()?)?)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_yaml::to_string(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(io_err)
    }

    /// `default` always exists, even before it is written to the file.
    pub fn has_profile(&self, name: &str) -> bool {
        name == DEFAULT_PROFILE || self.profiles.contains_key(name)
    }

    /// Profile names, `default` always included.
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        if !self.profiles.contains_key(DEFAULT_PROFILE) {
            names.insert(0, DEFAULT_PROFILE.to_string());
        }
        names
    }

    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.get(name)
    }

    pub fn get(&self, profile: &str, key: ConfigKey) -> Option<String> {
        let settings = self.profiles.get(profile)?;
        match key {
            ConfigKey::BaseUrl => settings.base_url.clone(),
            ConfigKey::DefaultTemplate => settings.default_template.clone(),
            ConfigKey::Timeout => settings.timeout.map(|t| t.to_string()),
            ConfigKey::Output => settings.output.map(|o| o.to_string()),
        }
    }

    /// Validate and store a value, creating the profile entry if needed.
    pub fn set(&mut self, profile: &str, key: ConfigKey, value: &str) -> Result<(), ConfigError> {
        validate_profile_name(profile)?;
        let settings = self.profiles.entry(profile.to_string()).or_default();
        match key {
            ConfigKey::BaseUrl => settings.base_url = Some(validate_base_url(value)?),
            ConfigKey::DefaultTemplate => {
                let template = value.trim();
                if template.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: "template name cannot be empty".into(),
                    });
                }
                settings.default_template = Some(template.to_string());
            }
            ConfigKey::Timeout => settings.timeout = Some(validate_timeout(value)?),
            ConfigKey::Output => settings.output = Some(value.parse()?),
        }
        Ok(())
    }

    /// Remove a value. Returns `true` when something was set.
    pub fn unset(&mut self, profile: &str, key: ConfigKey) -> bool {
        let Some(settings) = self.profiles.get_mut(profile) else {
            return false;
        };
        match key {
            ConfigKey::BaseUrl => settings.base_url.take().is_some(),
            ConfigKey::DefaultTemplate => settings.default_template.take().is_some(),
            ConfigKey::Timeout => settings.timeout.take().is_some(),
            ConfigKey::Output => settings.output.take().is_some(),
        }
    }

    pub fn create_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        validate_profile_name(name)?;
        if self.profiles.contains_key(name) {
            return Err(ConfigError::ProfileExists(name.to_string()));
        }
        self.profiles
            .insert(name.to_string(), ProfileConfig::default());
        Ok(())
    }

    pub fn use_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.has_profile(name) {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        self.active_profile = name.to_string();
        Ok(())
    }

    /// Delete a profile; deleting the active one makes `default` active.
    pub fn delete_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.profiles.remove(name).is_none() {
            return Err(ConfigError::ProfileNotFound(name.to_string()));
        }
        if self.active_profile == name {
            self.active_profile = DEFAULT_PROFILE.to_string();
        }
        Ok(())
    }

    /// Merge flag > environment > file > built-in defaults.
    pub fn resolve(
        &self,
        profile_override: Option<&str>,
        env: &EnvOverrides,
    ) -> Result<ResolvedConfig, ConfigError> {
        let profile = profile_override
            .map(str::to_string)
            .or_else(|| env.profile.clone())
            .unwrap_or_else(|| self.active_profile.clone());
        if !self.has_profile(&profile) {
            return Err(ConfigError::ProfileNotFound(profile));
        }

        let settings = self.profiles.get(&profile).cloned().unwrap_or_default();

        let base_url = match &env.base_url {
            Some(url) => validate_base_url(url)?,
            None => settings
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };
        let timeout = match &env.timeout {
            Some(secs) => validate_timeout(secs)?,
            None => settings.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        let output = match &env.output {
            Some(output) => output.parse()?,
            None => settings.output.unwrap_or_default(),
        };

        Ok(ResolvedConfig {
            profile,
            base_url,
            default_template: env.template.clone().or(settings.default_template),
            timeout: Duration::from_secs(timeout),
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load_from_path(dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, CliConfig::default());

        let resolved = config.resolve(None, &EnvOverrides::default()).unwrap();
        assert_eq!(resolved.profile, "default");
        assert_eq!(resolved.base_url, DEFAULT_BASE_URL);
        assert_eq!(resolved.timeout, Duration::from_secs(30));
        assert_eq!(resolved.output, OutputPreference::Table);
    }

    #[test]
    fn save_and_load_preserves_profiles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = CliConfig::default();
        config
            .set("staging", ConfigKey::BaseUrl, "https://staging.cloudbox.dev/")
            .unwrap();
        config.set("staging", ConfigKey::Timeout, "60").unwrap();
        config.use_profile("staging").unwrap();
        config.save_to_path(&path).unwrap();

        let loaded = CliConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.get("staging", ConfigKey::BaseUrl).as_deref(),
            Some("https://staging.cloudbox.dev")
        );
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "profiles: [1, 2").unwrap();
        assert!(matches!(
            CliConfig::load_from_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn keys_accept_dashes() {
        assert_eq!(
            "default-template".parse::<ConfigKey>().unwrap(),
            ConfigKey::DefaultTemplate
        );
        assert_eq!("BASE_URL".parse::<ConfigKey>().unwrap(), ConfigKey::BaseUrl);
        assert!(matches!(
            "colour".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn values_are_validated() {
        let mut config = CliConfig::default();
        assert!(config.set("default", ConfigKey::BaseUrl, "ftp://x").is_err());
        assert!(config.set("default", ConfigKey::BaseUrl, "nope").is_err());
        assert!(config.set("default", ConfigKey::Timeout, "0").is_err());
        assert!(config.set("default", ConfigKey::Timeout, "-5").is_err());
        assert!(config.set("default", ConfigKey::Output, "yaml").is_err());
        assert!(config.set("bad name", ConfigKey::Timeout, "5").is_err());
        config.set("default", ConfigKey::Output, "JSON").unwrap();
        assert_eq!(
            config.get("default", ConfigKey::Output).as_deref(),
            Some("json")
        );
    }

    #[test]
    fn unset_reports_whether_value_existed() {
        let mut config = CliConfig::default();
        config.set("default", ConfigKey::Timeout, "10").unwrap();
        assert!(config.unset("default", ConfigKey::Timeout));
        assert!(!config.unset("default", ConfigKey::Timeout));
        assert!(!config.unset("missing", ConfigKey::Timeout));
    }

    #[test]
    fn env_overrides_beat_file_and_flag_beats_env() {
        let mut config = CliConfig::default();
        config.create_profile("work").unwrap();
        config.create_profile("play").unwrap();
        config
            .set("work", ConfigKey::BaseUrl, "https://work.example")
            .unwrap();
        config.set("work", ConfigKey::Timeout, "10").unwrap();

        let env = EnvOverrides {
            profile: Some("work".into()),
            timeout: Some("99".into()),
            output: Some("plain".into()),
            ..Default::default()
        };

        let resolved = config.resolve(None, &env).unwrap();
        assert_eq!(resolved.profile, "work");
        assert_eq!(resolved.base_url, "https://work.example");
        assert_eq!(resolved.timeout, Duration::from_secs(99));
        assert_eq!(resolved.output, OutputPreference::Plain);

        let resolved = config.resolve(Some("play"), &env).unwrap();
        assert_eq!(resolved.profile, "play");
        assert_eq!(resolved.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn invalid_env_values_are_errors() {
        let config = CliConfig::default();
        let env = EnvOverrides {
            timeout: Some("soon".into()),
            ..Default::default()
        };
        assert!(matches!(
            config.resolve(None, &env),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let config = CliConfig::default();
        assert!(matches!(
            config.resolve(Some("ghost"), &EnvOverrides::default()),
            Err(ConfigError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn deleting_active_profile_falls_back_to_default() {
        let mut config = CliConfig::default();
        config.create_profile("work").unwrap();
        config.use_profile("work").unwrap();
        assert!(matches!(
            config.create_profile("work"),
            Err(ConfigError::ProfileExists(_))
        ));

        config.delete_profile("work").unwrap();
        assert_eq!(config.active_profile, "default");
        assert!(config.delete_profile("work").is_err());
        assert_eq!(config.profile_names(), vec!["default".to_string()]);
    }
}
