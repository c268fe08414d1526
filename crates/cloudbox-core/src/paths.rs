use anyhow::Result;
use std::path::PathBuf;

const CLOUDBOX_DIR: &str = ".cloudbox";
const CONFIG_FILE: &str = "config.yaml";
const CREDENTIALS_FILE: &str = "credentials.yaml";
const LOGS_DIR: &str = "logs";

/// Environment variable to override the Cloudbox directory.
pub const CLOUDBOX_DIR_ENV: &str = "CLOUDBOX_DIR";

/// Resolve the Cloudbox configuration directory.
/// Priority: CLOUDBOX_DIR env var > ~/.cloudbox/
pub fn resolve_cloudbox_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CLOUDBOX_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(CLOUDBOX_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Get the config file path: ~/.cloudbox/config.yaml
pub fn config_path() -> Result<PathBuf> {
    Ok(resolve_cloudbox_dir()?.join(CONFIG_FILE))
}

/// Get the fallback credentials file path: ~/.cloudbox/credentials.yaml
pub fn credentials_path() -> Result<PathBuf> {
    Ok(resolve_cloudbox_dir()?.join(CREDENTIALS_FILE))
}

/// Get the logs directory: ~/.cloudbox/logs/
pub fn logs_dir() -> Result<PathBuf> {
    let dir = resolve_cloudbox_dir()?.join(LOGS_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_under_the_cloudbox_dir() {
        let dir = resolve_cloudbox_dir().expect("dir");
        assert_eq!(config_path().unwrap(), dir.join(CONFIG_FILE));
        assert_eq!(credentials_path().unwrap(), dir.join(CREDENTIALS_FILE));
    }
}
