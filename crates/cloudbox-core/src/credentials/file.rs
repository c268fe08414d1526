use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CredentialBackend, CredentialError, CredentialRecord, CredentialResult};

type ProfileMap = BTreeMap<String, CredentialRecord>;

/// Credentials in a YAML mapping of profile name to record.
///
/// Every write replaces the file atomically and leaves it readable only by
/// the owner on Unix.
pub struct YamlFileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> CredentialResult<ProfileMap> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProfileMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(ProfileMap::new());
        }
        serde_yaml::from_str(&content).map_err(|e| CredentialError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write_all(&self, profiles: &ProfileMap) -> CredentialResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let content = serde_yaml::to_string(profiles).map_err(|e| CredentialError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let temp_path = self.path.with_extension("yaml.tmp");
        // A leftover temp file keeps whatever mode it was created with
        match fs::remove_file(&temp_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.io_error(e)),
        }

        let mut file = create_private(&temp_path).map_err(|e| self.io_error(e))?;
        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), profiles = profiles.len(), "Wrote credentials file");
        Ok(())
    }
}

/// Create a new file that only the owner can read or write.
#[cfg(unix)]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}

impl CredentialBackend for YamlFileBackend {
    fn name(&self) -> &'static str {
        "credentials file"
    }

    fn load(&self, profile: &str) -> CredentialResult<Option<CredentialRecord>> {
        Ok(self
            .read_all()?
            .remove(profile)
            .filter(|record| !record.is_empty()))
    }

    fn store(&self, profile: &str, record: &CredentialRecord) -> CredentialResult<()> {
        let _guard = self.write_lock.lock();
        let mut profiles = self.read_all()?;
        profiles.insert(profile.to_string(), record.clone());
        self.write_all(&profiles)
    }

    fn delete(&self, profile: &str) -> CredentialResult<()> {
        let _guard = self.write_lock.lock();
        let mut profiles = self.read_all()?;
        if profiles.remove(profile).is_none() {
            return Ok(());
        }
        self.write_all(&profiles)
    }
}
