use tracing::debug;

use super::{CredentialBackend, CredentialError, CredentialRecord, CredentialResult};

const KEYRING_SERVICE: &str = "cloudbox";
const BACKEND_NAME: &str = "OS keychain";

/// One keychain entry per profile holding the record as JSON.
pub struct KeyringBackend {
    service: String,
}

impl Default for KeyringBackend {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, profile: &str) -> CredentialResult<keyring::Entry> {
        keyring::Entry::new(&self.service, profile).map_err(classify)
    }
}

fn classify(err: keyring::Error) -> CredentialError {
    match err {
        keyring::Error::PlatformFailure(e) => CredentialError::Unavailable {
            backend: BACKEND_NAME,
            reason: e.to_string(),
        },
        keyring::Error::NoStorageAccess(e) => CredentialError::Unavailable {
            backend: BACKEND_NAME,
            reason: e.to_string(),
        },
        other => CredentialError::Backend {
            backend: BACKEND_NAME,
            reason: other.to_string(),
        },
    }
}

impl CredentialBackend for KeyringBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn load(&self, profile: &str) -> CredentialResult<Option<CredentialRecord>> {
        match self.entry(profile)?.get_password() {
            Ok(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| CredentialError::Backend {
                    backend: BACKEND_NAME,
                    reason: format!("stored record is not valid JSON: {e}"),
                }),
            Err(keyring::Error::NoEntry) => {
                debug!(profile, "No keychain entry");
                Ok(None)
            }
            Err(e) => Err(classify(e)),
        }
    }

    fn store(&self, profile: &str, record: &CredentialRecord) -> CredentialResult<()> {
        let json = serde_json::to_string(record).map_err(|e| CredentialError::Backend {
            backend: BACKEND_NAME,
            reason: e.to_string(),
        })?;
        self.entry(profile)?.set_password(&json).map_err(classify)
    }

    fn delete(&self, profile: &str) -> CredentialResult<()> {
        match self.entry(profile)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }
}
