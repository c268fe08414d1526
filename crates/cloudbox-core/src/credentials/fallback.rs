use tracing::{debug, warn};

use super::{CredentialBackend, CredentialError, CredentialRecord, CredentialResult};

/// Ordered chain of backends.
///
/// An `Unavailable` backend is skipped immediately; any other error is retried
/// once on the same backend before moving on.
pub struct FallbackBackend {
    backends: Vec<Box<dyn CredentialBackend>>,
}

impl FallbackBackend {
    pub fn new(backends: Vec<Box<dyn CredentialBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    fn attempt<T>(
        backend: &dyn CredentialBackend,
        op: impl Fn(&dyn CredentialBackend) -> CredentialResult<T>,
    ) -> CredentialResult<T> {
        match op(backend) {
            Err(e) if !e.is_unavailable() => {
                debug!(backend = backend.name(), error = %e, "Retrying credential operation");
                op(backend)
            }
            other => other,
        }
    }
}

fn no_backends() -> CredentialError {
    CredentialError::Unavailable {
        backend: "credential store",
        reason: "no backends configured".into(),
    }
}

impl CredentialBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn load(&self, profile: &str) -> CredentialResult<Option<CredentialRecord>> {
        let mut last_err = None;
        let mut any_answered = false;

        for backend in &self.backends {
            match Self::attempt(backend.as_ref(), |b| b.load(profile)) {
                Ok(Some(record)) => {
                    debug!(backend = backend.name(), profile, "Loaded credentials");
                    return Ok(Some(record));
                }
                Ok(None) => any_answered = true,
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Credential load failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if !any_answered => Err(e),
            _ => Ok(None),
        }
    }

    fn store(&self, profile: &str, record: &CredentialRecord) -> CredentialResult<()> {
        let mut last_err = None;

        for backend in &self.backends {
            match Self::attempt(backend.as_ref(), |b| b.store(profile, record)) {
                Ok(()) => {
                    debug!(backend = backend.name(), profile, "Stored credentials");
                    return Ok(());
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Credential store failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(no_backends))
    }

    fn delete(&self, profile: &str) -> CredentialResult<()> {
        let mut first_err = None;

        for backend in &self.backends {
            match Self::attempt(backend.as_ref(), |b| b.delete(profile)) {
                Ok(()) => {}
                Err(e) if e.is_unavailable() => {
                    debug!(backend = backend.name(), "Skipping unavailable backend on delete");
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Credential delete failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}
