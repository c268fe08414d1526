use parking_lot::RwLock;
use std::collections::HashMap;

use super::{CredentialBackend, CredentialRecord, CredentialResult};

/// In-process credential store.
#[derive(Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl CredentialBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self, profile: &str) -> CredentialResult<Option<CredentialRecord>> {
        Ok(self.records.read().get(profile).cloned())
    }

    fn store(&self, profile: &str, record: &CredentialRecord) -> CredentialResult<()> {
        self.records
            .write()
            .insert(profile.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, profile: &str) -> CredentialResult<()> {
        self.records.write().remove(profile);
        Ok(())
    }
}
