use std::collections::BTreeMap;

use parking_lot::Mutex;

use derecho_primitives::{DerechoError, Version};

use crate::DurableStore;

/// Backs every `(prefix, version)` pair with an in-memory byte vector.
/// Used by tests and by the seed scenarios in this workspace; never by a
/// real deployment.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<BTreeMap<(String, Version), Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }
}

impl DurableStore for InMemoryStore {
    fn persist(&self, prefix: &str, version: Version, bytes: &[u8]) -> Result<(), DerechoError> {
        self.data.lock().insert((prefix.to_string(), version), bytes.to_vec());
        Ok(())
    }

    fn load(&self, prefix: &str, version: Version) -> Result<Option<Vec<u8>>, DerechoError> {
        Ok(self.data.lock().get(&(prefix.to_string(), version)).cloned())
    }

    fn trim(&self, prefix: &str, up_to: Version) -> Result<(), DerechoError> {
        self.data.lock().retain(|(p, v), _| p != prefix || *v > up_to);
        Ok(())
    }

    fn truncate(&self, prefix: &str, above: Version) -> Result<(), DerechoError> {
        self.data.lock().retain(|(p, v), _| p != prefix || *v <= above);
        Ok(())
    }
}
