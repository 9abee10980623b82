use std::collections::BTreeMap;
use std::sync::Mutex;

/// Process-wide string metadata included verbatim in every report until
/// removed.
#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(key);
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
