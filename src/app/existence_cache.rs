use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Process-local set of URLs known to be archived.
///
/// Append-only and unbounded; guarded by a single lock so one pipeline can be
/// shared across concurrent `process` calls.
#[derive(Debug, Default)]
pub struct ExistenceCache {
    urls: RwLock<HashSet<String>>,
}

impl ExistenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    /// Idempotent.
    pub fn add(&self, url: &str) {
        let mut urls = self.urls.write().unwrap_or_else(PoisonError::into_inner);
        if !urls.contains(url) {
            urls.insert(url.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.urls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
