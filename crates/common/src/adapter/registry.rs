//! Registry of partner adapters keyed by partner code.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::provider::BidAdapter;

/// Holds the enabled partner adapters. Read-only once built, so it can be
/// shared across threads behind an `Arc`.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<&'static str, Arc<dyn BidAdapter>>,
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any adapter with the same code.
    pub fn register(&mut self, adapter: Arc<dyn BidAdapter>) {
        let code = adapter.code();
        log::info!("Registering bid adapter: {}", code);
        if self.adapters.insert(code, adapter).is_some() {
            log::warn!("Bid adapter '{}' was registered twice; keeping the latest", code);
        }
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<Arc<dyn BidAdapter>> {
        self.adapters.get(code).cloned()
    }

    /// Registered partner codes in sorted order.
    #[must_use]
    pub fn codes(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn BidAdapter>> {
        self.adapters.values()
    }
}
