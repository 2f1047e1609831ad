use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::store::CacheStore;

/// Resolves a cache model name to a store.
pub trait StoreRegistry: Send + Sync {
    fn find_store(&self, name: &str) -> Option<Arc<dyn CacheStore>>;
}

/// Name-keyed store registry.
#[derive(Default)]
pub struct NamedStores {
    stores: RwLock<HashMap<String, Arc<dyn CacheStore>>>,
}

impl NamedStores {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, store: Arc<dyn CacheStore>) {
        let name = name.into();
        tracing::debug!(store = %name, "registering cache store");
        self.stores.write().insert(name, store);
    }

    #[must_use]
    pub fn with_store(self, name: impl Into<String>, store: Arc<dyn CacheStore>) -> Self {
        self.register(name, store);
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl StoreRegistry for NamedStores {
    fn find_store(&self, name: &str) -> Option<Arc<dyn CacheStore>> {
        self.stores.read().get(name).cloned()
    }
}
