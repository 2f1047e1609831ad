//! GET response caching.
//!
//! [`cache_key`] decides cacheability, [`ResponseCache`] binds a store and a
//! TTL. The store itself is resolved on first use: a directly injected store is
//! used as is, a model name is looked up once in the [`StoreRegistry`]. An
//! unknown name disables caching with a warning instead of failing calls.

mod key;
mod registry;
mod store;

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

pub use key::cache_key;
pub use registry::{NamedStores, StoreRegistry};
pub use store::{CacheStore, MemoryStore};

use crate::error::CacheError;
use crate::response::ApiResponse;

/// Configured cache model.
#[derive(Clone)]
pub enum CacheModel {
    /// Store name looked up in the registry
    Named(String),
    /// Store instance injected by the host
    Store(Arc<dyn CacheStore>),
}

impl fmt::Debug for CacheModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheModel::Named(name) => f.debug_tuple("Named").field(name).finish(),
            CacheModel::Store(_) => f.write_str("Store(..)"),
        }
    }
}

/// Response cache bound to one connector.
pub struct ResponseCache {
    model: CacheModel,
    ttl: Duration,
    registry: Option<Arc<dyn StoreRegistry>>,
    resolved: OnceLock<Option<Arc<dyn CacheStore>>>,
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("model", &self.model)
            .field("ttl", &self.ttl)
            .field("resolved", &self.resolved.get().map(Option::is_some))
            .finish_non_exhaustive()
    }
}

impl ResponseCache {
    #[must_use]
    pub fn new(model: CacheModel, ttl: Duration, registry: Option<Arc<dyn StoreRegistry>>) -> Self {
        Self {
            model,
            ttl,
            registry,
            resolved: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn resolve(&self) -> Option<Arc<dyn CacheStore>> {
        match &self.model {
            CacheModel::Store(store) => Some(Arc::clone(store)),
            CacheModel::Named(name) => {
                let found = self
                    .registry
                    .as_ref()
                    .and_then(|registry| registry.find_store(name));
                if found.is_none() {
                    tracing::warn!(model = %name, "cache model not found, response caching disabled");
                } else {
                    tracing::debug!(model = %name, ttl = ?self.ttl, "response cache enabled");
                }
                found
            }
        }
    }

    /// Resolved store, `None` when caching is disabled.
    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.resolved.get_or_init(|| self.resolve()).as_ref()
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn lookup(&self, key: &str) -> Result<Option<ApiResponse>, CacheError> {
        match self.store() {
            Some(store) => store.get(key).await,
            None => Ok(None),
        }
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn save(&self, key: &str, response: &ApiResponse) -> Result<(), CacheError> {
        match self.store() {
            Some(store) => store.set(key, response.clone(), self.ttl).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::json_response;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRegistry {
        inner: NamedStores,
        lookups: AtomicUsize,
    }

    impl StoreRegistry for CountingRegistry {
        fn find_store(&self, name: &str) -> Option<Arc<dyn CacheStore>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_store(name)
        }
    }

    #[tokio::test]
    async fn test_named_model_is_resolved_once() {
        let registry = Arc::new(CountingRegistry {
            inner: NamedStores::new().with_store("memory", Arc::new(MemoryStore::default())),
            lookups: AtomicUsize::new(0),
        });
        let cache = ResponseCache::new(
            CacheModel::Named("memory".to_owned()),
            Duration::from_secs(1),
            Some(registry.clone()),
        );

        let res = json_response("http://h/pets", 200, &json!([]));
        cache.save("/pets;", &res).await.unwrap();
        assert_eq!(cache.lookup("/pets;").await.unwrap(), Some(res));
        assert_eq!(cache.lookup("/other;").await.unwrap(), None);
        assert_eq!(registry.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_model_disables_caching() {
        let cache = ResponseCache::new(
            CacheModel::Named("missing".to_owned()),
            Duration::from_secs(1),
            Some(Arc::new(NamedStores::new())),
        );

        let res = json_response("http://h/pets", 200, &json!([]));
        cache.save("/pets;", &res).await.unwrap();
        assert!(cache.store().is_none());
        assert_eq!(cache.lookup("/pets;").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_injected_store_is_used_directly() {
        let store = Arc::new(MemoryStore::default());
        let cache = ResponseCache::new(CacheModel::Store(store.clone()), Duration::from_secs(1), None);

        let res = json_response("http://h/pets", 200, &json!({"a": 1}));
        cache.save("k", &res).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(res));
    }
}
