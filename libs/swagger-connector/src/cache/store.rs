use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use crate::error::CacheError;
use crate::response::ApiResponse;

/// Key-value store for cached responses.
///
/// Expiry is the store's responsibility: an entry set with `ttl` must stop
/// being returned once `ttl` has elapsed.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// # Errors
    /// Returns [`CacheError`] when the backing store fails.
    async fn get(&self, key: &str) -> Result<Option<ApiResponse>, CacheError>;

    /// # Errors
    /// Returns [`CacheError`] when the backing store fails.
    async fn set(&self, key: &str, value: ApiResponse, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct Entry {
    response: ApiResponse,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process store backed by a bounded moka cache.
pub struct MemoryStore {
    cache: Cache<String, Entry>,
}

impl MemoryStore {
    pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

    #[must_use]
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<ApiResponse>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.response))
    }

    async fn set(&self, key: &str, value: ApiResponse, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(
                key.to_owned(),
                Entry {
                    response: value,
                    ttl,
                },
            )
            .await;
        Ok(())
    }
}
