//! Preference store adapter.
//!
//! A read-through cache in front of durable key-value storage. Values are
//! JSON-encoded before they reach storage. Every successful `set` or `clear`
//! invalidates the cached read for that key, so the next `get` observes it.
//!
//! Storage errors propagate unchanged; nothing here retries. Concurrent
//! writes to the same key are not serialized: the last write to reach
//! storage wins, and callers that need strict ordering must serialize
//! themselves.

pub mod cache;
pub mod keys;
pub mod storage;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::errors::PreferenceError;
pub use cache::{CacheEvent, CacheStats, QueryCache, QueryKey};
pub use keys::{Favorite, Theme};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};

/// Handle to the preference store. Clones share storage and cache.
#[derive(Clone)]
pub struct Preferences {
    storage: Arc<dyn KeyValueStorage>,
    cache: Arc<QueryCache>,
}

impl Preferences {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_cache(storage, Arc::new(QueryCache::new()))
    }

    pub fn with_cache(storage: Arc<dyn KeyValueStorage>, cache: Arc<QueryCache>) -> Self {
        Self { storage, cache }
    }

    /// Preferences persisted as files under `dir`.
    pub fn open(dir: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(dir)))
    }

    /// Volatile preferences, mostly for tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }

    /// Raw JSON value stored under `key`, `None` when absent.
    pub async fn get_value(&self, key: &str) -> Result<Option<Value>, PreferenceError> {
        let query = QueryKey::preference(key);
        if let Some(cached) = self.cache.get(&query) {
            return Ok(cached);
        }

        let ticket = self.cache.begin_fill(&query);
        let value: Option<Value> = match self.storage.get(key).await? {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|source| {
                PreferenceError::Decode {
                    key: key.to_string(),
                    source,
                }
            })?),
            None => None,
        };
        self.cache.complete_fill(ticket, value.clone());
        Ok(value)
    }

    /// Typed value stored under `key`, `None` when absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PreferenceError> {
        match self.get_value(key).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| PreferenceError::Decode {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Typed value stored under `key`, or `default` when absent.
    pub async fn get_or<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, PreferenceError> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Persist `value` under `key`, then invalidate the cached read.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), PreferenceError> {
        let raw = serde_json::to_string(value).map_err(|source| PreferenceError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.storage.set(key, raw).await?;
        self.cache.invalidate(&QueryKey::preference(key));
        tracing::debug!(key, "Preference written");
        Ok(())
    }

    /// Remove `key` from storage, then invalidate the cached read.
    pub async fn clear(&self, key: &str) -> Result<(), PreferenceError> {
        self.storage.remove(key).await?;
        self.cache.invalidate(&QueryKey::preference(key));
        tracing::debug!(key, "Preference cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts reads and can be switched to fail every call.
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        reads: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl CountingStorage {
        fn check(&self, key: &str) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Io {
                    key: key.to_string(),
                    source: std::io::Error::other("disk on fire"),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KeyValueStorage for CountingStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.check(key)?;
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.check(key)?;
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.check(key)?;
            self.inner.remove(key).await
        }
    }

    fn counting() -> (Arc<CountingStorage>, Preferences) {
        let storage = Arc::new(CountingStorage::default());
        let prefs = Preferences::new(storage.clone());
        (storage, prefs)
    }

    #[tokio::test]
    async fn test_token_set_get_clear_scenario() {
        let prefs = Preferences::in_memory();

        prefs.set("token", "abc123").await.unwrap();
        assert_eq!(
            prefs.get::<String>("token").await.unwrap().as_deref(),
            Some("abc123")
        );

        prefs.clear("token").await.unwrap();
        assert_eq!(prefs.get_or("token", String::new()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_round_trip_structured_value() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Layout {
            columns: u8,
            pinned: Vec<String>,
        }

        let prefs = Preferences::in_memory();
        let layout = Layout {
            columns: 3,
            pinned: vec!["apps".into(), "droplets".into()],
        };
        prefs.set("layout", &layout).await.unwrap();
        assert_eq!(prefs.get::<Layout>("layout").await.unwrap(), Some(layout));
    }

    #[tokio::test]
    async fn test_missing_key_returns_default_without_error() {
        let prefs = Preferences::in_memory();
        assert_eq!(prefs.get::<String>("nope").await.unwrap(), None);
        assert_eq!(prefs.get_or("nope", 42u32).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_clear_never_returns_previous_value() {
        let prefs = Preferences::in_memory();
        prefs.set("theme", "dark").await.unwrap();
        // Warm the cache so clear has something to invalidate
        assert_eq!(prefs.get_value("theme").await.unwrap(), Some(json!("dark")));

        prefs.clear("theme").await.unwrap();
        assert_eq!(
            prefs.get_or("theme", "system".to_string()).await.unwrap(),
            "system"
        );
    }

    #[tokio::test]
    async fn test_repeated_reads_hit_cache() {
        let (storage, prefs) = counting();
        prefs.set("token", "abc").await.unwrap();

        for _ in 0..3 {
            assert_eq!(prefs.get_or("token", String::new()).await.unwrap(), "abc");
        }
        assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_absent_reads_are_cached_and_default_applies_per_call() {
        let (storage, prefs) = counting();
        assert_eq!(prefs.get_or("k", 1).await.unwrap(), 1);
        assert_eq!(prefs.get_or("k", 2).await.unwrap(), 2);
        assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_set_invalidates_cached_read() {
        let (storage, prefs) = counting();
        prefs.set("theme", "dark").await.unwrap();
        assert_eq!(prefs.get_or("theme", String::new()).await.unwrap(), "dark");

        prefs.set("theme", "light").await.unwrap();
        assert_eq!(prefs.get_or("theme", String::new()).await.unwrap(), "light");
        assert_eq!(storage.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let prefs = Preferences::in_memory();
        let other = prefs.clone();
        assert_eq!(other.get::<String>("token").await.unwrap(), None);

        prefs.set("token", "shared").await.unwrap();
        assert_eq!(
            other.get::<String>("token").await.unwrap().as_deref(),
            Some("shared")
        );
    }

    #[tokio::test]
    async fn test_write_notifies_subscribers() {
        let prefs = Preferences::in_memory();
        let mut rx = prefs.subscribe();

        prefs.set("favorites", &Vec::<String>::new()).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            CacheEvent::Invalidated(QueryKey::preference("favorites"))
        );
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let (storage, prefs) = counting();
        storage.fail.store(true, Ordering::SeqCst);

        assert!(matches!(
            prefs.set("token", "x").await,
            Err(PreferenceError::Storage(StorageError::Io { .. }))
        ));
        assert!(matches!(
            prefs.get::<String>("token").await,
            Err(PreferenceError::Storage(_))
        ));
        assert!(matches!(
            prefs.clear("token").await,
            Err(PreferenceError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cached_value() {
        let (storage, prefs) = counting();
        prefs.set("token", "good").await.unwrap();
        assert_eq!(prefs.get_or("token", String::new()).await.unwrap(), "good");

        storage.fail.store(true, Ordering::SeqCst);
        assert!(prefs.set("token", "bad").await.is_err());
        // Served from cache, storage is not consulted
        assert_eq!(prefs.get_or("token", String::new()).await.unwrap(), "good");
        assert_eq!(prefs.cache().stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_decode_error() {
        let prefs = Preferences::in_memory();
        prefs.set("count", "not a number").await.unwrap();
        match prefs.get::<u32>("count").await {
            Err(PreferenceError::Decode { key, .. }) => assert_eq!(key, "count"),
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_stored_json_is_decode_error() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("token", "{not json".to_string()).await.unwrap();
        let prefs = Preferences::new(storage);
        assert!(matches!(
            prefs.get_value("token").await,
            Err(PreferenceError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_backed_preferences_persist_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        Preferences::open(dir.path())
            .set("token", "abc123")
            .await
            .unwrap();

        let reopened = Preferences::open(dir.path());
        assert_eq!(
            reopened.get::<String>("token").await.unwrap().as_deref(),
            Some("abc123")
        );
    }
}
