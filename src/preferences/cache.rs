//! Process-wide query cache with explicit invalidation.
//!
//! Reads fill the cache through [`QueryCache::begin_fill`] / [`QueryCache::complete_fill`].
//! Every invalidation bumps the key's generation, and a fill that started
//! before an invalidation is dropped instead of stored, so a slow read can
//! never resurrect a value older than a completed write.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Scope used for every preference query key.
pub const PREFERENCES_SCOPE: &str = "preferences";

const EVENT_CAPACITY: usize = 64;

/// Cache key: the `(scope, key)` tuple a read is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    scope: &'static str,
    key: String,
}

impl QueryKey {
    pub fn new(scope: &'static str, key: impl Into<String>) -> Self {
        Self {
            scope,
            key: key.into(),
        }
    }

    pub fn preference(key: impl Into<String>) -> Self {
        Self::new(PREFERENCES_SCOPE, key)
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.scope, self.key)
    }
}

/// Notification sent to subscribers when cached data goes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Invalidated(QueryKey),
    Cleared,
}

/// Token returned by `begin_fill`; carries the generation the read started at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillTicket {
    key: QueryKey,
    generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    /// `Some(None)` caches a confirmed-absent key.
    value: Option<Option<Value>>,
}

pub struct QueryCache {
    slots: Mutex<HashMap<QueryKey, Slot>>,
    events: broadcast::Sender<CacheEvent>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            slots: Mutex::new(HashMap::new()),
            events,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
        // Slot updates are single assignments; a panicked holder cannot leave one half-written.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a cached result. The outer `None` means "not cached".
    pub fn get(&self, key: &QueryKey) -> Option<Option<Value>> {
        let cached = self.slots().get(key).and_then(|slot| slot.value.clone());
        match cached {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        cached
    }

    /// Record the generation a read-through is starting at.
    pub fn begin_fill(&self, key: &QueryKey) -> FillTicket {
        let generation = self.slots().entry(key.clone()).or_default().generation;
        FillTicket {
            key: key.clone(),
            generation,
        }
    }

    /// Store a read result unless the key was invalidated since `begin_fill`.
    /// Returns whether the value was stored.
    pub fn complete_fill(&self, ticket: FillTicket, value: Option<Value>) -> bool {
        let mut slots = self.slots();
        let slot = slots.entry(ticket.key.clone()).or_default();
        if slot.generation != ticket.generation {
            tracing::debug!(key = %ticket.key, "Discarding stale cache fill");
            return false;
        }
        slot.value = Some(value);
        true
    }

    /// Mark `key` stale and notify subscribers. The next read goes to storage.
    pub fn invalidate(&self, key: &QueryKey) {
        {
            let mut slots = self.slots();
            let slot = slots.entry(key.clone()).or_default();
            slot.generation += 1;
            slot.value = None;
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "Invalidated cached query");
        // No subscribers is fine
        let _ = self.events.send(CacheEvent::Invalidated(key.clone()));
    }

    /// Drop every cached value.
    pub fn clear(&self) {
        {
            let mut slots = self.slots();
            for slot in slots.values_mut() {
                slot.generation += 1;
                slot.value = None;
            }
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        let _ = self.events.send(CacheEvent::Cleared);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}
