// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded LRU layer in front of the bare store, one per record type.
//!
//! Reads populate on miss. Writes and removals go to the store first and
//! touch memory only once the store call succeeded, so a failure never
//! leaves the cache ahead of the store. Operations on the same key are
//! serialized by a per-key async lock; the LRU map itself sits behind a
//! short synchronous mutex that is never held across an await.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;
use serde::Serialize;
use tracing::{debug, error};

use super::bare::BareStore;
use super::codec::{Decode, Encode, RecordKind};
use super::lock::{mutex_lock, KeyLocks};
use super::StorageResult;

const LOCK_TARGET: &str = "storage::cache";

/// Point-in-time counters for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub kind: &'static str,
    pub capacity: usize,
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Read-through, write-through cache for records of type `T`.
pub struct CacheLayer<T: Encode> {
    store: BareStore,
    entries: Mutex<LruCache<T::Key, T>>,
    locks: KeyLocks<T::Key>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<T: Encode> CacheLayer<T> {
    /// Create a layer holding at most `capacity` records (minimum 1).
    pub fn new(store: BareStore, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            entries: Mutex::new(LruCache::new(capacity)),
            locks: KeyLocks::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &BareStore {
        &self.store
    }

    /// Encode and put `value`, then cache it. Returns the value with any
    /// store-assigned attributes filled in.
    pub async fn set(&self, mut value: T) -> StorageResult<T> {
        let key = value.cache_key();
        let _guard = self.locks.lock(&key).await;

        let object = value.encode()?;
        let receipt = self.store.put(object).await?;
        value.on_stored(&receipt);
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Delete from the store, then evict. A failed delete keeps the entry.
    pub async fn remove(&self, key: &T::Key) -> StorageResult<()> {
        let _guard = self.locks.lock(key).await;
        self.store.delete(&T::object_key(key)).await?;
        mutex_lock(&self.entries, LOCK_TARGET, "remove").pop(key);
        Ok(())
    }

    /// Whether `key` is cached. Does not touch recency.
    pub fn contains(&self, key: &T::Key) -> bool {
        mutex_lock(&self.entries, LOCK_TARGET, "contains").contains(key)
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, LOCK_TARGET, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached entry whose key matches, without touching the
    /// store. Returns the number of entries dropped.
    pub fn evict_where(&self, mut matches: impl FnMut(&T::Key) -> bool) -> usize {
        let mut entries = mutex_lock(&self.entries, LOCK_TARGET, "evict_where");
        let doomed: Vec<T::Key> = entries
            .iter()
            .filter(|(key, _)| matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = mutex_lock(&self.entries, LOCK_TARGET, "stats");
        CacheStats {
            kind: T::KIND.as_str(),
            capacity: entries.cap().get(),
            len: entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, key: &T::Key) -> Option<T> {
        let hit = mutex_lock(&self.entries, LOCK_TARGET, "get")
            .get(key)
            .cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn insert(&self, key: T::Key, value: T) {
        let evicted = mutex_lock(&self.entries, LOCK_TARGET, "insert").push(key.clone(), value);
        // `push` also returns the old value when replacing the same key.
        if let Some((old_key, _)) = evicted.filter(|(old_key, _)| *old_key != key) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(kind = %T::KIND, key = ?old_key, "Evicted least recently used entry");
        }
    }
}

impl<T: Decode> CacheLayer<T> {
    /// Return the cached record or fetch, decode and cache it.
    ///
    /// `NotFound` and store failures propagate and cache nothing.
    pub async fn get(&self, key: &T::Key) -> StorageResult<T> {
        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }

        let _guard = self.locks.lock(key).await;
        // Another task may have populated the key while we waited.
        if let Some(value) = self.lookup(key) {
            return Ok(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let object = self.store.get(&T::object_key(key), T::version(key)).await?;
        let value = T::decode(key, object).map_err(|e| {
            error!(kind = %T::KIND, key = ?key, error = %e, "Stored object failed to decode");
            e
        })?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }
}
