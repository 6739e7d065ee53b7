// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lock helpers for the cache layers.
//!
//! `mutex_lock` recovers poisoned in-memory maps instead of failing the
//! request. `KeyLocks` hands out one async mutex per key so that store round
//! trips on the same key are serialized while other keys proceed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;
use tracing::warn;

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                result = "poisoned_recovered",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

/// One async mutex per key plus the number of guards (held or waiting)
/// that refer to it.
struct Slot {
    mutex: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

/// Per-key async locks. Entries exist only while someone holds or waits on
/// them.
pub struct KeyLocks<K> {
    slots: Mutex<HashMap<K, Slot>>,
}

impl<K> Default for KeyLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Clone + Eq + Hash> KeyLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// The returned guard is registered before waiting, so a caller that
    /// gives up mid-wait (for example under a timeout) still releases its
    /// slot.
    pub async fn lock(&self, key: &K) -> KeyGuard<'_, K> {
        let mutex = {
            let mut slots = mutex_lock(&self.slots, "storage::lock", "acquire");
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                mutex: Arc::new(tokio::sync::Mutex::new(())),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };
        let mut guard = KeyGuard {
            locks: self,
            key: key.clone(),
            guard: None,
        };
        guard.guard = Some(mutex.lock_owned().await);
        guard
    }

    /// Number of keys currently locked or awaited.
    pub fn active(&self) -> usize {
        mutex_lock(&self.slots, "storage::lock", "active").len()
    }
}

/// Held while a key is locked (or awaited). Dropping it releases the key and
/// forgets the slot once no other guard refers to it.
pub struct KeyGuard<'a, K: Clone + Eq + Hash> {
    locks: &'a KeyLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Clone + Eq + Hash> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = mutex_lock(&self.locks.slots, "storage::lock", "release");
        let forget = match slots.get_mut(&self.key) {
            Some(slot) => {
                slot.users = slot.users.saturating_sub(1);
                slot.users == 0
            }
            None => false,
        };
        if forget {
            slots.remove(&self.key);
        }
    }
}
