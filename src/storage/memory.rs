// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process object store.
//!
//! Behaves like a versioned bucket: every put creates a new immutable
//! version, deletes leave a delete marker (older versions stay readable by
//! id), listings are sorted and bounded. Used by tests and local runs.
//!
//! Call counters, injected failures and artificial latency let tests observe
//! exactly how many round trips the cache layers make and how they react to
//! a failing or slow network.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::bare::BareObject;
use super::object_store::{Acl, Listing, ObjectStore, ObjectVersion, PutReceipt};
use super::{StorageError, StorageResult};

/// Store operation, used for counters and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Put,
    Delete,
    List,
    ListVersions,
    GetAcl,
    PutAcl,
}

#[derive(Debug, Default)]
struct Entry {
    /// Oldest first.
    versions: Vec<BareObject>,
    deleted: bool,
    acl: Acl,
}

impl Entry {
    fn latest(&self) -> Option<&BareObject> {
        if self.deleted {
            None
        } else {
            self.versions.last()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, BTreeMap<String, Entry>>,
    calls: HashMap<StoreOp, usize>,
    failing: HashSet<StoreOp>,
    offline: bool,
    latency: Option<Duration>,
}

/// Versioned, ACL-aware in-memory bucket store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<State>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of calls made for `op` so far (including failed ones).
    pub fn calls(&self, op: StoreOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    /// Make every subsequent `op` fail with a backend error.
    pub fn fail_on(&self, op: StoreOp) {
        self.state().failing.insert(op);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.failing.clear();
        state.offline = false;
    }

    /// Fail every operation.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Delay every operation by `latency` before it is served.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    /// Whether a live (non-deleted) object exists at `key`.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .and_then(Entry::latest)
            .is_some()
    }

    /// Current ACL of `key`, if the key was ever written.
    pub fn acl_of(&self, bucket: &str, key: &str) -> Option<Acl> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|entry| entry.acl)
    }

    /// Count the call, apply latency and injected faults.
    async fn enter(&self, op: StoreOp) -> StorageResult<()> {
        let latency = {
            let mut state = self.state();
            *state.calls.entry(op).or_insert(0) += 1;
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let state = self.state();
        if state.offline || state.failing.contains(&op) {
            return Err(StorageError::backend(format!("injected failure for {op:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> StorageResult<BareObject> {
        self.enter(StoreOp::Get).await?;
        let state = self.state();
        let entry = state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let found = match version_id {
            Some(version) => entry
                .versions
                .iter()
                .find(|v| v.version_id.as_deref() == Some(version)),
            None => entry.latest(),
        };
        found
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put_object(&self, bucket: &str, mut object: BareObject) -> StorageResult<PutReceipt> {
        self.enter(StoreOp::Put).await?;
        let receipt = PutReceipt {
            version_id: uuid::Uuid::new_v4().simple().to_string(),
            last_modified: Utc::now(),
        };
        object.version_id = Some(receipt.version_id.clone());
        object.last_modified = Some(receipt.last_modified);

        let mut state = self.state();
        let entry = state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .entry(object.key.clone())
            .or_default();
        // A put without an explicit ACL resets to the bucket default.
        entry.acl = object.acl.take().unwrap_or_default();
        entry.deleted = false;
        entry.versions.push(object);
        Ok(receipt)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.enter(StoreOp::Delete).await?;
        let mut state = self.state();
        if let Some(entry) = state
            .buckets
            .get_mut(bucket)
            .and_then(|objects| objects.get_mut(key))
        {
            entry.deleted = true;
        }
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        max_keys: usize,
    ) -> StorageResult<Listing> {
        self.enter(StoreOp::List).await?;
        let state = self.state();
        let mut listing = Listing::default();
        let Some(objects) = state.buckets.get(bucket) else {
            return Ok(listing);
        };

        let mut emitted = 0usize;
        let live = objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, entry)| entry.latest().is_some());

        for (key, _) in live {
            let rest = &key[prefix.len()..];
            let grouped = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| format!("{prefix}{}", &rest[..idx + d.len()])));

            match grouped {
                Some(common) => {
                    if listing.common_prefixes.last() == Some(&common) {
                        continue;
                    }
                    if emitted == max_keys {
                        listing.truncated = true;
                        break;
                    }
                    listing.common_prefixes.push(common);
                }
                None => {
                    if emitted == max_keys {
                        listing.truncated = true;
                        break;
                    }
                    listing.keys.push(key.clone());
                }
            }
            emitted += 1;
        }
        Ok(listing)
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<Vec<ObjectVersion>> {
        self.enter(StoreOp::ListVersions).await?;
        let state = self.state();
        let Some(entry) = state.buckets.get(bucket).and_then(|objects| objects.get(key)) else {
            return Ok(Vec::new());
        };

        let newest = entry.versions.len().saturating_sub(1);
        Ok(entry
            .versions
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(idx, object)| {
                Some(ObjectVersion {
                    version_id: object.version_id.clone()?,
                    last_modified: object.last_modified?,
                    is_latest: idx == newest && !entry.deleted,
                })
            })
            .collect())
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> StorageResult<Acl> {
        self.enter(StoreOp::GetAcl).await?;
        let state = self.state();
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .filter(|entry| entry.latest().is_some())
            .map(|entry| entry.acl)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn put_object_acl(&self, bucket: &str, key: &str, acl: Acl) -> StorageResult<()> {
        self.enter(StoreOp::PutAcl).await?;
        let mut state = self.state();
        let entry = state
            .buckets
            .get_mut(bucket)
            .and_then(|objects| objects.get_mut(key))
            .filter(|entry| !entry.deleted)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        entry.acl = acl;
        Ok(())
    }
}
