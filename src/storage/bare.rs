// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bare object tuple and the store adapter that moves it over the wire.
//!
//! `BareObject` is the type-independent `(key, metadata, body, content-type)`
//! representation. `BareStore` is the only component that calls the object
//! store; it pins the bucket, bounds every call with a deadline and logs
//! failures. It never retries.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::object_store::{Acl, Listing, ObjectStore, ObjectVersion, PutReceipt};
use super::{StorageError, StorageResult};

/// Default per-call deadline.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default page size for prefix listings.
pub const DEFAULT_MAX_KEYS: usize = 30;

/// Generic object representation used for all store I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BareObject {
    pub key: String,
    pub content_type: String,
    pub body: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    /// Canned ACL to apply on put. `None` leaves the store default (private).
    pub acl: Option<Acl>,
    /// Filled in by the store on reads.
    pub version_id: Option<String>,
    /// Filled in by the store on reads.
    pub last_modified: Option<DateTime<Utc>>,
}

impl BareObject {
    pub fn new(key: impl Into<String>, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            content_type: content_type.into(),
            body,
            metadata: BTreeMap::new(),
            acl: None,
            version_id: None,
            last_modified: None,
        }
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    pub fn with_acl(mut self, acl: Acl) -> Self {
        self.acl = Some(acl);
        self
    }

    /// Look up a metadata value by name.
    pub fn meta(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).map(String::as_str)
    }
}

/// Bucket-scoped adapter over an [`ObjectStore`] with per-call deadlines.
#[derive(Clone)]
pub struct BareStore {
    backend: Arc<dyn ObjectStore>,
    bucket: String,
    timeout: Duration,
    max_keys: usize,
}

impl std::fmt::Debug for BareStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BareStore")
            .field("bucket", &self.bucket)
            .field("timeout", &self.timeout)
            .field("max_keys", &self.max_keys)
            .finish_non_exhaustive()
    }
}

impl BareStore {
    pub fn new(backend: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
            timeout: DEFAULT_STORE_TIMEOUT,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys.max(1);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    /// Run one store call under the deadline. Elapsed deadlines become
    /// `StorageError::Timeout`, never success and never `NotFound`.
    async fn call<T, F>(&self, op: &'static str, key: &str, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if !e.is_not_found() {
                    warn!(op, key, bucket = %self.bucket, error = %e, "Object store call failed");
                }
                Err(e)
            }
            Err(_) => {
                warn!(
                    op,
                    key,
                    bucket = %self.bucket,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Object store call timed out"
                );
                Err(StorageError::Timeout {
                    op,
                    key: key.to_string(),
                    after: self.timeout,
                })
            }
        }
    }

    /// Fetch the latest version of `key`, or a specific version.
    pub async fn get(&self, key: &str, version_id: Option<&str>) -> StorageResult<BareObject> {
        debug!(key, version_id, "store get");
        self.call(
            "get",
            key,
            self.backend.get_object(&self.bucket, key, version_id),
        )
        .await
    }

    pub async fn put(&self, object: BareObject) -> StorageResult<PutReceipt> {
        let key = object.key.clone();
        debug!(key = %key, bytes = object.body.len(), "store put");
        self.call("put", &key, self.backend.put_object(&self.bucket, object))
            .await
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        debug!(key, "store delete");
        self.call("delete", key, self.backend.delete_object(&self.bucket, key))
            .await
    }

    /// One bounded page of keys under `prefix`.
    ///
    /// Only the first page is returned; callers inspect `truncated`.
    pub async fn list_prefix(&self, prefix: &str, delimiter: Option<&str>) -> StorageResult<Listing> {
        self.call(
            "list",
            prefix,
            self.backend
                .list_objects(&self.bucket, prefix, delimiter, self.max_keys),
        )
        .await
    }

    pub async fn list_versions(&self, key: &str) -> StorageResult<Vec<ObjectVersion>> {
        self.call(
            "list_versions",
            key,
            self.backend.list_object_versions(&self.bucket, key),
        )
        .await
    }

    pub async fn get_acl(&self, key: &str) -> StorageResult<Acl> {
        self.call("get_acl", key, self.backend.get_object_acl(&self.bucket, key))
            .await
    }

    pub async fn set_acl(&self, key: &str, acl: Acl) -> StorageResult<()> {
        debug!(key, acl = acl.as_str(), "store set_acl");
        self.call(
            "set_acl",
            key,
            self.backend.put_object_acl(&self.bucket, key, acl),
        )
        .await
    }

    /// Cheap reachability check used by health probes.
    pub async fn probe(&self) -> StorageResult<()> {
        self.call(
            "probe",
            "",
            self.backend.list_objects(&self.bucket, "", Some("/"), 1),
        )
        .await
        .map(|_| ())
    }
}
