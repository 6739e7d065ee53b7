// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote object store interface.
//!
//! This is the network boundary: buckets of versioned objects addressed by
//! key, each carrying a content type, a string metadata map and a canned
//! ACL. Implementations must be safe to share between request workers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bare::BareObject;
use super::StorageResult;

/// Canned object permission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acl {
    #[default]
    Private,
    PublicRead,
}

impl Acl {
    pub fn from_public(public: bool) -> Self {
        if public {
            Acl::PublicRead
        } else {
            Acl::Private
        }
    }

    pub fn is_public(self) -> bool {
        self == Acl::PublicRead
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
        }
    }
}

/// What the store returns for a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
}

/// One entry of an object's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    pub version_id: String,
    pub last_modified: DateTime<Utc>,
    pub is_latest: bool,
}

/// A single page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Keys directly under the prefix.
    pub keys: Vec<String>,
    /// Grouped "directories" when a delimiter was given.
    pub common_prefixes: Vec<String>,
    /// More results exist beyond this page.
    pub truncated: bool,
}

/// Operations offered by the remote object store.
///
/// All calls are single remote requests. Implementations do not retry; the
/// adapter in front of them adds deadlines.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the latest version of `key`, or the given version.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> StorageResult<BareObject>;

    /// Store a new version of `object.key`. `object.acl` is applied when set.
    async fn put_object(&self, bucket: &str, object: BareObject) -> StorageResult<PutReceipt>;

    /// Delete the latest version. Deleting an absent key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// List at most `max_keys` entries under `prefix`.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        max_keys: usize,
    ) -> StorageResult<Listing>;

    /// Version history of `key`, newest first.
    async fn list_object_versions(&self, bucket: &str, key: &str)
        -> StorageResult<Vec<ObjectVersion>>;

    async fn get_object_acl(&self, bucket: &str, key: &str) -> StorageResult<Acl>;

    async fn put_object_acl(&self, bucket: &str, key: &str, acl: Acl) -> StorageResult<()>;
}
