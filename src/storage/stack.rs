// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed entry point over the per-type cache layers.
//!
//! Each record type names its layer through [`Layered`], so `load`, `save`
//! and `delete` resolve their pipeline at compile time. Loading a type that
//! only implements `Encode` (the rendered artifact) does not compile.

use tracing::debug;

use super::bare::BareStore;
use super::cache::{CacheLayer, CacheStats};
use super::codec::{Decode, Encode};
use super::records::{FileRecord, PageKey, PageRecord, RenderedArtifact, SessionRecord, UserRecord};
use super::StorageResult;

/// Default entry count of every layer.
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Independent capacity per record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCapacities {
    pub pages: usize,
    pub artifacts: usize,
    pub files: usize,
    pub users: usize,
    pub sessions: usize,
}

impl Default for CacheCapacities {
    fn default() -> Self {
        Self {
            pages: DEFAULT_CACHE_CAPACITY,
            artifacts: DEFAULT_CACHE_CAPACITY,
            files: DEFAULT_CACHE_CAPACITY,
            users: DEFAULT_CACHE_CAPACITY,
            sessions: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Selects the layer that holds records of this type.
pub trait Layered: Encode {
    fn layer(stack: &CacheStack) -> &CacheLayer<Self>;

    /// Extra in-memory cleanup after a successful delete.
    fn after_delete(_stack: &CacheStack, _key: &Self::Key) {}
}

/// All cache layers of one process, sharing one bare store.
pub struct CacheStack {
    store: BareStore,
    pages: CacheLayer<PageRecord>,
    artifacts: CacheLayer<RenderedArtifact>,
    files: CacheLayer<FileRecord>,
    users: CacheLayer<UserRecord>,
    sessions: CacheLayer<SessionRecord>,
}

impl std::fmt::Debug for CacheStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStack")
            .field("store", &self.store)
            .field("stats", &self.stats())
            .finish()
    }
}

impl CacheStack {
    pub fn new(store: BareStore, capacities: CacheCapacities) -> Self {
        Self {
            pages: CacheLayer::new(store.clone(), capacities.pages),
            artifacts: CacheLayer::new(store.clone(), capacities.artifacts),
            files: CacheLayer::new(store.clone(), capacities.files),
            users: CacheLayer::new(store.clone(), capacities.users),
            sessions: CacheLayer::new(store.clone(), capacities.sessions),
            store,
        }
    }

    /// The bare store, for listings and ACL calls that bypass the cache.
    pub fn store(&self) -> &BareStore {
        &self.store
    }

    pub fn layer<T: Layered>(&self) -> &CacheLayer<T> {
        T::layer(self)
    }

    pub async fn load<T: Layered + Decode>(&self, key: &T::Key) -> StorageResult<T> {
        T::layer(self).get(key).await
    }

    pub async fn save<T: Layered>(&self, record: T) -> StorageResult<T> {
        T::layer(self).set(record).await
    }

    pub async fn delete<T: Layered>(&self, key: &T::Key) -> StorageResult<()> {
        T::layer(self).remove(key).await?;
        T::after_delete(self, key);
        Ok(())
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        vec![
            self.pages.stats(),
            self.artifacts.stats(),
            self.files.stats(),
            self.users.stats(),
            self.sessions.stats(),
        ]
    }
}

impl Layered for PageRecord {
    fn layer(stack: &CacheStack) -> &CacheLayer<Self> {
        &stack.pages
    }

    /// Cached historical versions of a deleted page must not be served.
    fn after_delete(stack: &CacheStack, key: &PageKey) {
        let purged = stack
            .pages
            .evict_where(|cached| cached.title_hash == key.title_hash);
        if purged > 0 {
            debug!(title_hash = %key.title_hash, purged, "Purged cached page versions");
        }
    }
}

impl Layered for RenderedArtifact {
    fn layer(stack: &CacheStack) -> &CacheLayer<Self> {
        &stack.artifacts
    }
}

impl Layered for FileRecord {
    fn layer(stack: &CacheStack) -> &CacheLayer<Self> {
        &stack.files
    }
}

impl Layered for UserRecord {
    fn layer(stack: &CacheStack) -> &CacheLayer<Self> {
        &stack.users
    }
}

impl Layered for SessionRecord {
    fn layer(stack: &CacheStack) -> &CacheLayer<Self> {
        &stack.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryObjectStore, StoreOp};
    use crate::storage::object_store::Acl;
    use std::sync::Arc;

    fn stack(capacities: CacheCapacities) -> (Arc<MemoryObjectStore>, CacheStack) {
        let backend = Arc::new(MemoryObjectStore::new());
        let store = BareStore::new(backend.clone(), "wiki");
        (backend, CacheStack::new(store, capacities))
    }

    #[tokio::test]
    async fn dispatches_by_record_type() {
        let (backend, stack) = stack(CacheCapacities::default());
        stack.save(UserRecord::local("alice", "pw")).await.unwrap();
        stack
            .save(PageRecord::new("h1", "Home", "alice", "body"))
            .await
            .unwrap();

        assert!(backend.contains("wiki", "user/alice"));
        assert!(backend.contains("wiki", "page/h1/index.md"));
        assert_eq!(stack.layer::<UserRecord>().len(), 1);
        assert_eq!(stack.layer::<PageRecord>().len(), 1);

        let user: UserRecord = stack.load(&"alice".to_string()).await.unwrap();
        assert_eq!(user.secret, "pw");
        assert_eq!(backend.calls(StoreOp::Get), 0);
    }

    #[tokio::test]
    async fn layers_do_not_evict_each_other() {
        let capacities = CacheCapacities {
            users: 1,
            ..CacheCapacities::default()
        };
        let (_backend, stack) = stack(capacities);
        stack.save(SessionRecord::new("s1")).await.unwrap();
        stack.save(UserRecord::local("a", "x")).await.unwrap();
        stack.save(UserRecord::local("b", "y")).await.unwrap();

        assert_eq!(stack.layer::<UserRecord>().len(), 1);
        assert!(stack.layer::<SessionRecord>().contains(&"s1".to_string()));
    }

    #[tokio::test]
    async fn saved_page_carries_store_version() {
        let (_backend, stack) = stack(CacheCapacities::default());
        let saved = stack
            .save(PageRecord::new("h1", "Home", "alice", "v1"))
            .await
            .unwrap();
        let version = saved.version_id.clone().unwrap();

        stack
            .save(PageRecord::new("h1", "Home", "alice", "v2"))
            .await
            .unwrap();
        let old: PageRecord = stack
            .load(&PageKey::at_version("h1", version))
            .await
            .unwrap();
        assert_eq!(old.body, "v1");
        let latest: PageRecord = stack.load(&PageKey::latest("h1")).await.unwrap();
        assert_eq!(latest.body, "v2");
    }

    #[tokio::test]
    async fn page_delete_purges_cached_versions() {
        let (_backend, stack) = stack(CacheCapacities::default());
        let saved = stack
            .save(PageRecord::new("h1", "Home", "alice", "v1"))
            .await
            .unwrap();
        let versioned = PageKey::at_version("h1", saved.version_id.unwrap());
        stack.load::<PageRecord>(&versioned).await.unwrap();
        stack
            .save(PageRecord::new("h2", "Other", "alice", "x"))
            .await
            .unwrap();

        stack.delete::<PageRecord>(&PageKey::latest("h1")).await.unwrap();

        let pages = stack.layer::<PageRecord>();
        assert!(!pages.contains(&versioned));
        assert!(!pages.contains(&PageKey::latest("h1")));
        assert!(pages.contains(&PageKey::latest("h2")));
    }

    #[tokio::test]
    async fn artifact_is_saved_public_and_deletable() {
        let (backend, stack) = stack(CacheCapacities::default());
        stack
            .save(RenderedArtifact {
                title_hash: "h1".to_string(),
                title: "Home".to_string(),
                author: "alice".to_string(),
                html: "<p>x</p>".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(backend.acl_of("wiki", "page/h1/index.html"), Some(Acl::PublicRead));

        stack
            .delete::<RenderedArtifact>(&"h1".to_string())
            .await
            .unwrap();
        assert!(!backend.contains("wiki", "page/h1/index.html"));
    }

    #[test]
    fn stats_cover_every_layer() {
        let (_backend, stack) = stack(CacheCapacities::default());
        let kinds: Vec<_> = stack.stats().iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec!["page", "artifact", "file", "user", "session"]);
    }
}
