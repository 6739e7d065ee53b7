// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keeps the `public` flag, the rendered artifact and object ACLs in step.
//!
//! ## Transitions
//!
//! Private -> Public:
//! 1. Load the page and list its files
//! 2. Render, sanitize and write the artifact (public-read)
//! 3. Set every file public-read
//! 4. Persist `public = true`
//!
//! Public -> Private:
//! 1. Delete the artifact (absent is fine)
//! 2. Set every file private
//! 3. Persist `public = false`
//!
//! The flag is written last, so a failed transition leaves the page in its
//! old state and the whole call can simply be retried. Nothing is rolled
//! back.
//!
//! Every transition holds the page lock from [`Publisher::lock_page`] from
//! the first read to the final write. Anything else that writes the page
//! record or its files takes the same lock, so visibility changes, edits
//! and republishes of one page apply one at a time.

use std::sync::Arc;

use tracing::{debug, info};

use crate::render::{MarkdownRenderer, RenderError};
use crate::storage::lock::{KeyGuard, KeyLocks};
use crate::storage::{
    Acl, CacheStack, FileRecord, ObjectKeys, PageKey, PageRecord, RenderedArtifact, StorageError,
};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// More files than one listing page returns; ACLs would be left mixed.
    #[error("file listing for page {title_hash} is truncated")]
    ListingTruncated { title_hash: String },
}

impl PublishError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PublishError::Storage(e) if e.is_not_found())
    }
}

/// What a publish call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The flag already had the requested value.
    Unchanged,
    Published,
    Unpublished,
    /// The artifact of a public page was re-rendered.
    Republished,
    /// Republish requested for a private page.
    Skipped,
}

#[derive(Clone)]
pub struct Publisher {
    stack: Arc<CacheStack>,
    renderer: Arc<dyn MarkdownRenderer>,
    page_locks: Arc<KeyLocks<String>>,
}

impl Publisher {
    pub fn new(stack: Arc<CacheStack>, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        Self {
            stack,
            renderer,
            page_locks: Arc::new(KeyLocks::new()),
        }
    }

    /// Exclusive access to one page, shared by every clone of this
    /// publisher.
    pub async fn lock_page(&self, title_hash: &str) -> KeyGuard<'_, String> {
        self.page_locks.lock(&title_hash.to_string()).await
    }

    /// Move a page to the requested visibility. Idempotent.
    pub async fn set_public(&self, title_hash: &str, public: bool) -> Result<PublishOutcome, PublishError> {
        let _page_lock = self.lock_page(title_hash).await;
        let mut page: PageRecord = self.stack.load(&PageKey::latest(title_hash)).await?;
        if page.public == public {
            debug!(title_hash, public, "Page visibility already matches");
            return Ok(PublishOutcome::Unchanged);
        }

        let files = self.list_files(title_hash).await?;
        let outcome = if public {
            self.write_artifact(&page).await?;
            self.set_file_acls(title_hash, &files, Acl::PublicRead).await?;
            PublishOutcome::Published
        } else {
            self.remove_artifact(title_hash).await?;
            self.set_file_acls(title_hash, &files, Acl::Private).await?;
            PublishOutcome::Unpublished
        };

        page.public = public;
        self.stack.save(page).await?;
        info!(title_hash, public, files = files.len(), "Page visibility changed");
        Ok(outcome)
    }

    /// Re-render the artifact of a public page. Never touches the page
    /// record; private pages are skipped.
    pub async fn republish(&self, title_hash: &str) -> Result<PublishOutcome, PublishError> {
        let _page_lock = self.lock_page(title_hash).await;
        let page: PageRecord = self.stack.load(&PageKey::latest(title_hash)).await?;
        if !page.public {
            debug!(title_hash, "Skipping republish of private page");
            return Ok(PublishOutcome::Skipped);
        }
        self.write_artifact(&page).await?;
        info!(title_hash, version_id = ?page.version_id, "Page republished");
        Ok(PublishOutcome::Republished)
    }

    async fn write_artifact(&self, page: &PageRecord) -> Result<(), PublishError> {
        let html = self.renderer.render_page(&page.body)?;
        self.stack
            .save(RenderedArtifact {
                title_hash: page.title_hash.clone(),
                title: page.title.clone(),
                author: page.author.clone(),
                html,
            })
            .await?;
        Ok(())
    }

    async fn remove_artifact(&self, title_hash: &str) -> Result<(), PublishError> {
        match self
            .stack
            .delete::<RenderedArtifact>(&title_hash.to_string())
            .await
        {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn list_files(&self, title_hash: &str) -> Result<Vec<String>, PublishError> {
        let listing = self
            .stack
            .store()
            .list_prefix(&ObjectKeys::page_files_prefix(title_hash), None)
            .await?;
        if listing.truncated {
            return Err(PublishError::ListingTruncated {
                title_hash: title_hash.to_string(),
            });
        }
        Ok(listing.keys)
    }

    async fn set_file_acls(&self, title_hash: &str, keys: &[String], acl: Acl) -> Result<(), PublishError> {
        for key in keys {
            self.stack.store().set_acl(key, acl).await?;
        }
        // Cached uploads remember the ACL they were written with.
        self.stack
            .layer::<FileRecord>()
            .evict_where(|cached| cached.title_hash == title_hash);
        Ok(())
    }
}
