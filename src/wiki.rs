// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wiki Service
//!
//! Page, file and visibility operations used by the HTTP layer. Everything
//! goes through the shared [`CacheStack`]; visibility changes go through the
//! [`Publisher`], synchronously or via the publish queue.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::{AuthError, Authenticator};
use crate::publish::{PublishError, PublishJob, PublishOutcome, PublishQueue, Publisher, QueueError};
use crate::storage::paths::{DELIMITER, PAGE_ROOT};
use crate::storage::{
    title_hash, Acl, Breadcrumb, CacheStack, FileKey, FileRecord, ObjectKeys, ObjectVersion, PageKey,
    PageRecord, RenderedArtifact, SessionRecord, StorageError,
};

#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    #[error("title does not match page id {title_hash}")]
    TitleMismatch { title_hash: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl WikiError {
    pub fn is_not_found(&self) -> bool {
        match self {
            WikiError::Storage(e) => e.is_not_found(),
            WikiError::Publish(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type WikiResult<T> = Result<T, WikiError>;

/// One page of the page index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageList {
    pub title_hashes: Vec<String>,
    /// More pages exist than one listing returns.
    pub truncated: bool,
}

pub struct Wiki {
    stack: Arc<CacheStack>,
    publisher: Publisher,
    queue: PublishQueue,
    auth: Authenticator,
    secret: String,
    region: String,
}

impl Wiki {
    pub fn new(
        stack: Arc<CacheStack>,
        publisher: Publisher,
        queue: PublishQueue,
        auth: Authenticator,
        secret: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            stack,
            publisher,
            queue,
            auth,
            secret: secret.into(),
            region: region.into(),
        }
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    pub fn stack(&self) -> &Arc<CacheStack> {
        &self.stack
    }

    /// Storage id of a title under this wiki's secret.
    pub fn title_hash(&self, title: &str) -> String {
        title_hash(title, &self.secret)
    }

    /// Address of the published artifact on the bucket's website endpoint.
    pub fn public_url(&self, title_hash: &str) -> String {
        format!(
            "http://{}.s3-website-{}.amazonaws.com/page/{}",
            self.stack.store().bucket(),
            self.region,
            title_hash
        )
    }

    /// Save a new version of a page. The public flag is carried over and a
    /// public page gets its artifact re-rendered in the background.
    pub async fn edit_page(
        &self,
        title: &str,
        title_hash: &str,
        author: &str,
        body: &str,
    ) -> WikiResult<PageRecord> {
        if title.trim().is_empty() {
            return Err(WikiError::InvalidInput("title is required".to_string()));
        }
        if self.title_hash(title) != title_hash {
            return Err(WikiError::TitleMismatch {
                title_hash: title_hash.to_string(),
            });
        }

        // The flag is read and written under the page lock so a concurrent
        // visibility change cannot be overwritten.
        let page_lock = self.publisher.lock_page(title_hash).await;
        let public = match self.stack.load::<PageRecord>(&PageKey::latest(title_hash)).await {
            Ok(existing) => existing.public,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e.into()),
        };
        let mut page = PageRecord::new(title_hash, title, author, body);
        page.public = public;
        let page = self.stack.save(page).await?;
        info!(title_hash, author, version_id = ?page.version_id, "Page saved");
        drop(page_lock);

        if page.public {
            // A rejected job is logged by the queue; the edit itself stands.
            let _ = self.queue.submit(PublishJob::Republish {
                title_hash: title_hash.to_string(),
            });
        }
        Ok(page)
    }

    /// Load a page (latest or a given version) and record the visit on the
    /// session, if any.
    pub async fn view_page(
        &self,
        session_id: Option<&str>,
        title_hash: &str,
        version_id: Option<&str>,
    ) -> WikiResult<PageRecord> {
        let key = match version_id {
            Some(version) => PageKey::at_version(title_hash, version),
            None => PageKey::latest(title_hash),
        };
        let page: PageRecord = self.stack.load(&key).await?;

        if let Some(session_id) = session_id {
            if let Err(e) = self.record_visit(session_id, &page).await {
                warn!(session_id, title_hash, error = %e, "Failed to record breadcrumb");
            }
        }
        Ok(page)
    }

    async fn record_visit(&self, session_id: &str, page: &PageRecord) -> Result<(), StorageError> {
        let mut session = match self
            .stack
            .load::<SessionRecord>(&session_id.to_string())
            .await
        {
            Ok(session) => session,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        session.push_breadcrumb(page.title.clone(), page.title_hash.clone());
        self.stack.save(session).await?;
        Ok(())
    }

    pub async fn breadcrumbs(&self, session_id: &str) -> WikiResult<Vec<Breadcrumb>> {
        let session: SessionRecord = self.stack.load(&session_id.to_string()).await?;
        Ok(session.breadcrumbs)
    }

    /// Remove the artifact, every attached file and the page source.
    pub async fn delete_page(&self, title_hash: &str) -> WikiResult<()> {
        let _page_lock = self.publisher.lock_page(title_hash).await;
        match self
            .stack
            .delete::<RenderedArtifact>(&title_hash.to_string())
            .await
        {
            Err(e) if !e.is_not_found() => return Err(e.into()),
            _ => {}
        }

        let prefix = ObjectKeys::page_files_prefix(title_hash);
        let mut removed = 0usize;
        loop {
            // Deleted keys drop out of the listing, so each pass sees the
            // next batch.
            let listing = self.stack.store().list_prefix(&prefix, None).await?;
            for key in &listing.keys {
                let Some(filename) = key.strip_prefix(&prefix) else {
                    continue;
                };
                self.stack
                    .delete::<FileRecord>(&FileKey::new(title_hash, filename))
                    .await?;
                removed += 1;
            }
            if !listing.truncated || listing.keys.is_empty() {
                break;
            }
        }

        self.stack
            .delete::<PageRecord>(&PageKey::latest(title_hash))
            .await?;
        info!(title_hash, files = removed, "Page deleted");
        Ok(())
    }

    pub async fn list_pages(&self) -> WikiResult<PageList> {
        let listing = self
            .stack
            .store()
            .list_prefix(PAGE_ROOT, Some(DELIMITER))
            .await?;
        let title_hashes = listing
            .common_prefixes
            .iter()
            .filter_map(|prefix| ObjectKeys::title_hash_from_prefix(prefix))
            .map(str::to_string)
            .collect();
        Ok(PageList {
            title_hashes,
            truncated: listing.truncated,
        })
    }

    /// Stored versions of a page, newest first.
    pub async fn page_history(&self, title_hash: &str) -> WikiResult<Vec<ObjectVersion>> {
        Ok(self
            .stack
            .store()
            .list_versions(&ObjectKeys::page_markdown(title_hash))
            .await?)
    }

    /// Attach a file to an existing page. Its ACL follows the page.
    pub async fn upload_file(
        &self,
        title_hash: &str,
        filename: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> WikiResult<FileRecord> {
        validate_filename(filename)?;
        // A visibility change must not run between reading the flag and
        // writing the file's ACL.
        let _page_lock = self.publisher.lock_page(title_hash).await;
        let page: PageRecord = self.stack.load(&PageKey::latest(title_hash)).await?;

        let mut file = FileRecord::new(title_hash, filename, content_type, body);
        file.acl = Some(Acl::from_public(page.public));
        let file = self.stack.save(file).await?;
        debug!(title_hash, filename, public = page.public, "File uploaded");
        Ok(file)
    }

    pub async fn load_file(&self, title_hash: &str, filename: &str) -> WikiResult<FileRecord> {
        Ok(self.stack.load(&FileKey::new(title_hash, filename)).await?)
    }

    /// Change visibility and wait for the transition to finish.
    pub async fn set_public(&self, title_hash: &str, public: bool) -> WikiResult<PublishOutcome> {
        Ok(self.publisher.set_public(title_hash, public).await?)
    }

    /// Queue a visibility change without waiting for it.
    pub fn request_publish(&self, title_hash: &str, public: bool) -> WikiResult<()> {
        self.queue.submit(PublishJob::SetPublic {
            title_hash: title_hash.to_string(),
            public,
        })?;
        Ok(())
    }

    /// Whether the page's artifact is published with public-read.
    pub async fn is_public(&self, title_hash: &str) -> WikiResult<bool> {
        match self
            .stack
            .store()
            .get_acl(&ObjectKeys::page_html(title_hash))
            .await
        {
            Ok(acl) => Ok(acl.is_public()),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_filename(filename: &str) -> WikiResult<()> {
    if filename.is_empty() || filename == "." || filename == ".." {
        return Err(WikiError::InvalidInput("filename is required".to_string()));
    }
    if filename.contains('/') || filename.chars().any(char::is_control) {
        return Err(WikiError::InvalidInput(format!(
            "filename `{filename}` contains invalid characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DEFAULT_SESSION_TTL;
    use crate::publish::{spawn_workers, PublishWorkers};
    use crate::render::ComrakRenderer;
    use crate::storage::{BareStore, CacheCapacities, MemoryObjectStore, ObjectStore};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const BUCKET: &str = "wikibucket";
    const SECRET: &str = "testSecret";

    struct Fixture {
        backend: Arc<MemoryObjectStore>,
        wiki: Wiki,
        shutdown: CancellationToken,
        workers: PublishWorkers,
    }

    impl Fixture {
        async fn stop(self) {
            self.shutdown.cancel();
            self.workers.join().await;
        }
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(MemoryObjectStore::new());
        let stack = Arc::new(CacheStack::new(
            BareStore::new(backend.clone(), BUCKET),
            CacheCapacities::default(),
        ));
        let publisher = Publisher::new(stack.clone(), Arc::new(ComrakRenderer::new()));
        let shutdown = CancellationToken::new();
        let (queue, workers) = spawn_workers(publisher.clone(), 1, 8, shutdown.clone());
        let auth = Authenticator::new(stack.clone(), DEFAULT_SESSION_TTL);
        Fixture {
            backend,
            wiki: Wiki::new(stack, publisher, queue, auth, SECRET, "ap-northeast-1"),
            shutdown,
            workers,
        }
    }

    async fn create(wiki: &Wiki, title: &str, body: &str) -> String {
        let hash = wiki.title_hash(title);
        wiki.edit_page(title, &hash, "alice", body).await.unwrap();
        hash
    }

    async fn artifact_body(backend: &MemoryObjectStore, hash: &str) -> Option<String> {
        backend
            .get_object(BUCKET, &ObjectKeys::page_html(hash), None)
            .await
            .ok()
            .map(|o| String::from_utf8_lossy(&o.body).into_owned())
    }

    #[tokio::test]
    async fn edit_rejects_mismatched_title() {
        let fx = fixture();
        let hash = fx.wiki.title_hash("Home");
        let err = fx
            .wiki
            .edit_page("Other", &hash, "alice", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, WikiError::TitleMismatch { .. }));
        fx.stop().await;
    }

    #[tokio::test]
    async fn edit_of_public_page_republishes_in_background() {
        let fx = fixture();
        let hash = create(&fx.wiki, "Home", "first").await;
        fx.wiki.set_public(&hash, true).await.unwrap();

        let page = fx
            .wiki
            .edit_page("Home", &hash, "bob", "second edit")
            .await
            .unwrap();
        assert!(page.public);

        let mut republished = false;
        for _ in 0..100 {
            if artifact_body(&fx.backend, &hash)
                .await
                .is_some_and(|html| html.contains("second edit"))
            {
                republished = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(republished);
        fx.stop().await;
    }

    async fn latest_page(wiki: &Wiki, hash: &str) -> PageRecord {
        wiki.stack()
            .load(&PageKey::latest(hash))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn edit_during_publish_is_kept() {
        let fx = fixture();
        let hash = create(&fx.wiki, "Home", "old body").await;
        fx.backend.set_latency(Duration::from_millis(20));

        let (published, edited) = tokio::join!(fx.wiki.set_public(&hash, true), async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            fx.wiki.edit_page("Home", &hash, "bob", "NEW body").await
        });
        fx.backend.set_latency(Duration::ZERO);

        assert_eq!(published.unwrap(), PublishOutcome::Published);
        assert!(edited.unwrap().public);

        let page = latest_page(&fx.wiki, &hash).await;
        assert_eq!(page.body, "NEW body");
        assert!(page.public);
        assert_eq!(
            page.public,
            fx.backend.contains(BUCKET, &ObjectKeys::page_html(&hash))
        );
        fx.stop().await;
    }

    #[tokio::test]
    async fn publish_during_edit_renders_the_new_body() {
        let fx = fixture();
        let hash = create(&fx.wiki, "Home", "old body").await;
        fx.backend.set_latency(Duration::from_millis(20));

        let (edited, published) = tokio::join!(
            fx.wiki.edit_page("Home", &hash, "bob", "NEW body"),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                fx.wiki.set_public(&hash, true).await
            }
        );
        fx.backend.set_latency(Duration::ZERO);

        assert!(!edited.unwrap().public);
        assert_eq!(published.unwrap(), PublishOutcome::Published);

        let page = latest_page(&fx.wiki, &hash).await;
        assert_eq!(page.body, "NEW body");
        assert!(page.public);
        let html = artifact_body(&fx.backend, &hash).await.unwrap();
        assert!(html.contains("NEW body"));
        fx.stop().await;
    }

    #[tokio::test]
    async fn upload_during_publish_gets_public_acl() {
        let fx = fixture();
        let hash = create(&fx.wiki, "Home", "body").await;
        fx.backend.set_latency(Duration::from_millis(20));

        let (published, uploaded) = tokio::join!(fx.wiki.set_public(&hash, true), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            fx.wiki
                .upload_file(&hash, "a.png", "image/png", vec![1, 2, 3])
                .await
        });
        fx.backend.set_latency(Duration::ZERO);

        published.unwrap();
        uploaded.unwrap();
        assert_eq!(
            fx.backend.acl_of(BUCKET, &ObjectKeys::page_file(&hash, "a.png")),
            Some(Acl::PublicRead)
        );
        fx.stop().await;
    }

    #[tokio::test]
    async fn viewing_pages_records_breadcrumbs() {
        let fx = fixture();
        let session = fx.wiki.auth().issue_challenge().await.unwrap().session_id;
        let mut hashes = Vec::new();
        for title in ["A", "B", "C"] {
            hashes.push(create(&fx.wiki, title, "body").await);
        }
        for idx in [0, 1, 2, 0] {
            fx.wiki
                .view_page(Some(&session), &hashes[idx], None)
                .await
                .unwrap();
        }

        let titles: Vec<String> = fx
            .wiki
            .breadcrumbs(&session)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["B", "C", "A"]);
        fx.stop().await;
    }

    #[tokio::test]
    async fn history_lists_versions_newest_first() {
        let fx = fixture();
        let hash = create(&fx.wiki, "Home", "v1").await;
        let second = fx.wiki.edit_page("Home", &hash, "alice", "v2").await.unwrap();

        let history = fx.wiki.page_history(&hash).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(Some(&history[0].version_id), second.version_id.as_ref());

        let old = fx
            .wiki
            .view_page(None, &hash, Some(&history[1].version_id))
            .await
            .unwrap();
        assert_eq!(old.body, "v1");
        fx.stop().await;
    }

    #[tokio::test]
    async fn uploads_follow_page_visibility() {
        let fx = fixture();
        let hash = create(&fx.wiki, "Home", "x").await;

        fx.wiki
            .upload_file(&hash, "private.txt", "text/plain", b"a".to_vec())
            .await
            .unwrap();
        fx.wiki.set_public(&hash, true).await.unwrap();
        fx.wiki
            .upload_file(&hash, "public.txt", "text/plain", b"b".to_vec())
            .await
            .unwrap();

        assert_eq!(
            fx.backend.acl_of(BUCKET, &ObjectKeys::page_file(&hash, "private.txt")),
            Some(Acl::PublicRead)
        );
        assert_eq!(
            fx.backend.acl_of(BUCKET, &ObjectKeys::page_file(&hash, "public.txt")),
            Some(Acl::PublicRead)
        );
        assert!(fx.wiki.is_public(&hash).await.unwrap());

        let missing = fx
            .wiki
            .upload_file("nope", "a.txt", "text/plain", Vec::new())
            .await
            .unwrap_err();
        assert!(missing.is_not_found());
        assert!(matches!(
            fx.wiki.upload_file(&hash, "../x", "text/plain", Vec::new()).await,
            Err(WikiError::InvalidInput(_))
        ));
        fx.stop().await;
    }

    #[tokio::test]
    async fn delete_removes_everything_of_the_page() {
        let fx = fixture();
        let hash = create(&fx.wiki, "Home", "x").await;
        fx.wiki
            .upload_file(&hash, "a.png", "image/png", vec![1])
            .await
            .unwrap();
        fx.wiki.set_public(&hash, true).await.unwrap();

        fx.wiki.delete_page(&hash).await.unwrap();

        assert!(!fx.backend.contains(BUCKET, &ObjectKeys::page_markdown(&hash)));
        assert!(!fx.backend.contains(BUCKET, &ObjectKeys::page_html(&hash)));
        assert!(!fx.backend.contains(BUCKET, &ObjectKeys::page_file(&hash, "a.png")));
        assert!(fx.wiki.view_page(None, &hash, None).await.unwrap_err().is_not_found());
        assert!(!fx.wiki.is_public(&hash).await.unwrap());
        fx.stop().await;
    }

    #[tokio::test]
    async fn lists_pages_by_hash() {
        let fx = fixture();
        let mut expected = vec![
            create(&fx.wiki, "One", "1").await,
            create(&fx.wiki, "Two", "2").await,
        ];
        expected.sort();

        let list = fx.wiki.list_pages().await.unwrap();
        assert_eq!(list.title_hashes, expected);
        assert!(!list.truncated);
        fx.stop().await;
    }

    #[tokio::test]
    async fn public_url_uses_bucket_website() {
        let fx = fixture();
        assert_eq!(
            fx.wiki.public_url("abc"),
            "http://wikibucket.s3-website-ap-northeast-1.amazonaws.com/page/abc"
        );
        fx.stop().await;
    }
}
