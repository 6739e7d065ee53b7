// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem-backed object store for local development.
//!
//! ## Layout
//!
//! ```text
//! {root}/{bucket}/{hex(key)[0..64]}/{hex(key)[64..128]}/.../
//!     head.json            # versions, delete marker, ACL
//!     {version_id}.bin     # body of one version
//! ```
//!
//! Keys are hex-encoded so that `a` and `a/b` can coexist without a
//! file/directory clash, and the hex is split into segments of at most
//! [`KEY_SEGMENT_HEX`] characters so long keys stay under file name limits.
//! Segments are pure hex and file names always contain a `.`, so an object
//! directory and the directories of longer keys never collide. Writes go to
//! a temp file first and are renamed into place. Blocking I/O runs on the
//! tokio blocking pool.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::bare::BareObject;
use super::object_store::{Acl, Listing, ObjectStore, ObjectVersion, PutReceipt};
use super::{StorageError, StorageResult};

const HEAD_FILE: &str = "head.json";

/// Hex characters per directory level.
pub const KEY_SEGMENT_HEX: usize = 64;

/// Relative directory of `key` under its bucket.
fn key_path(key: &str) -> PathBuf {
    let encoded = hex::encode(key.as_bytes());
    let mut path = PathBuf::new();
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (segment, tail) = rest.split_at(rest.len().min(KEY_SEGMENT_HEX));
        path.push(segment);
        rest = tail;
    }
    path
}

fn is_key_segment(name: &str) -> bool {
    !name.is_empty() && name.len() <= KEY_SEGMENT_HEX && name.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionHead {
    version_id: String,
    last_modified: DateTime<Utc>,
    content_type: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ObjectHead {
    /// Oldest first.
    versions: Vec<VersionHead>,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    acl: Acl,
}

impl ObjectHead {
    fn latest(&self) -> Option<&VersionHead> {
        if self.deleted {
            None
        } else {
            self.versions.last()
        }
    }
}

#[derive(Debug)]
struct FsInner {
    root: PathBuf,
    /// Serializes read-modify-write of head files.
    write_lock: Mutex<()>,
}

/// Object store persisted under a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    inner: Arc<FsInner>,
}

impl FsObjectStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            inner: Arc::new(FsInner {
                root,
                write_lock: Mutex::new(()),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    async fn blocking<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&FsInner) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| StorageError::backend(format!("filesystem task failed: {e}")))?
    }
}

impl FsInner {
    fn object_dir(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key_path(key))
    }

    fn read_head(&self, dir: &Path) -> StorageResult<Option<ObjectHead>> {
        match read_json(dir.join(HEAD_FILE)) {
            Ok(head) => Ok(Some(head)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn get(&self, bucket: &str, key: &str, version_id: Option<&str>) -> StorageResult<BareObject> {
        let dir = self.object_dir(bucket, key);
        let head = self
            .read_head(&dir)?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let version = match version_id {
            Some(id) => head.versions.iter().find(|v| v.version_id == id),
            None => head.latest(),
        }
        .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let body = fs::read(dir.join(format!("{}.bin", version.version_id)))?;
        Ok(BareObject {
            key: key.to_string(),
            content_type: version.content_type.clone(),
            body,
            metadata: version.metadata.clone(),
            acl: None,
            version_id: Some(version.version_id.clone()),
            last_modified: Some(version.last_modified),
        })
    }

    fn put(&self, bucket: &str, object: BareObject) -> StorageResult<PutReceipt> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = self.object_dir(bucket, &object.key);
        fs::create_dir_all(&dir)?;

        let receipt = PutReceipt {
            version_id: uuid::Uuid::new_v4().simple().to_string(),
            last_modified: Utc::now(),
        };
        write_raw(dir.join(format!("{}.bin", receipt.version_id)), &object.body)?;

        let mut head = self.read_head(&dir)?.unwrap_or_default();
        head.versions.push(VersionHead {
            version_id: receipt.version_id.clone(),
            last_modified: receipt.last_modified,
            content_type: object.content_type,
            metadata: object.metadata,
        });
        head.deleted = false;
        head.acl = object.acl.unwrap_or_default();
        write_json(dir.join(HEAD_FILE), &head)?;
        Ok(receipt)
    }

    fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = self.object_dir(bucket, key);
        if let Some(mut head) = self.read_head(&dir)? {
            head.deleted = true;
            write_json(dir.join(HEAD_FILE), &head)?;
        }
        Ok(())
    }

    fn list(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        max_keys: usize,
    ) -> StorageResult<Listing> {
        let bucket_dir = self.root.join(bucket);
        let mut keys = Vec::new();
        if bucket_dir.exists() {
            self.collect_keys(&bucket_dir, "", prefix, &mut keys)?;
        }
        keys.sort();

        let mut listing = Listing::default();
        let mut emitted = 0usize;
        for key in keys {
            let rest = &key[prefix.len()..];
            let grouped = delimiter
                .filter(|d| !d.is_empty())
                .and_then(|d| rest.find(d).map(|idx| format!("{prefix}{}", &rest[..idx + d.len()])));
            if let Some(common) = &grouped {
                if listing.common_prefixes.last() == Some(common) {
                    continue;
                }
            }
            if emitted == max_keys {
                listing.truncated = true;
                break;
            }
            match grouped {
                Some(common) => listing.common_prefixes.push(common),
                None => listing.keys.push(key),
            }
            emitted += 1;
        }
        Ok(listing)
    }

    /// Walk key segments below `dir`, collecting live keys under `prefix`.
    fn collect_keys(
        &self,
        dir: &Path,
        encoded: &str,
        prefix: &str,
        keys: &mut Vec<String>,
    ) -> StorageResult<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_key_segment(&name) {
                continue;
            }
            let encoded = format!("{encoded}{name}");
            let path = entry.path();
            let key = hex::decode(&encoded)
                .ok()
                .and_then(|raw| String::from_utf8(raw).ok());
            if let Some(key) = key {
                if key.starts_with(prefix)
                    && self
                        .read_head(&path)?
                        .is_some_and(|head| head.latest().is_some())
                {
                    keys.push(key);
                }
            }
            // Longer keys sharing this segment live further down.
            self.collect_keys(&path, &encoded, prefix, keys)?;
        }
        Ok(())
    }

    fn versions(&self, bucket: &str, key: &str) -> StorageResult<Vec<ObjectVersion>> {
        let Some(head) = self.read_head(&self.object_dir(bucket, key))? else {
            return Ok(Vec::new());
        };
        let newest = head.versions.len().saturating_sub(1);
        Ok(head
            .versions
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, v)| ObjectVersion {
                version_id: v.version_id.clone(),
                last_modified: v.last_modified,
                is_latest: idx == newest && !head.deleted,
            })
            .collect())
    }

    fn get_acl(&self, bucket: &str, key: &str) -> StorageResult<Acl> {
        self.read_head(&self.object_dir(bucket, key))?
            .filter(|head| head.latest().is_some())
            .map(|head| head.acl)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn set_acl(&self, bucket: &str, key: &str, acl: Acl) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let dir = self.object_dir(bucket, key);
        let mut head = self
            .read_head(&dir)?
            .filter(|head| head.latest().is_some())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        head.acl = acl;
        write_json(dir.join(HEAD_FILE), &head)
    }
}

/// Read a JSON file and deserialize it.
fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> StorageResult<T> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

/// Write a JSON file (atomic write via rename).
fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Write raw bytes (atomic write via rename).
fn write_raw(path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.flush()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> StorageResult<BareObject> {
        let (bucket, key, version_id) = (
            bucket.to_string(),
            key.to_string(),
            version_id.map(str::to_string),
        );
        self.blocking(move |fs| fs.get(&bucket, &key, version_id.as_deref()))
            .await
    }

    async fn put_object(&self, bucket: &str, object: BareObject) -> StorageResult<PutReceipt> {
        let bucket = bucket.to_string();
        self.blocking(move |fs| fs.put(&bucket, object)).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let (bucket, key) = (bucket.to_string(), key.to_string());
        self.blocking(move |fs| fs.delete(&bucket, &key)).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        max_keys: usize,
    ) -> StorageResult<Listing> {
        let (bucket, prefix, delimiter) = (
            bucket.to_string(),
            prefix.to_string(),
            delimiter.map(str::to_string),
        );
        self.blocking(move |fs| fs.list(&bucket, &prefix, delimiter.as_deref(), max_keys))
            .await
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<Vec<ObjectVersion>> {
        let (bucket, key) = (bucket.to_string(), key.to_string());
        self.blocking(move |fs| fs.versions(&bucket, &key)).await
    }

    async fn get_object_acl(&self, bucket: &str, key: &str) -> StorageResult<Acl> {
        let (bucket, key) = (bucket.to_string(), key.to_string());
        self.blocking(move |fs| fs.get_acl(&bucket, &key)).await
    }

    async fn put_object_acl(&self, bucket: &str, key: &str, acl: Acl) -> StorageResult<()> {
        let (bucket, key) = (bucket.to_string(), key.to_string());
        self.blocking(move |fs| fs.set_acl(&bucket, &key, acl)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "wiki";

    fn test_store() -> (tempfile::TempDir, FsObjectStore) {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = FsObjectStore::open(dir.path()).expect("Failed to open store");
        (dir, store)
    }

    #[tokio::test]
    async fn put_and_get_roundtrip_preserves_metadata() {
        let (_dir, store) = test_store();
        let object = BareObject::new("page/abc/index.md", "text/x-markdown", b"# Hi".to_vec())
            .with_metadata("Author", "alice");

        let receipt = store.put_object(BUCKET, object).await.unwrap();
        let read = store
            .get_object(BUCKET, "page/abc/index.md", None)
            .await
            .unwrap();

        assert_eq!(read.body, b"# Hi");
        assert_eq!(read.content_type, "text/x-markdown");
        assert_eq!(read.meta("Author"), Some("alice"));
        assert_eq!(read.version_id.as_deref(), Some(receipt.version_id.as_str()));
    }

    #[tokio::test]
    async fn nested_keys_do_not_clash() {
        let (_dir, store) = test_store();
        store
            .put_object(BUCKET, BareObject::new("a", "text/plain", b"1".to_vec()))
            .await
            .unwrap();
        store
            .put_object(BUCKET, BareObject::new("a/b", "text/plain", b"2".to_vec()))
            .await
            .unwrap();

        assert_eq!(store.get_object(BUCKET, "a", None).await.unwrap().body, b"1");
        assert_eq!(store.get_object(BUCKET, "a/b", None).await.unwrap().body, b"2");
    }

    #[tokio::test]
    async fn long_keys_are_split_into_segments() {
        let (dir, store) = test_store();
        let short = format!("page/h1/file/{}", "x".repeat(19));
        let long = format!("page/h1/file/{}", "x".repeat(200));
        for key in [&short, &long] {
            store
                .put_object(BUCKET, BareObject::new(key.as_str(), "text/plain", key.as_bytes().to_vec()))
                .await
                .unwrap();
        }

        let read = store.get_object(BUCKET, &long, None).await.unwrap();
        assert_eq!(read.body, long.as_bytes());
        assert!(dir.path().join(BUCKET).join(key_path(&long)).join(HEAD_FILE).exists());
        assert!(key_path(&long)
            .components()
            .all(|c| c.as_os_str().len() <= KEY_SEGMENT_HEX));

        let listing = store
            .list_objects(BUCKET, "page/h1/file/", None, 30)
            .await
            .unwrap();
        assert_eq!(listing.keys, vec![short.clone(), long.clone()]);
    }

    #[tokio::test]
    async fn delete_hides_latest_but_keeps_history() {
        let (_dir, store) = test_store();
        let receipt = store
            .put_object(BUCKET, BareObject::new("user/bob", "text/plain", b"{}".to_vec()))
            .await
            .unwrap();
        store.delete_object(BUCKET, "user/bob").await.unwrap();

        assert!(store
            .get_object(BUCKET, "user/bob", None)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store
            .get_object(BUCKET, "user/bob", Some(&receipt.version_id))
            .await
            .is_ok());

        let versions = store.list_object_versions(BUCKET, "user/bob").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert!(!versions[0].is_latest);
    }

    #[tokio::test]
    async fn list_groups_pages_and_skips_deleted() {
        let (_dir, store) = test_store();
        for key in ["page/a/index.md", "page/b/index.md", "page/c/index.md"] {
            store
                .put_object(BUCKET, BareObject::new(key, "text/x-markdown", Vec::new()))
                .await
                .unwrap();
        }
        store.delete_object(BUCKET, "page/b/index.md").await.unwrap();

        let listing = store.list_objects(BUCKET, "page/", Some("/"), 30).await.unwrap();
        assert_eq!(listing.common_prefixes, vec!["page/a/", "page/c/"]);

        let bounded = store.list_objects(BUCKET, "page/", Some("/"), 1).await.unwrap();
        assert_eq!(bounded.common_prefixes, vec!["page/a/"]);
        assert!(bounded.truncated);
    }

    #[tokio::test]
    async fn acl_follows_put_and_set() {
        let (_dir, store) = test_store();
        store
            .put_object(
                BUCKET,
                BareObject::new("page/a/index.html", "text/html", Vec::new())
                    .with_acl(Acl::PublicRead),
            )
            .await
            .unwrap();
        assert_eq!(
            store.get_object_acl(BUCKET, "page/a/index.html").await.unwrap(),
            Acl::PublicRead
        );

        store
            .put_object_acl(BUCKET, "page/a/index.html", Acl::Private)
            .await
            .unwrap();
        assert_eq!(
            store.get_object_acl(BUCKET, "page/a/index.html").await.unwrap(),
            Acl::Private
        );
        assert!(store
            .put_object_acl(BUCKET, "missing", Acl::Private)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
