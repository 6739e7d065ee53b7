// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Files attached to a page, stored at `page/{title_hash}/file/{filename}`
//! with their own content type.

use crate::storage::bare::BareObject;
use crate::storage::codec::{Decode, Encode, RecordKind, SchemaError};
use crate::storage::object_store::Acl;
use crate::storage::paths::ObjectKeys;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub title_hash: String,
    pub filename: String,
}

impl FileKey {
    pub fn new(title_hash: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            title_hash: title_hash.into(),
            filename: filename.into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub title_hash: String,
    pub filename: String,
    pub content_type: String,
    pub body: Vec<u8>,
    /// ACL to write with the object. Unknown on records read back.
    pub acl: Option<Acl>,
}

impl std::fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRecord")
            .field("title_hash", &self.title_hash)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.body.len())
            .field("acl", &self.acl)
            .finish()
    }
}

impl FileRecord {
    pub fn new(
        title_hash: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            title_hash: title_hash.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            body,
            acl: None,
        }
    }

    pub fn key(&self) -> FileKey {
        FileKey::new(self.title_hash.clone(), self.filename.clone())
    }
}

impl Encode for FileRecord {
    type Key = FileKey;
    const KIND: RecordKind = RecordKind::File;

    fn cache_key(&self) -> FileKey {
        self.key()
    }

    fn object_key(key: &FileKey) -> String {
        ObjectKeys::page_file(&key.title_hash, &key.filename)
    }

    fn encode(&self) -> Result<BareObject, SchemaError> {
        let mut object = BareObject::new(
            Self::object_key(&self.key()),
            self.content_type.clone(),
            self.body.clone(),
        );
        object.acl = self.acl;
        Ok(object)
    }
}

impl Decode for FileRecord {
    fn decode(key: &FileKey, object: BareObject) -> Result<Self, SchemaError> {
        if object.content_type.trim().is_empty() {
            return Err(SchemaError::InvalidField {
                key: object.key,
                field: "ContentType",
                reason: "empty".to_string(),
            });
        }
        Ok(Self {
            title_hash: key.title_hash.clone(),
            filename: key.filename.clone(),
            content_type: object.content_type,
            body: object.body,
            acl: None,
        })
    }
}
