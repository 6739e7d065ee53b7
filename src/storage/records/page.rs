// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Markdown page source.
//!
//! Stored at `page/{title_hash}/index.md` as `text/x-markdown` with the
//! metadata fields `Author`, `Title` (base64) and `Public`.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::storage::bare::BareObject;
use crate::storage::codec::{
    decode_title, encode_title, expect_content_type, optional_meta, required_meta, Decode, Encode,
    RecordKind, SchemaError,
};
use crate::storage::object_store::PutReceipt;
use crate::storage::paths::ObjectKeys;

pub const MARKDOWN_CONTENT_TYPE: &str = "text/x-markdown";

const META_AUTHOR: &str = "Author";
const META_TITLE: &str = "Title";
const META_PUBLIC: &str = "Public";

/// Salted storage identifier of a page title: `hex(SHA256(title || secret))`.
pub fn title_hash(title: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Identity of a page version. `version_id: None` addresses the latest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub title_hash: String,
    pub version_id: Option<String>,
}

impl PageKey {
    pub fn latest(title_hash: impl Into<String>) -> Self {
        Self {
            title_hash: title_hash.into(),
            version_id: None,
        }
    }

    pub fn at_version(title_hash: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            title_hash: title_hash.into(),
            version_id: Some(version_id.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub title_hash: String,
    /// Set by the store.
    pub version_id: Option<String>,
    pub title: String,
    pub author: String,
    /// Markdown source.
    pub body: String,
    /// Set by the store.
    pub last_modified: Option<DateTime<Utc>>,
    pub public: bool,
}

impl PageRecord {
    pub fn new(
        title_hash: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title_hash: title_hash.into(),
            version_id: None,
            title: title.into(),
            author: author.into(),
            body: body.into(),
            last_modified: None,
            public: false,
        }
    }
}

impl Encode for PageRecord {
    type Key = PageKey;
    const KIND: RecordKind = RecordKind::Page;

    /// Saving always produces the new latest version.
    fn cache_key(&self) -> PageKey {
        PageKey::latest(self.title_hash.clone())
    }

    fn object_key(key: &PageKey) -> String {
        ObjectKeys::page_markdown(&key.title_hash)
    }

    fn version(key: &PageKey) -> Option<&str> {
        key.version_id.as_deref()
    }

    fn encode(&self) -> Result<BareObject, SchemaError> {
        Ok(BareObject::new(
            ObjectKeys::page_markdown(&self.title_hash),
            MARKDOWN_CONTENT_TYPE,
            self.body.clone().into_bytes(),
        )
        .with_metadata(META_AUTHOR, self.author.clone())
        .with_metadata(META_TITLE, encode_title(&self.title))
        .with_metadata(META_PUBLIC, self.public.to_string()))
    }

    fn on_stored(&mut self, receipt: &PutReceipt) {
        self.version_id = Some(receipt.version_id.clone());
        self.last_modified = Some(receipt.last_modified);
    }
}

impl Decode for PageRecord {
    fn decode(key: &PageKey, object: BareObject) -> Result<Self, SchemaError> {
        expect_content_type(&object, MARKDOWN_CONTENT_TYPE)?;

        let title = decode_title(&object.key, META_TITLE, required_meta(&object, META_TITLE)?)?;
        let author = required_meta(&object, META_AUTHOR)?.to_string();
        // Pages written before the flag existed are private.
        let public = match optional_meta(&object, META_PUBLIC) {
            None => false,
            Some(raw) => raw.parse::<bool>().map_err(|_| SchemaError::InvalidField {
                key: object.key.clone(),
                field: META_PUBLIC,
                reason: format!("expected `true` or `false`, found `{raw}`"),
            })?,
        };
        let body = String::from_utf8(object.body).map_err(|e| SchemaError::InvalidBody {
            key: object.key.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            title_hash: key.title_hash.clone(),
            version_id: object.version_id.or_else(|| key.version_id.clone()),
            title,
            author,
            body,
            last_modified: object.last_modified,
            public,
        })
    }
}
