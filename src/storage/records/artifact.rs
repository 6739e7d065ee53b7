// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Rendered public HTML of a page.
//!
//! Write-only: the type implements [`Encode`] but not `Decode`, so it can be
//! saved and deleted through the stack but never loaded back.

use crate::storage::bare::BareObject;
use crate::storage::codec::{encode_title, Encode, RecordKind, SchemaError};
use crate::storage::object_store::Acl;
use crate::storage::paths::ObjectKeys;

pub const HTML_CONTENT_TYPE: &str = "text/html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub title_hash: String,
    pub title: String,
    pub author: String,
    /// Sanitized HTML.
    pub html: String,
}

impl Encode for RenderedArtifact {
    type Key = String;
    const KIND: RecordKind = RecordKind::Artifact;

    fn cache_key(&self) -> String {
        self.title_hash.clone()
    }

    fn object_key(key: &String) -> String {
        ObjectKeys::page_html(key)
    }

    fn encode(&self) -> Result<BareObject, SchemaError> {
        Ok(BareObject::new(
            ObjectKeys::page_html(&self.title_hash),
            HTML_CONTENT_TYPE,
            self.html.clone().into_bytes(),
        )
        .with_metadata("Author", self.author.clone())
        .with_metadata("Title", encode_title(&self.title))
        .with_acl(Acl::PublicRead))
    }
}
