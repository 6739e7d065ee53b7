// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server-side sessions, stored at `session/{id}` as JSON (`text/plain`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::storage::bare::BareObject;
use crate::storage::codec::{
    decode_json, encode_json, expect_content_type, Decode, Encode, RecordKind, SchemaError,
};
use crate::storage::paths::ObjectKeys;

pub const SESSION_CONTENT_TYPE: &str = "text/plain";

/// Maximum number of recently viewed pages kept per session.
pub const MAX_BREADCRUMBS: usize = 5;

/// A recently viewed page. Serialized as a `[title, title_hash]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Breadcrumb {
    pub title: String,
    pub title_hash: String,
}

impl From<(String, String)> for Breadcrumb {
    fn from((title, title_hash): (String, String)) -> Self {
        Self { title, title_hash }
    }
}

impl From<Breadcrumb> for (String, String) {
    fn from(crumb: Breadcrumb) -> Self {
        (crumb.title, crumb.title_hash)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "id")]
    pub session_id: String,
    /// Pending single-use login challenge.
    #[serde(
        rename = "challenge",
        alias = "challange",
        default,
        deserialize_with = "empty_as_none"
    )]
    pub challenge: Option<String>,
    #[serde(rename = "user", default, deserialize_with = "empty_as_none")]
    pub username: Option<String>,
    #[serde(rename = "login", default)]
    pub authenticated: bool,
    #[serde(rename = "breadcrumb", default)]
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Sessions written without a timestamp count as expired.
    #[serde(default = "epoch")]
    pub issued_at: DateTime<Utc>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            challenge: None,
            username: None,
            authenticated: false,
            breadcrumbs: Vec::new(),
            issued_at: Utc::now(),
        }
    }

    /// Record a page view. Re-visiting moves the page to the end; the list
    /// is capped at [`MAX_BREADCRUMBS`], oldest dropped first.
    pub fn push_breadcrumb(&mut self, title: impl Into<String>, title_hash: impl Into<String>) {
        let crumb = Breadcrumb {
            title: title.into(),
            title_hash: title_hash.into(),
        };
        self.breadcrumbs
            .retain(|existing| existing.title_hash != crumb.title_hash);
        self.breadcrumbs.push(crumb);
        if self.breadcrumbs.len() > MAX_BREADCRUMBS {
            let excess = self.breadcrumbs.len() - MAX_BREADCRUMBS;
            self.breadcrumbs.drain(..excess);
        }
    }

    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.issued_at) > ttl
    }
}

impl Encode for SessionRecord {
    type Key = String;
    const KIND: RecordKind = RecordKind::Session;

    fn cache_key(&self) -> String {
        self.session_id.clone()
    }

    fn object_key(key: &String) -> String {
        ObjectKeys::session(key)
    }

    fn encode(&self) -> Result<BareObject, SchemaError> {
        let key = ObjectKeys::session(&self.session_id);
        let body = encode_json(&key, self)?;
        Ok(BareObject::new(key, SESSION_CONTENT_TYPE, body))
    }
}

impl Decode for SessionRecord {
    fn decode(key: &String, object: BareObject) -> Result<Self, SchemaError> {
        expect_content_type(&object, SESSION_CONTENT_TYPE)?;
        let mut session: SessionRecord = decode_json(&object)?;
        if session.session_id.is_empty() {
            session.session_id = key.clone();
        }
        Ok(session)
    }
}
