// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Conversion between typed records and [`BareObject`]s.
//!
//! Every persisted record type implements [`Encode`]. Types that can be read
//! back also implement [`Decode`]; a type without it (the rendered HTML
//! artifact) simply cannot be passed to a loading call.

use std::fmt;
use std::hash::Hash;

use base64ct::{Base64, Encoding};
use serde::{de::DeserializeOwned, Serialize};

use super::bare::BareObject;
use super::object_store::PutReceipt;

/// Stored data that does not match its record schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("{key}: missing metadata field `{field}`")]
    MissingField { key: String, field: &'static str },

    #[error("{key}: invalid metadata field `{field}`: {reason}")]
    InvalidField {
        key: String,
        field: &'static str,
        reason: String,
    },

    #[error("{key}: expected content type `{expected}`, found `{found}`")]
    ContentType {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("{key}: malformed body: {reason}")]
    InvalidBody { key: String, reason: String },
}

/// Record families, one cache layer each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Page,
    Artifact,
    File,
    User,
    Session,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Page => "page",
            RecordKind::Artifact => "artifact",
            RecordKind::File => "file",
            RecordKind::User => "user",
            RecordKind::Session => "session",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that can be written to the store.
pub trait Encode: Clone + Send + Sync + 'static {
    /// Identity of a record within its layer.
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    const KIND: RecordKind;

    /// Cache key this record is stored under when saved.
    fn cache_key(&self) -> Self::Key;

    /// Object store key for a record identity.
    fn object_key(key: &Self::Key) -> String;

    /// Store version addressed by `key`, `None` for the latest.
    fn version(_key: &Self::Key) -> Option<&str> {
        None
    }

    fn encode(&self) -> Result<BareObject, SchemaError>;

    /// Absorb store-assigned attributes after a successful put.
    fn on_stored(&mut self, _receipt: &PutReceipt) {}
}

/// A record that can be read back from the store.
pub trait Decode: Encode + Sized {
    fn decode(key: &Self::Key, object: BareObject) -> Result<Self, SchemaError>;
}

/// Check the media type of `object`, ignoring parameters such as charset.
pub fn expect_content_type(object: &BareObject, expected: &'static str) -> Result<(), SchemaError> {
    let media = object
        .content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim();
    if media.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(SchemaError::ContentType {
            key: object.key.clone(),
            expected,
            found: object.content_type.clone(),
        })
    }
}

/// Metadata value by name. Stores may lowercase user metadata names, so the
/// lookup falls back to a case-insensitive match.
pub fn optional_meta<'a>(object: &'a BareObject, field: &str) -> Option<&'a str> {
    object.meta(field).or_else(|| {
        object
            .metadata
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, value)| value.as_str())
    })
}

pub fn required_meta<'a>(object: &'a BareObject, field: &'static str) -> Result<&'a str, SchemaError> {
    optional_meta(object, field).ok_or_else(|| SchemaError::MissingField {
        key: object.key.clone(),
        field,
    })
}

/// Titles travel as standard base64 of their UTF-8 bytes.
pub fn encode_title(title: &str) -> String {
    Base64::encode_string(title.as_bytes())
}

pub fn decode_title(key: &str, field: &'static str, value: &str) -> Result<String, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidField {
        key: key.to_string(),
        field,
        reason,
    };
    let raw = Base64::decode_vec(value).map_err(|e| invalid(format!("not base64: {e}")))?;
    String::from_utf8(raw).map_err(|e| invalid(format!("not UTF-8: {e}")))
}

pub fn encode_json<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, SchemaError> {
    serde_json::to_vec(value).map_err(|e| SchemaError::InvalidBody {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub fn decode_json<T: DeserializeOwned>(object: &BareObject) -> Result<T, SchemaError> {
    serde_json::from_slice(&object.body).map_err(|e| SchemaError::InvalidBody {
        key: object.key.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_roundtrips_through_base64() {
        let encoded = encode_title("Grüße aus Köln");
        assert_eq!(decode_title("k", "Title", &encoded).unwrap(), "Grüße aus Köln");
        assert_eq!(encode_title("test"), "dGVzdA==");
    }

    #[test]
    fn non_base64_title_is_schema_error() {
        let err = decode_title("page/x/index.md", "Title", "***").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { field: "Title", .. }));
    }

    #[test]
    fn non_utf8_title_is_schema_error() {
        let encoded = Base64::encode_string(&[0xff, 0xfe]);
        assert!(decode_title("k", "Title", &encoded).is_err());
    }

    #[test]
    fn content_type_ignores_parameters() {
        let object = BareObject::new("user/a", "text/plain; charset=utf-8", Vec::new());
        assert!(expect_content_type(&object, "text/plain").is_ok());
        assert!(matches!(
            expect_content_type(&object, "text/html"),
            Err(SchemaError::ContentType { .. })
        ));
    }

    #[test]
    fn metadata_lookup_tolerates_lowercased_names() {
        let object = BareObject::new("k", "text/plain", Vec::new()).with_metadata("author", "bob");
        assert_eq!(required_meta(&object, "Author").unwrap(), "bob");
        assert!(matches!(
            required_meta(&object, "Title"),
            Err(SchemaError::MissingField { field: "Title", .. })
        ));
    }

    #[test]
    fn malformed_json_is_schema_error() {
        let object = BareObject::new("user/a", "text/plain", b"{not json".to_vec());
        let err = decode_json::<serde_json::Value>(&object).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidBody { .. }));
    }
}
