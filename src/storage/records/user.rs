// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User accounts, stored at `user/{username}` as JSON (`text/plain`).

use serde::{Deserialize, Serialize};

use crate::storage::bare::BareObject;
use crate::storage::codec::{
    decode_json, encode_json, expect_content_type, Decode, Encode, RecordKind, SchemaError,
};
use crate::storage::paths::ObjectKeys;

pub const USER_CONTENT_TYPE: &str = "text/plain";

/// Auth type recorded for accounts created through signup.
pub const LOCAL_AUTH_TYPE: &str = "local";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Login name; provider-qualified for social accounts.
    #[serde(rename = "id")]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "authtype", default)]
    pub auth_type: String,
    #[serde(default)]
    pub token: String,
    /// Secret the login proof is derived from.
    #[serde(default)]
    pub secret: String,
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .field("name", &self.name)
            .field("auth_type", &self.auth_type)
            .field("token", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl UserRecord {
    pub fn local(username: impl Into<String>, secret: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            name: username.clone(),
            username,
            auth_type: LOCAL_AUTH_TYPE.to_string(),
            token: String::new(),
            secret: secret.into(),
        }
    }
}

impl Encode for UserRecord {
    type Key = String;
    const KIND: RecordKind = RecordKind::User;

    fn cache_key(&self) -> String {
        self.username.clone()
    }

    fn object_key(key: &String) -> String {
        ObjectKeys::user(key)
    }

    fn encode(&self) -> Result<BareObject, SchemaError> {
        let key = ObjectKeys::user(&self.username);
        let body = encode_json(&key, self)?;
        Ok(BareObject::new(key, USER_CONTENT_TYPE, body))
    }
}

impl Decode for UserRecord {
    fn decode(key: &String, object: BareObject) -> Result<Self, SchemaError> {
        expect_content_type(&object, USER_CONTENT_TYPE)?;
        let mut user: UserRecord = decode_json(&object)?;
        // Older records were written without the id field.
        if user.username.is_empty() {
            user.username = key.clone();
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_stored_field_names() {
        let user = UserRecord::local("alice", "s3cret");
        let object = user.encode().unwrap();
        assert_eq!(object.key, "user/alice");
        assert_eq!(object.content_type, "text/plain");

        let json: serde_json::Value = serde_json::from_slice(&object.body).unwrap();
        assert_eq!(json["id"], "alice");
        assert_eq!(json["authtype"], "local");
        assert_eq!(json["secret"], "s3cret");
    }

    #[test]
    fn decode_fills_missing_id_from_key() {
        let object = BareObject::new(
            "user/bob",
            "text/plain",
            br#"{"id":"","name":"bob","secret":"x"}"#.to_vec(),
        );
        let user = UserRecord::decode(&"bob".to_string(), object).unwrap();
        assert_eq!(user.username, "bob");
        assert_eq!(user.secret, "x");
    }

    #[test]
    fn debug_redacts_secrets() {
        let user = UserRecord::local("alice", "hunter2");
        let debug = format!("{user:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
