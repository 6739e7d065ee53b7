// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Social login provider seam.
//!
//! The OAuth dance itself lives behind [`SocialProvider`]; the wiki only
//! stores the identity it returns.

use std::collections::HashMap;

use async_trait::async_trait;
use url::Url;

use super::error::AuthError;

/// Identity returned by a provider after a successful callback.
#[derive(Clone, PartialEq, Eq)]
pub struct SocialIdentity {
    /// Provider name, e.g. `twitter`.
    pub provider: String,
    /// Provider-local user id.
    pub user_id: String,
    pub name: String,
    pub token: String,
    pub secret: String,
}

impl std::fmt::Debug for SocialIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialIdentity")
            .field("provider", &self.provider)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl SocialIdentity {
    /// Account name: provider name followed by the provider's user id.
    pub fn qualified_id(&self) -> String {
        format!("{}{}", self.provider, self.user_id)
    }
}

#[async_trait]
pub trait SocialProvider: Send + Sync {
    fn name(&self) -> &str;

    /// URL the user is redirected to in order to start the login.
    async fn begin_auth(&self) -> Result<Url, AuthError>;

    /// Exchange the callback query parameters for an identity.
    async fn complete_auth(&self, callback: &HashMap<String, String>) -> Result<SocialIdentity, AuthError>;
}
