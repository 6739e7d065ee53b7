// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge-response login and session lifecycle.
//!
//! ## Login
//!
//! 1. `issue_challenge` creates a fresh session holding a random challenge
//! 2. The client answers with `hex(SHA256(secret || challenge))`
//! 3. `verify_login` consumes the challenge, checks the answer in constant
//!    time and, on success, replaces the session with a new authenticated
//!    one under a new id
//!
//! Unknown users are checked against an empty secret and rejected with the
//! same error as a wrong answer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ring::rand::SystemRandom;
use tracing::{debug, info, warn};
use url::Url;

use super::error::AuthError;
use super::proof::{expected_proof, proof_matches, random_token};
use super::social::SocialProvider;
use crate::storage::{CacheStack, SessionRecord, UserRecord};

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A newly issued login challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub session_id: String,
    pub challenge: String,
}

pub struct Authenticator {
    stack: Arc<CacheStack>,
    rng: SystemRandom,
    session_ttl: chrono::Duration,
}

impl Authenticator {
    pub fn new(stack: Arc<CacheStack>, session_ttl: Duration) -> Self {
        Self {
            stack,
            rng: SystemRandom::new(),
            session_ttl: chrono::Duration::from_std(session_ttl)
                .unwrap_or_else(|_| chrono::Duration::days(1)),
        }
    }

    /// Start a login: new session with a pending challenge.
    pub async fn issue_challenge(&self) -> Result<Challenge, AuthError> {
        let mut session = SessionRecord::new(random_token(&self.rng)?);
        let challenge = random_token(&self.rng)?;
        session.challenge = Some(challenge.clone());
        let session = self.stack.save(session).await?;
        debug!(session_id = %session.session_id, "Issued login challenge");
        Ok(Challenge {
            session_id: session.session_id,
            challenge,
        })
    }

    /// Check a login answer. Returns the new authenticated session; the
    /// session passed in is deleted.
    pub async fn verify_login(
        &self,
        username: &str,
        answer: &str,
        session_id: &str,
    ) -> Result<SessionRecord, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::InvalidInput("username is required".to_string()));
        }

        let mut session = self.load_session(session_id, AuthError::MissingChallenge).await?;
        if session.is_expired(self.session_ttl, Utc::now()) {
            self.discard_session(session_id).await;
            return Err(AuthError::SessionExpired);
        }
        let Some(challenge) = session.challenge.take() else {
            return Err(AuthError::MissingChallenge);
        };
        // Single use: the challenge is gone whatever the outcome.
        self.stack.save(session).await?;

        let user = match self.stack.load::<UserRecord>(&username.to_string()).await {
            Ok(user) => Some(user),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let secret = user.as_ref().map(|u| u.secret.as_str()).unwrap_or_default();
        let matched = proof_matches(&expected_proof(secret, &challenge), answer);
        if !matched || user.is_none() {
            warn!(session_id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let fresh = self.open_session(username).await?;
        self.discard_session(session_id).await;
        info!(username, "User logged in");
        Ok(fresh)
    }

    /// Resolve the logged-in session for a request.
    pub async fn authenticate(&self, session_id: &str) -> Result<SessionRecord, AuthError> {
        let session = self.load_session(session_id, AuthError::Unauthenticated).await?;
        if session.is_expired(self.session_ttl, Utc::now()) {
            return Err(AuthError::SessionExpired);
        }
        if !session.authenticated || session.username.is_none() {
            return Err(AuthError::Unauthenticated);
        }
        Ok(session)
    }

    /// Forget the user and breadcrumbs of a session. Unknown sessions are
    /// already logged out.
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        let mut session = match self.stack.load::<SessionRecord>(&session_id.to_string()).await {
            Ok(session) => session,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        session.username = None;
        session.authenticated = false;
        session.breadcrumbs.clear();
        self.stack.save(session).await?;
        info!(session_id, "Session logged out");
        Ok(())
    }

    /// Create a local account. Fails if the name is taken.
    pub async fn signup(&self, username: &str, secret: &str) -> Result<UserRecord, AuthError> {
        let username = username.trim();
        validate_username(username)?;
        if secret.is_empty() {
            return Err(AuthError::InvalidInput("secret is required".to_string()));
        }

        match self.stack.load::<UserRecord>(&username.to_string()).await {
            Ok(_) => return Err(AuthError::UserExists),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let user = self.stack.save(UserRecord::local(username, secret)).await?;
        info!(username, "User signed up");
        Ok(user)
    }

    pub async fn begin_social_login(&self, provider: &dyn SocialProvider) -> Result<Url, AuthError> {
        provider.begin_auth().await
    }

    /// Store the provider identity as a user and open a session for it.
    pub async fn complete_social_login(
        &self,
        provider: &dyn SocialProvider,
        callback: &HashMap<String, String>,
    ) -> Result<SessionRecord, AuthError> {
        let identity = provider.complete_auth(callback).await?;
        let user = UserRecord {
            username: identity.qualified_id(),
            name: identity.name,
            auth_type: identity.provider,
            token: identity.token,
            secret: identity.secret,
        };
        let user = self.stack.save(user).await?;
        let session = self.open_session(&user.username).await?;
        info!(username = %user.username, provider = provider.name(), "Social login completed");
        Ok(session)
    }

    async fn open_session(&self, username: &str) -> Result<SessionRecord, AuthError> {
        let mut session = SessionRecord::new(random_token(&self.rng)?);
        session.username = Some(username.to_string());
        session.authenticated = true;
        Ok(self.stack.save(session).await?)
    }

    async fn load_session(&self, session_id: &str, absent: AuthError) -> Result<SessionRecord, AuthError> {
        if session_id.is_empty() {
            return Err(absent);
        }
        match self.stack.load::<SessionRecord>(&session_id.to_string()).await {
            Ok(session) => Ok(session),
            Err(e) if e.is_not_found() => Err(absent),
            Err(e) => Err(e.into()),
        }
    }

    async fn discard_session(&self, session_id: &str) {
        if let Err(e) = self
            .stack
            .delete::<SessionRecord>(&session_id.to_string())
            .await
        {
            warn!(session_id, error = %e, "Failed to delete replaced session");
        }
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::InvalidInput("username is required".to_string()));
    }
    if username.contains('/') || username.chars().any(char::is_control) {
        return Err(AuthError::InvalidInput(
            "username contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::social::SocialIdentity;
    use crate::storage::{BareStore, CacheCapacities, MemoryObjectStore, StoreOp};
    use async_trait::async_trait;

    const KNOWN_PROOF: &str = "3b68f45ee60b150837dd6af3b5023bbb55c561b8603563bc3a134a5c569d09a5";

    fn authenticator() -> (Arc<MemoryObjectStore>, Arc<CacheStack>, Authenticator) {
        let backend = Arc::new(MemoryObjectStore::new());
        let stack = Arc::new(CacheStack::new(
            BareStore::new(backend.clone(), "wiki"),
            CacheCapacities::default(),
        ));
        let auth = Authenticator::new(stack.clone(), DEFAULT_SESSION_TTL);
        (backend, stack, auth)
    }

    /// Session with a known challenge, as if issued earlier.
    async fn session_with_challenge(stack: &CacheStack, id: &str, challenge: &str) {
        let mut session = SessionRecord::new(id);
        session.challenge = Some(challenge.to_string());
        stack.save(session).await.unwrap();
    }

    #[tokio::test]
    async fn known_proof_logs_in_and_rotates_session() {
        let (backend, stack, auth) = authenticator();
        auth.signup("user", "secret").await.unwrap();
        session_with_challenge(&stack, "old-session", "challange").await;

        let session = auth
            .verify_login("user", KNOWN_PROOF, "old-session")
            .await
            .unwrap();

        assert!(session.authenticated);
        assert_eq!(session.username.as_deref(), Some("user"));
        assert_ne!(session.session_id, "old-session");
        assert_eq!(session.session_id.len(), 64);
        assert!(!backend.contains("wiki", "session/old-session"));
        assert!(auth.authenticate(&session.session_id).await.is_ok());
    }

    #[tokio::test]
    async fn wrong_proof_is_rejected() {
        let (_backend, stack, auth) = authenticator();
        auth.signup("user", "secret").await.unwrap();
        session_with_challenge(&stack, "s1", "challange").await;

        let err = auth
            .verify_login("user", &expected_proof("secret", "other"), "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn challenge_is_single_use() {
        let (_backend, stack, auth) = authenticator();
        auth.signup("user", "secret").await.unwrap();
        session_with_challenge(&stack, "s1", "challange").await;

        assert!(auth.verify_login("user", "nope", "s1").await.is_err());
        let err = auth
            .verify_login("user", KNOWN_PROOF, "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingChallenge));
    }

    #[tokio::test]
    async fn unknown_user_looks_like_wrong_answer() {
        let (_backend, stack, auth) = authenticator();
        session_with_challenge(&stack, "s1", "challange").await;

        let err = auth
            .verify_login("ghost", &expected_proof("", "challange"), "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn missing_session_means_missing_challenge() {
        let (_backend, _stack, auth) = authenticator();
        let err = auth
            .verify_login("user", KNOWN_PROOF, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingChallenge));
    }

    #[tokio::test]
    async fn expired_session_is_rejected() {
        let (_backend, stack, auth) = authenticator();
        let mut session = SessionRecord::new("stale");
        session.challenge = Some("challange".to_string());
        session.issued_at = Utc::now() - chrono::Duration::days(2);
        stack.save(session).await.unwrap();

        let err = auth
            .verify_login("user", KNOWN_PROOF, "stale")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::SessionExpired));
    }

    #[tokio::test]
    async fn issued_challenge_is_stored_on_fresh_session() {
        let (_backend, stack, auth) = authenticator();
        let issued = auth.issue_challenge().await.unwrap();
        assert_eq!(issued.challenge.len(), 64);

        let session: SessionRecord = stack.load(&issued.session_id).await.unwrap();
        assert_eq!(session.challenge.as_deref(), Some(issued.challenge.as_str()));
        assert!(!session.authenticated);

        auth.signup("user", "secret").await.unwrap();
        let answer = expected_proof("secret", &issued.challenge);
        assert!(auth
            .verify_login("user", &answer, &issued.session_id)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn store_failure_is_not_invalid_credentials() {
        let (backend, stack, auth) = authenticator();
        session_with_challenge(&stack, "s1", "challange").await;
        backend.fail_on(StoreOp::Get);

        let err = auth
            .verify_login("user", KNOWN_PROOF, "s1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
    }

    #[tokio::test]
    async fn signup_rejects_existing_and_invalid_names() {
        let (_backend, _stack, auth) = authenticator();
        auth.signup("alice", "pw").await.unwrap();
        assert!(matches!(
            auth.signup("alice", "other").await,
            Err(AuthError::UserExists)
        ));
        assert!(matches!(
            auth.signup("a/b", "pw").await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            auth.signup("bob", "").await,
            Err(AuthError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn logout_clears_user_and_breadcrumbs() {
        let (_backend, stack, auth) = authenticator();
        auth.signup("user", "secret").await.unwrap();
        session_with_challenge(&stack, "s1", "challange").await;
        let mut session = auth.verify_login("user", KNOWN_PROOF, "s1").await.unwrap();
        session.push_breadcrumb("Home", "h1");
        let session = stack.save(session).await.unwrap();

        auth.logout(&session.session_id).await.unwrap();

        let after: SessionRecord = stack.load(&session.session_id).await.unwrap();
        assert!(after.username.is_none());
        assert!(after.breadcrumbs.is_empty());
        assert!(matches!(
            auth.authenticate(&session.session_id).await,
            Err(AuthError::Unauthenticated)
        ));
        auth.logout("unknown").await.unwrap();
    }

    struct FakeProvider;

    #[async_trait]
    impl SocialProvider for FakeProvider {
        fn name(&self) -> &str {
            "twitter"
        }

        async fn begin_auth(&self) -> Result<Url, AuthError> {
            Url::parse("https://provider.example/authorize")
                .map_err(|e| AuthError::Internal(e.to_string()))
        }

        async fn complete_auth(
            &self,
            callback: &HashMap<String, String>,
        ) -> Result<SocialIdentity, AuthError> {
            let user_id = callback
                .get("user_id")
                .cloned()
                .ok_or(AuthError::Unauthenticated)?;
            Ok(SocialIdentity {
                provider: "twitter".to_string(),
                user_id,
                name: "Ann".to_string(),
                token: "tok".to_string(),
                secret: "sec".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn social_login_stores_qualified_user() {
        let (_backend, stack, auth) = authenticator();
        let url = auth.begin_social_login(&FakeProvider).await.unwrap();
        assert_eq!(url.host_str(), Some("provider.example"));

        let callback = HashMap::from([("user_id".to_string(), "42".to_string())]);
        let session = auth
            .complete_social_login(&FakeProvider, &callback)
            .await
            .unwrap();
        assert_eq!(session.username.as_deref(), Some("twitter42"));

        let user: UserRecord = stack.load(&"twitter42".to_string()).await.unwrap();
        assert_eq!(user.auth_type, "twitter");
        assert_eq!(user.token, "tok");

        assert!(matches!(
            auth.complete_social_login(&FakeProvider, &HashMap::new()).await,
            Err(AuthError::Unauthenticated)
        ));
    }
}
