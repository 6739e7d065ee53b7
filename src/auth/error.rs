// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::storage::StorageError;

/// Where failed logins and unauthenticated requests are sent.
pub const LOGIN_PATH: &str = "/login";

/// Authentication error type.
///
/// Unknown users and wrong answers both surface as `InvalidCredentials`.
#[derive(Debug)]
pub enum AuthError {
    /// Unknown user or wrong proof
    InvalidCredentials,
    /// Session has no pending challenge (or does not exist)
    MissingChallenge,
    /// Session is not logged in
    Unauthenticated,
    /// Session is older than the configured lifetime
    SessionExpired,
    /// Signup for a name that is taken
    UserExists,
    /// Rejected form input
    InvalidInput(String),
    /// Object store failure
    Storage(StorageError),
    /// Internal error
    Internal(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::MissingChallenge => "missing_challenge",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::SessionExpired => "session_expired",
            AuthError::UserExists => "user_exists",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::Storage(_) => "storage_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Whether the user should be sent back to the login form.
    pub fn is_auth_failure(&self) -> bool {
        !matches!(self, AuthError::Storage(_) | AuthError::Internal(_))
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid username or answer"),
            AuthError::MissingChallenge => write!(f, "No login challenge is pending"),
            AuthError::Unauthenticated => write!(f, "Login required"),
            AuthError::SessionExpired => write!(f, "Session has expired"),
            AuthError::UserExists => write!(f, "User already exists"),
            AuthError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            AuthError::Storage(e) => write!(f, "Storage error: {e}"),
            AuthError::Internal(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for AuthError {
    fn from(e: StorageError) -> Self {
        AuthError::Storage(e)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_auth_failure() {
            return (StatusCode::FOUND, [(header::LOCATION, LOGIN_PATH)]).into_response();
        }
        error!(error = %self, code = self.error_code(), "Authentication backend failure");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}
