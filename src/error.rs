// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error responses.
//!
//! [`ApiError`] is the JSON error body used by the routes in [`crate::api`].
//! [`HandlerError`] is the error type for page handlers: the HTTP layer that
//! serves wiki pages lives outside this crate and returns it from handlers
//! built on [`crate::wiki::Wiki`], so every `WikiError` gets one mapping:
//!
//! | `WikiError` | Response |
//! |-------------|----------|
//! | not found | 404 |
//! | invalid input, title mismatch | 400 |
//! | user exists | 409 |
//! | publish queue full or closed | 503 |
//! | auth failure | 302 to `/login` |
//! | anything else | 500, details logged only |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::AuthError;
use crate::wiki::WikiError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Handler error: either a plain API error or an auth failure that
/// redirects to the login page.
#[derive(Debug)]
pub enum HandlerError {
    Api(ApiError),
    Auth(AuthError),
}

impl From<ApiError> for HandlerError {
    fn from(err: ApiError) -> Self {
        HandlerError::Api(err)
    }
}

impl From<WikiError> for HandlerError {
    fn from(err: WikiError) -> Self {
        if err.is_not_found() {
            return HandlerError::Api(ApiError::not_found("Not found"));
        }
        match err {
            WikiError::Auth(AuthError::UserExists) => {
                HandlerError::Api(ApiError::new(StatusCode::CONFLICT, "User already exists"))
            }
            WikiError::Auth(AuthError::InvalidInput(msg)) => {
                HandlerError::Api(ApiError::bad_request(msg))
            }
            WikiError::Auth(auth) => HandlerError::Auth(auth),
            WikiError::InvalidInput(msg) => HandlerError::Api(ApiError::bad_request(msg)),
            WikiError::TitleMismatch { .. } => HandlerError::Api(ApiError::bad_request(
                "Title does not match page id",
            )),
            WikiError::Queue(e) => {
                error!(error = %e, "Publish queue rejected job");
                HandlerError::Api(ApiError::unavailable("Publish queue is busy"))
            }
            other => {
                error!(error = %other, "Request failed");
                HandlerError::Api(ApiError::internal())
            }
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            HandlerError::Api(e) => e.into_response(),
            HandlerError::Auth(e) => e.into_response(),
        }
    }
}
