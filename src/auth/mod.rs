// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Challenge-response login for wiki accounts, plus sessions and social
//! login.
//!
//! ## Auth Flow
//!
//! 1. Server issues a random challenge bound to a fresh session
//! 2. Client sends `hex(SHA256(secret || challenge))`, never the secret
//! 3. Server recomputes the proof from the stored secret and compares in
//!    constant time
//! 4. On success the session id is rotated and bound to the user
//!
//! ## Security
//!
//! - Challenges are single-use
//! - Unknown users and wrong answers are indistinguishable
//! - Sessions expire after `SESSION_TTL_SECS`
//! - Secrets never appear in `Debug` output

pub mod authenticator;
pub mod error;
pub mod proof;
pub mod social;

pub use authenticator::{Authenticator, Challenge, DEFAULT_SESSION_TTL};
pub use error::{AuthError, LOGIN_PATH};
pub use social::{SocialIdentity, SocialProvider};
