// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! wikistore - Object-store backed wiki engine
//!
//! Pages, users, files and sessions are records in a remote key/value
//! object store, read and written through a per-type LRU cache stack.
//!
//! ## Modules
//!
//! - `storage` - Object store adapter, record codecs and the cache stack
//! - `render` - Markdown to sanitized HTML
//! - `publish` - Public artifacts and object ACLs, plus the worker pool
//! - `auth` - Challenge-response login, sessions and social login
//! - `wiki` - Page operations used by an HTTP layer
//! - `api` - Health endpoints (Axum)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod publish;
pub mod render;
pub mod state;
pub mod storage;
pub mod wiki;
