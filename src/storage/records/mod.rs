// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed records persisted in the wiki bucket.

pub mod artifact;
pub mod file;
pub mod page;
pub mod session;
pub mod user;

pub use artifact::RenderedArtifact;
pub use file::{FileKey, FileRecord};
pub use page::{title_hash, PageKey, PageRecord};
pub use session::{Breadcrumb, SessionRecord, MAX_BREADCRUMBS};
pub use user::UserRecord;
