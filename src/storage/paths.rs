// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Object key layout for the wiki bucket.
//!
//! ```text
//! page/{title_hash}/index.md          # Markdown source (versioned)
//! page/{title_hash}/index.html        # Rendered artifact (public pages only)
//! page/{title_hash}/file/{filename}   # Attached files
//! user/{username}                     # Account record (JSON)
//! session/{session_id}                # Session record (JSON)
//! ```
//!
//! The layout is shared with previously written buckets and must not change.

/// Top-level prefix for everything belonging to a page.
pub const PAGE_ROOT: &str = "page/";

/// Top-level prefix for user accounts.
pub const USER_ROOT: &str = "user/";

/// Top-level prefix for sessions.
pub const SESSION_ROOT: &str = "session/";

/// Delimiter used when listing "directories".
pub const DELIMITER: &str = "/";

/// Key builder for the wiki bucket layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectKeys;

impl ObjectKeys {
    // ========== Page Keys ==========

    /// Prefix shared by every object of one page.
    pub fn page_prefix(title_hash: &str) -> String {
        format!("{PAGE_ROOT}{title_hash}/")
    }

    /// Markdown source of a page.
    pub fn page_markdown(title_hash: &str) -> String {
        format!("{}index.md", Self::page_prefix(title_hash))
    }

    /// Rendered HTML artifact of a page.
    pub fn page_html(title_hash: &str) -> String {
        format!("{}index.html", Self::page_prefix(title_hash))
    }

    /// Prefix under which a page's attached files live.
    pub fn page_files_prefix(title_hash: &str) -> String {
        format!("{}file/", Self::page_prefix(title_hash))
    }

    /// A single attached file.
    pub fn page_file(title_hash: &str, filename: &str) -> String {
        format!("{}{filename}", Self::page_files_prefix(title_hash))
    }

    /// Extract the title hash from a `page/{hash}/` common prefix.
    pub fn title_hash_from_prefix(prefix: &str) -> Option<&str> {
        let hash = prefix.strip_prefix(PAGE_ROOT)?.trim_end_matches('/');
        if hash.is_empty() || hash.contains('/') {
            None
        } else {
            Some(hash)
        }
    }

    // ========== Account Keys ==========

    /// A user account.
    pub fn user(username: &str) -> String {
        format!("{USER_ROOT}{username}")
    }

    /// A session.
    pub fn session(session_id: &str) -> String {
        format!("{SESSION_ROOT}{session_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_keys_are_correct() {
        assert_eq!(ObjectKeys::page_prefix("abc"), "page/abc/");
        assert_eq!(ObjectKeys::page_markdown("abc"), "page/abc/index.md");
        assert_eq!(ObjectKeys::page_html("abc"), "page/abc/index.html");
        assert_eq!(ObjectKeys::page_files_prefix("abc"), "page/abc/file/");
        assert_eq!(
            ObjectKeys::page_file("abc", "diagram.png"),
            "page/abc/file/diagram.png"
        );
    }

    #[test]
    fn account_keys_are_correct() {
        assert_eq!(ObjectKeys::user("alice"), "user/alice");
        assert_eq!(ObjectKeys::session("s-123"), "session/s-123");
    }

    #[test]
    fn title_hash_from_common_prefix() {
        assert_eq!(ObjectKeys::title_hash_from_prefix("page/abc/"), Some("abc"));
        assert_eq!(ObjectKeys::title_hash_from_prefix("page/"), None);
        assert_eq!(ObjectKeys::title_hash_from_prefix("user/abc/"), None);
        assert_eq!(ObjectKeys::title_hash_from_prefix("page/a/b/"), None);
    }
}
