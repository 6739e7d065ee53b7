// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Markdown to sanitized HTML.
//!
//! The publisher only depends on [`MarkdownRenderer`]. The default
//! [`ComrakRenderer`] also turns `[[Page Title]]` into a link to the page.

use std::sync::{Arc, LazyLock};

use comrak::{format_html, parse_document, Arena, Options};
use regex::{Captures, Regex};
use url::Url;

static WIKI_LINK: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\[\[(.+?)\]\]"));

const LINK_BASE: &str = "http://wiki.invalid/page";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("markdown rendering failed: {0}")]
    Markdown(String),

    #[error("wiki link pattern is invalid: {0}")]
    Pattern(String),
}

/// Converts page source to HTML that is safe to publish.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;

    fn sanitize(&self, html: &str) -> String;

    /// Render and sanitize in one step.
    fn render_page(&self, markdown: &str) -> Result<String, RenderError> {
        let html = self.render(markdown)?;
        Ok(self.sanitize(&html))
    }
}

/// Maps a page title to the href its wiki links point at.
pub type LinkResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// `/page/{title}` with the title percent-encoded as one path segment.
pub fn default_page_href(title: &str) -> String {
    match Url::parse(LINK_BASE) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.push(title);
            }
            url.path().to_string()
        }
        Err(_) => format!("/page/{title}"),
    }
}

/// Rewrite `[[Title]]` into Markdown links using `resolve` for the target.
pub fn link_wiki_titles(markdown: &str, resolve: &dyn Fn(&str) -> String) -> Result<String, RenderError> {
    let pattern = WIKI_LINK
        .as_ref()
        .map_err(|e| RenderError::Pattern(e.to_string()))?;
    let linked = pattern.replace_all(markdown, |caps: &Captures<'_>| {
        let title = caps[1].trim();
        let text = title.replace('\\', "\\\\").replace('[', "\\[").replace(']', "\\]");
        format!("[{text}]({})", resolve(title))
    });
    Ok(linked.into_owned())
}

/// Comrak rendering with GitHub-flavoured extensions, cleaned by ammonia.
pub struct ComrakRenderer {
    options: Options<'static>,
    sanitizer: ammonia::Builder<'static>,
    resolve_link: LinkResolver,
}

impl Default for ComrakRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ComrakRenderer {
    pub fn new() -> Self {
        let mut options = Options::default();
        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;
        ext.footnotes = true;

        Self {
            options,
            sanitizer: ammonia::Builder::default(),
            resolve_link: Arc::new(default_page_href),
        }
    }

    /// Point wiki links somewhere other than `/page/{title}`.
    pub fn with_link_resolver(mut self, resolve: LinkResolver) -> Self {
        self.resolve_link = resolve;
        self
    }
}

impl MarkdownRenderer for ComrakRenderer {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let linked = link_wiki_titles(markdown, self.resolve_link.as_ref())?;
        let arena = Arena::new();
        let root = parse_document(&arena, &linked, &self.options);

        let mut html = String::new();
        format_html(root, &self.options, &mut html)
            .map_err(|err| RenderError::Markdown(err.to_string()))?;
        Ok(html)
    }

    fn sanitize(&self, html: &str) -> String {
        self.sanitizer.clean(html).to_string()
    }
}
