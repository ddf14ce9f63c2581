// src/gsc/mod.rs
// =============================================================================
// This module defines the Google Search Console vocabulary:
//
// - PageStatus: every indexing status we know how to handle, plus an
//   open-ended variant for statuses Google may add in the future
// - The "actionable" subset: statuses that mean "this URL could still be
//   indexed, re-verify it and maybe request indexing"
// - convert_to_site_url: normalizes CLI input into a Search Console
//   site identifier
//
// Submodule:
// - client: the HTTP client that talks to the Search Console / Indexing APIs
//
// Rust concepts:
// - Enums with data: Other(String) carries the raw label for unknown statuses
// - Trait implementations: From/Display to convert between enum and label
// - Serde attributes: round-trip the enum through its label string
// =============================================================================

pub mod client;

// Re-export the client types so callers can write `gsc::SearchConsole`
pub use client::{SearchConsole, SearchConsoleApi};

use serde::{Deserialize, Serialize};
use std::fmt;

// Represents the indexing status of a single URL.
//
// The closed variants cover every status the Search Console UI reports today
// plus the synthetic statuses our own client produces on API errors
// (Forbidden, RateLimited, Error). Anything else lands in Other(String) so a
// new status label from Google never breaks parsing - it just isn't
// actionable.
//
// #[serde(from/into = "String")] stores the enum in the cache file as the
// exact label string, e.g. "Submitted and indexed".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageStatus {
    /// "Submitted and indexed" - the happy end state
    SubmittedAndIndexed,
    /// "Duplicate without user-selected canonical"
    DuplicateWithoutCanonical,
    /// "Crawled - currently not indexed"
    CrawledNotIndexed,
    /// "Discovered - currently not indexed"
    DiscoveredNotIndexed,
    /// "Page with redirect"
    PageWithRedirect,
    /// "URL is unknown to Google" - never seen by the crawler
    UnknownToGoogle,
    /// Synthetic: the API answered 403 for this site
    Forbidden,
    /// Synthetic: the API answered 429, quota exhausted
    RateLimited,
    /// Synthetic: the status lookup failed in any other way
    Error,
    /// Any status label we don't have a variant for
    Other(String),
}

impl PageStatus {
    /// The exact status label as reported by (or to) Search Console
    pub fn label(&self) -> &str {
        match self {
            PageStatus::SubmittedAndIndexed => "Submitted and indexed",
            PageStatus::DuplicateWithoutCanonical => "Duplicate without user-selected canonical",
            PageStatus::CrawledNotIndexed => "Crawled - currently not indexed",
            PageStatus::DiscoveredNotIndexed => "Discovered - currently not indexed",
            PageStatus::PageWithRedirect => "Page with redirect",
            PageStatus::UnknownToGoogle => "URL is unknown to Google",
            PageStatus::Forbidden => "Forbidden",
            PageStatus::RateLimited => "RateLimited",
            PageStatus::Error => "Error",
            PageStatus::Other(label) => label,
        }
    }

    /// Whether this status is worth acting on.
    ///
    /// Actionable statuses are always re-verified (the cached answer can't be
    /// trusted for a URL that might get indexed any day) and, if still
    /// unresolved after the recheck, trigger an indexing request.
    ///
    /// RateLimited is deliberately NOT in this set: re-hammering the API
    /// right after a quota error would just burn the next run's quota too.
    /// It ages out via the normal cache TTL instead.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            PageStatus::DiscoveredNotIndexed
                | PageStatus::CrawledNotIndexed
                | PageStatus::UnknownToGoogle
                | PageStatus::Forbidden
                | PageStatus::Error
        )
    }

    /// A decorative emoji for terminal output. Cosmetic only.
    pub fn emoji(&self) -> &str {
        match self {
            PageStatus::SubmittedAndIndexed => "✅",
            PageStatus::DuplicateWithoutCanonical => "😵",
            PageStatus::CrawledNotIndexed | PageStatus::DiscoveredNotIndexed => "👀",
            PageStatus::PageWithRedirect => "🔀",
            PageStatus::UnknownToGoogle => "❓",
            PageStatus::Forbidden => "🔐",
            PageStatus::RateLimited => "🚦",
            PageStatus::Error => "❌",
            PageStatus::Other(_) => "❌",
        }
    }
}

// Parse a raw label back into the enum.
// Unrecognized labels become Other(label) instead of failing.
impl From<String> for PageStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Submitted and indexed" => PageStatus::SubmittedAndIndexed,
            "Duplicate without user-selected canonical" => PageStatus::DuplicateWithoutCanonical,
            "Crawled - currently not indexed" => PageStatus::CrawledNotIndexed,
            "Discovered - currently not indexed" => PageStatus::DiscoveredNotIndexed,
            "Page with redirect" => PageStatus::PageWithRedirect,
            "URL is unknown to Google" => PageStatus::UnknownToGoogle,
            "Forbidden" => PageStatus::Forbidden,
            "RateLimited" => PageStatus::RateLimited,
            "Error" => PageStatus::Error,
            _ => PageStatus::Other(label),
        }
    }
}

impl From<PageStatus> for String {
    fn from(status: PageStatus) -> Self {
        status.label().to_string()
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Converts CLI input into a Search Console site identifier.
//
// Search Console knows two kinds of properties:
// - URL-prefix properties: "https://example.com/" (trailing slash required)
// - Domain properties: "sc-domain:example.com"
//
// So a full URL keeps its scheme and gains a trailing slash if missing,
// and a bare domain becomes an sc-domain: property.
//
// Examples:
//   "https://example.com"  -> "https://example.com/"
//   "http://example.com/"  -> "http://example.com/"
//   "example.com"          -> "sc-domain:example.com"
pub fn convert_to_site_url(input: &str) -> String {
    if input.starts_with("http://") || input.starts_with("https://") {
        if input.ends_with('/') {
            input.to_string()
        } else {
            format!("{}/", input)
        }
    } else {
        format!("sc-domain:{}", input)
    }
}
