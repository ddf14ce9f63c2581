// src/cache/mod.rs
// =============================================================================
// This module persists what we already know about each URL, so repeated runs
// don't re-inspect URLs whose status is known-good and recent.
//
// On disk this is one JSON file per site under .cache/, a flat object:
//
//   {
//     "https://example.com/about": {
//       "status": "Submitted and indexed",
//       "lastCheckedAt": "2024-06-01T12:00:00Z"
//     },
//     ...
//   }
//
// Rules:
// - One file, one site. Entries are never merged across sites.
// - A missing file is simply an empty cache (first run).
// - A corrupt file is a hard error. Silently treating garbage as empty would
//   re-request indexing for everything and mask real status loss.
// - flush() writes a temp file and renames it over the target, so a crash
//   mid-write never leaves a half-written file that parses as valid.
//
// Rust concepts:
// - BTreeMap: sorted map, so the serialized file is deterministic
// - thiserror: typed errors, callers can tell Corrupt from plain I/O
// - Ownership: the cache is the only owner of its entries; the engine
//   proposes replacements through put()
// =============================================================================

use crate::gsc::PageStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// The last-known status of a single URL.
//
// Created on the first successful lookup, overwritten on every recheck,
// never deleted - a stale entry just stops being trusted (see the recheck
// policy) until a fresh lookup supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// The indexing status reported by (or synthesized from) the API
    pub status: PageStatus,
    /// When we last asked, ISO-8601 in the file
    #[serde(rename = "lastCheckedAt")]
    pub last_checked_at: DateTime<Utc>,
}

// Errors the cache can produce.
//
// Corrupt is separated out because the engine must fail loudly on it
// instead of guessing (see module header).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path} is corrupt: {source} (fix or delete the file and re-run)")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

// The in-memory status cache for one site, bound to its on-disk file.
#[derive(Debug)]
pub struct StatusCache {
    path: PathBuf,
    entries: BTreeMap<String, StatusRecord>,
}

impl StatusCache {
    // Loads the cache from disk.
    //
    // A missing file yields an empty cache. Anything unreadable or
    // unparseable is an error - never a silent empty cache.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let entries = match fs::read_to_string(path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        Ok(StatusCache {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Looks up the record for a URL, if we have one.
    pub fn get(&self, url: &str) -> Option<&StatusRecord> {
        self.entries.get(url)
    }

    /// Inserts or replaces the record for a URL. Last write wins.
    pub fn put(&mut self, url: String, record: StatusRecord) {
        self.entries.insert(url, record);
    }

    /// Number of cached URLs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Writes the whole cache to its file, atomically.
    //
    // Serializes to a sibling temp file first, then renames over the target.
    // rename() on the same filesystem either fully succeeds or leaves the
    // previous file untouched.
    pub fn flush(&self) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        // Matches the original file format: pretty-printed, 2-space indent
        let json = serde_json::to_string_pretty(&self.entries).expect("cache map serializes");

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }
}

// Derives the cache file name for a site.
//
// The site identifier contains characters that don't belong in file names
// (scheme separators, slashes), so they're folded into underscores:
//
//   "https://example.com/"      -> "https_example.com_.json"
//   "http://example.com/"       -> "http_example.com_.json"
//   "sc-domain:example.com"     -> "example.com.json"
pub fn cache_file_name(site_url: &str) -> String {
    let token = site_url
        .replace("http://", "http_")
        .replace("https://", "https_")
        .replace("sc-domain:", "")
        .replace('/', "_");
    format!("{}.json", token)
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why BTreeMap instead of HashMap?
//    - BTreeMap iterates its keys in sorted order
//    - So two flushes of the same logical state produce byte-identical
//      files, which makes diffs of .cache/ files actually readable
//
// 2. What makes the rename trick "atomic"?
//    - fs::rename within one filesystem replaces the target in a single
//      operation - readers see either the old complete file or the new
//      complete file, never a half-written one
//
// 3. Why is Corrupt its own error variant?
//    - The caller must be able to tell "no cache yet" (fine, start empty)
//      from "cache exists but is garbage" (stop! something is wrong)
//    - Folding both into an empty map would silently re-request indexing
//      for every URL of the site
// -----------------------------------------------------------------------------
