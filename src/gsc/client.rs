// src/gsc/client.rs
// =============================================================================
// This module talks to Google's APIs:
//
// - URL Inspection API: what does Google currently think of this URL?
// - Indexing API: has indexing been requested? request it now
// - Webmasters API: which sitemaps are registered for this site?
//
// The batch engine doesn't use this type directly - it depends on the
// SearchConsoleApi trait, so tests can run the engine against fakes with
// canned answers and call counters.
//
// Error philosophy (matters for the engine's failure semantics):
// - HTTP answers the API actually gave us become statuses: 403 -> Forbidden,
//   429 -> RateLimited, any other non-success -> Error. These are real
//   information about the URL/site and belong in the cache.
// - Transport failures (DNS, timeout, connection reset) are Err. The engine
//   catches those per URL and records the synthetic Error status itself.
//
// Rust concepts:
// - async-trait: async functions in a trait object-safe way
// - Nested serde structs: mirror just the JSON fields we care about
// =============================================================================

use super::PageStatus;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const INSPECT_ENDPOINT: &str = "https://searchconsole.googleapis.com/v1/urlInspection/index:inspect";
const METADATA_ENDPOINT: &str = "https://indexing.googleapis.com/v3/urlNotifications/metadata";
const PUBLISH_ENDPOINT: &str = "https://indexing.googleapis.com/v3/urlNotifications:publish";
const SITES_ENDPOINT: &str = "https://www.googleapis.com/webmasters/v3/sites";

// The external calls the batch engine makes per URL.
//
// Kept deliberately small: this is the seam between the engine and the
// outside world.
#[async_trait]
pub trait SearchConsoleApi {
    /// Current indexing status of one URL, as the inspection API reports it
    async fn page_indexing_status(&self, site_url: &str, url: &str) -> Result<PageStatus>;

    /// Raw HTTP status code of the publish-metadata lookup.
    /// 404 means "indexing was never requested for this URL".
    async fn publish_metadata(&self, url: &str) -> Result<u16>;

    /// Asks Google to (re)index the URL
    async fn request_indexing(&self, url: &str) -> Result<()>;
}

// The real client: one pooled HTTP client plus the bearer token.
pub struct SearchConsole {
    http: reqwest::Client,
    token: String,
}

impl SearchConsole {
    pub fn new(token: String) -> Result<Self> {
        // One client for the whole run (connection pooling), with a timeout
        // so a dead endpoint can't stall a batch forever
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;

        Ok(SearchConsole { http, token })
    }

    /// Lists the sitemap paths registered for the site in Search Console.
    ///
    /// An empty list is not an error here - the caller decides that a site
    /// without sitemaps is fatal.
    pub async fn list_sitemaps(&self, site_url: &str) -> Result<Vec<String>> {
        let endpoint = sitemaps_endpoint(site_url);
        let response = self
            .http
            .get(&endpoint)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("sitemap listing request failed")?;

        if !response.status().is_success() {
            bail!(
                "could not list sitemaps for {} (HTTP {})",
                site_url,
                response.status()
            );
        }

        let list: SitemapList = response
            .json()
            .await
            .context("sitemap listing returned an unexpected body")?;

        Ok(list
            .sitemap
            .into_iter()
            .filter_map(|entry| entry.path)
            .collect())
    }
}

#[async_trait]
impl SearchConsoleApi for SearchConsole {
    async fn page_indexing_status(&self, site_url: &str, url: &str) -> Result<PageStatus> {
        let body = json!({
            "inspectionUrl": url,
            "siteUrl": site_url,
        });

        let response = self
            .http
            .post(INSPECT_ENDPOINT)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("status lookup request failed for {}", url))?;

        // API-level answers become statuses, not errors (see module header)
        match response.status() {
            StatusCode::FORBIDDEN => {
                eprintln!("🔐 This service account doesn't have access to this site.");
                return Ok(PageStatus::Forbidden);
            }
            StatusCode::TOO_MANY_REQUESTS => return Ok(PageStatus::RateLimited),
            status if !status.is_success() => {
                eprintln!("❌ Failed to get indexing status of {} (HTTP {})", url, status);
                return Ok(PageStatus::Error);
            }
            _ => {}
        }

        let inspection: InspectResponse = response
            .json()
            .await
            .with_context(|| format!("inspection response for {} was unreadable", url))?;

        match inspection.coverage_state() {
            Some(state) => Ok(PageStatus::from(state.to_string())),
            None => {
                eprintln!("❌ Inspection result for {} had no coverage state", url);
                Ok(PageStatus::Error)
            }
        }
    }

    async fn publish_metadata(&self, url: &str) -> Result<u16> {
        let response = self
            .http
            .get(METADATA_ENDPOINT)
            .query(&[("url", url)])
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("publish metadata request failed for {}", url))?;

        Ok(response.status().as_u16())
    }

    async fn request_indexing(&self, url: &str) -> Result<()> {
        let body = json!({
            "url": url,
            "type": "URL_UPDATED",
        });

        let response = self
            .http
            .post(PUBLISH_ENDPOINT)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("indexing request failed for {}", url))?;

        if !response.status().is_success() {
            bail!(
                "indexing request for {} was rejected (HTTP {})",
                url,
                response.status()
            );
        }

        Ok(())
    }
}

// Builds the sitemap-listing endpoint for a site.
// The site identifier goes INTO the path, so every reserved character
// (: / and friends) must be percent-encoded.
fn sitemaps_endpoint(site_url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(site_url.as_bytes()).collect();
    format!("{}/{}/sitemaps", SITES_ENDPOINT, encoded)
}

// --- response bodies (only the fields we read) ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectResponse {
    inspection_result: Option<InspectionResult>,
}

impl InspectResponse {
    fn coverage_state(&self) -> Option<&str> {
        self.inspection_result
            .as_ref()?
            .index_status_result
            .as_ref()?
            .coverage_state
            .as_deref()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectionResult {
    index_status_result: Option<IndexStatusResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStatusResult {
    coverage_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SitemapList {
    #[serde(default)]
    sitemap: Vec<SitemapEntry>,
}

#[derive(Debug, Deserialize)]
struct SitemapEntry {
    path: Option<String>,
}
