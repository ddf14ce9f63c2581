// src/sitemap/mod.rs
// =============================================================================
// This module turns a site into its list of canonical page URLs.
//
// How it works:
// 1. Ask Search Console which sitemaps are registered for the site
// 2. Fetch each sitemap document over plain HTTP
// 3. A <sitemapindex> lists more sitemaps - push them onto the queue
// 4. A <urlset> lists pages - collect their <loc> values
// 5. Repeat until the queue is empty
//
// Politeness:
// - Sitemaps are fetched one at a time with a small delay between requests
// - A sitemap that fails to fetch or parse is a warning, not a fatal error;
//   the pages from every other sitemap are still processed
//
// Rust concepts:
// - HashSet: To visit each sitemap once (index files can cross-reference)
// - VecDeque: Breadth-first traversal of nested sitemap indexes
// - scraper: html5ever is lenient enough to parse sitemap XML, so the same
//   Selector idiom that extracts <a href> works for <loc>
// =============================================================================

use crate::gsc::SearchConsole;
use anyhow::{anyhow, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};

// What one sitemap document contains after extraction
struct SitemapContents {
    /// <sitemapindex><sitemap><loc> entries - more sitemaps to visit
    nested_sitemaps: Vec<String>,
    /// <urlset><url><loc> entries - actual page URLs
    pages: Vec<String>,
}

// Enumerates all page URLs reachable from the site's registered sitemaps.
//
// Returns (sitemaps, pages):
//   sitemaps - the sitemap paths registered in Search Console (the caller
//              treats an empty list as fatal: nothing to do without them)
//   pages    - every page URL found, deduplicated, in first-seen order
pub async fn get_sitemap_pages(
    console: &SearchConsole,
    site_url: &str,
) -> Result<(Vec<String>, Vec<String>)> {
    let sitemaps = console.list_sitemaps(site_url).await?;

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    // Queue of sitemap documents to fetch, starting with the registered ones
    let mut queue: VecDeque<String> = sitemaps.iter().cloned().collect();

    // Track visited sitemaps: index files may reference each other
    let mut visited = HashSet::new();

    // Page URLs, deduplicated but order-preserving
    let mut seen_pages = HashSet::new();
    let mut pages = Vec::new();

    while let Some(sitemap_url) = queue.pop_front() {
        // Skip if already visited
        if !visited.insert(sitemap_url.clone()) {
            continue;
        }

        match fetch_sitemap(&client, &sitemap_url).await {
            Ok(xml) => {
                let contents = extract_locs(&xml);

                for nested in contents.nested_sitemaps {
                    if !visited.contains(&nested) {
                        queue.push_back(nested);
                    }
                }

                for page in contents.pages {
                    if seen_pages.insert(page.clone()) {
                        pages.push(page);
                    }
                }

                // Polite fetching: small delay between sitemap requests
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            Err(e) => {
                eprintln!("  Warning: failed to fetch sitemap {}: {}", sitemap_url, e);
            }
        }
    }

    Ok((sitemaps, pages))
}

// Fetches a sitemap document and returns its raw XML
async fn fetch_sitemap(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("HTTP {}", response.status()));
    }

    let xml = response.text().await?;
    Ok(xml)
}

// Extracts <loc> values from a sitemap document.
//
// Sitemap XML comes in two shapes:
//
//   <sitemapindex><sitemap><loc>https://.../part1.xml</loc></sitemap>...
//   <urlset><url><loc>https://.../page</loc></url>...
//
// html5ever parses either happily (unknown elements are just elements), so
// child-combinator selectors distinguish the two cases.
fn extract_locs(xml: &str) -> SitemapContents {
    let document = Html::parse_document(xml);

    // unwrap is fine: these selectors are compile-time constants
    let nested_selector = Selector::parse("sitemap > loc").unwrap();
    let page_selector = Selector::parse("url > loc").unwrap();

    SitemapContents {
        nested_sitemaps: document
            .select(&nested_selector)
            .filter_map(loc_text)
            .collect(),
        pages: document.select(&page_selector).filter_map(loc_text).collect(),
    }
}

// The trimmed text content of a <loc> element, or None if it's blank
fn loc_text(element: scraper::ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why a queue instead of recursion?
//    - Sitemap indexes can nest and even reference each other
//    - A VecDeque plus a visited HashSet handles arbitrary nesting without
//      stack depth worries and without fetching anything twice
//
// 2. Why is a failed sitemap only a warning?
//    - One unreachable sitemap shouldn't throw away the thousands of URLs
//      the other sitemaps contributed
//    - The fatal case (NO sitemaps registered at all) is decided by the
//      caller, which sees the full list
//
// 3. Why does an HTML parser work on XML?
//    - html5ever never rejects input; unknown elements like <urlset> are
//      simply elements, and nesting is preserved
//    - That makes CSS child selectors ("url > loc") a perfectly good way
//      to query sitemap documents
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_pages_from_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/</loc>
    <lastmod>2024-05-01</lastmod>
  </url>
  <url>
    <loc>https://example.com/about</loc>
  </url>
</urlset>"#;

        let contents = extract_locs(xml);
        assert_eq!(
            contents.pages,
            vec!["https://example.com/", "https://example.com/about"]
        );
        assert!(contents.nested_sitemaps.is_empty());
    }

    #[test]
    fn test_extract_nested_sitemaps_from_index() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap>
    <loc>https://example.com/sitemap-posts.xml</loc>
  </sitemap>
  <sitemap>
    <loc>https://example.com/sitemap-pages.xml</loc>
  </sitemap>
</sitemapindex>"#;

        let contents = extract_locs(xml);
        assert_eq!(
            contents.nested_sitemaps,
            vec![
                "https://example.com/sitemap-posts.xml",
                "https://example.com/sitemap-pages.xml"
            ]
        );
        assert!(contents.pages.is_empty());
    }

    #[test]
    fn test_extract_trims_whitespace_inside_loc() {
        let xml = r#"<urlset>
  <url>
    <loc>
      https://example.com/padded
    </loc>
  </url>
</urlset>"#;

        let contents = extract_locs(xml);
        assert_eq!(contents.pages, vec!["https://example.com/padded"]);
    }

    #[test]
    fn test_extract_ignores_unrelated_markup() {
        let contents = extract_locs("<html><body><p>This is not a sitemap</p></body></html>");
        assert!(contents.pages.is_empty());
        assert!(contents.nested_sitemaps.is_empty());
    }
}
