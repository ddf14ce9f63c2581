// src/engine/mod.rs
// =============================================================================
// This module is the heart of the tool: the batch engine that reconciles
// cached indexing statuses against the live API.
//
// For every URL it decides (via the recheck policy) whether the cached
// status is still trustworthy, looks it up again if not, and - when the
// status says the URL could still be indexed - checks whether an indexing
// request was ever submitted and submits one if it wasn't.
//
// Concurrency model:
// - URLs are processed in fixed-size batches
// - Within a batch, every URL runs concurrently (interleaved network I/O,
//   not threads - join_all on one task, no tokio::spawn)
// - The next batch does not start until the whole current batch settled,
//   which caps outbound concurrency at the batch size and gives a natural
//   checkpoint boundary: after every batch the caller's hook runs and
//   flushes the cache
//
// Cache discipline:
// - Tasks never touch the cache. Each task gets a clone of its own URL's
//   record up front and returns a proposed replacement; the orchestrator
//   writes all replacements back between batches. One writer, no races.
//
// Failure semantics:
// - A failed status lookup is recorded as the synthetic Error status (which
//   is actionable, so the URL gets re-verified next run) and never aborts
//   the batch or the run
// - Failed publish checks and indexing requests are logged warnings
//
// Submodule:
// - policy: the pure should-we-recheck decision
// =============================================================================

pub mod policy;

pub use policy::{default_ttl, should_recheck};

use crate::cache::{StatusCache, StatusRecord};
use crate::gsc::{PageStatus, SearchConsoleApi};
use chrono::{Duration, Utc};
use futures::future::join_all;

/// Final outcome for one URL. Only used for the end-of-run tally,
/// never persisted.
#[derive(Debug, Clone)]
pub struct UrlOutcome {
    pub url: String,
    pub status: PageStatus,
}

// What one per-URL task hands back to the orchestrator:
// the status for the tally, plus a replacement cache record if the task
// performed a fresh lookup.
struct TaskResult {
    url: String,
    status: PageStatus,
    refreshed: Option<StatusRecord>,
}

// Drives the whole URL set through the reconcile pipeline.
//
// Parameters:
//   api               - the external API (real client, or a fake in tests)
//   site_url          - the Search Console site identifier
//   urls              - every page URL to process
//   cache             - the site's status cache; mutated in place
//   concurrency       - batch size = max concurrent outbound requests
//   ttl               - staleness bound for cached statuses
//   on_batch_complete - checkpoint hook, called once per finished batch
//                       with (batch_index, batch_count, &cache); the caller
//                       flushes the cache here
//
// Returns one UrlOutcome per input URL, in input order.
pub async fn run<A, F>(
    api: &A,
    site_url: &str,
    urls: &[String],
    cache: &mut StatusCache,
    concurrency: usize,
    ttl: Duration,
    mut on_batch_complete: F,
) -> Vec<UrlOutcome>
where
    A: SearchConsoleApi,
    F: FnMut(usize, usize, &StatusCache),
{
    let concurrency = concurrency.max(1);
    let batch_count = urls.len().div_ceil(concurrency);
    let mut outcomes = Vec::with_capacity(urls.len());

    for (batch_index, batch) in urls.chunks(concurrency).enumerate() {
        // Snapshot each URL's cached record, then fan out. The futures own
        // their data; the cache itself stays with this function.
        let tasks: Vec<_> = batch
            .iter()
            .map(|url| {
                let cached = cache.get(url).cloned();
                process_url(api, site_url, url.clone(), cached, ttl)
            })
            .collect();

        // Join-before-advance: all tasks settle before the batch ends
        for result in join_all(tasks).await {
            if let Some(record) = result.refreshed {
                cache.put(result.url.clone(), record);
            }
            outcomes.push(UrlOutcome {
                url: result.url,
                status: result.status,
            });
        }

        on_batch_complete(batch_index, batch_count, cache);
    }

    outcomes
}

// Processes a single URL: policy-gated status lookup, then the
// indexing-request pipeline for actionable statuses.
async fn process_url<A: SearchConsoleApi>(
    api: &A,
    site_url: &str,
    url: String,
    cached: Option<StatusRecord>,
    ttl: Duration,
) -> TaskResult {
    let (status, refreshed) = match cached {
        // Cache hit that the policy still trusts: no network traffic at all
        Some(record) if !should_recheck(&record.status, record.last_checked_at, Utc::now(), ttl) => {
            (record.status, None)
        }

        // Cache miss, or the policy wants a fresh answer
        _ => {
            let status = match api.page_indexing_status(site_url, &url).await {
                Ok(status) => status,
                Err(e) => {
                    // Recorded as Error: actionable, so next run re-verifies
                    eprintln!("  Warning: status lookup failed for {}: {:#}", url, e);
                    PageStatus::Error
                }
            };
            let record = StatusRecord {
                status: status.clone(),
                last_checked_at: Utc::now(),
            };
            (status, Some(record))
        }
    };

    if status.is_actionable() {
        println!("📄 Processing URL for indexing: {}", url);
        request_indexing_if_needed(api, &url).await;
        println!();
    }

    TaskResult {
        url,
        status,
        refreshed,
    }
}

// Requests indexing for a URL unless Google already knows about a request.
//
// The publish-metadata lookup answers with a raw HTTP status code:
//   404   - never submitted, so submit now
//   < 400 - a request already exists, nothing to do
//   other - anomaly; warn and skip, never fatal
async fn request_indexing_if_needed<A: SearchConsoleApi>(api: &A, url: &str) {
    match api.publish_metadata(url).await {
        Ok(404) => match api.request_indexing(url).await {
            Ok(()) => println!(
                "🚀 Indexing requested successfully. It may take a few days for Google to process it."
            ),
            Err(e) => eprintln!("  Warning: indexing request failed for {}: {:#}", url, e),
        },
        Ok(code) if code < 400 => println!(
            "🕛 Indexing already requested previously. It may take a few days for Google to process it."
        ),
        Ok(code) => eprintln!(
            "  Warning: unexpected publish metadata answer for {} (HTTP {}), skipping",
            url, code
        ),
        Err(e) => eprintln!(
            "  Warning: publish metadata lookup failed for {}: {:#}",
            url, e
        ),
    }
}

// Groups final outcomes by status for the terminal summary.
//
// Statuses appear in first-seen order, and so do the URLs inside each
// group. Every outcome lands in exactly one group.
pub fn tally(results: &[UrlOutcome]) -> Vec<(PageStatus, Vec<String>)> {
    let mut groups: Vec<(PageStatus, Vec<String>)> = Vec::new();

    for outcome in results {
        match groups.iter_mut().find(|(status, _)| *status == outcome.status) {
            Some((_, urls)) => urls.push(outcome.url.clone()),
            None => groups.push((outcome.status.clone(), vec![outcome.url.clone()])),
        }
    }

    groups
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why join_all instead of buffer_unordered?
//    - buffer_unordered keeps N futures in flight continuously (a sliding
//      window) - great for throughput, but there's never a moment where
//      "everything so far is done"
//    - join_all waits for the whole batch, which is exactly the barrier we
//      need to checkpoint the cache safely
//
// 2. Why do tasks return records instead of writing to the cache?
//    - Two futures mutating one &mut StatusCache won't compile - Rust
//      enforces a single mutable owner
//    - Returning values and letting the orchestrator write them is the
//      borrow-checker-friendly version of "one writer, many readers"
//
// 3. What is FnMut in the on_batch_complete bound?
//    - A closure that may mutate its captured environment
//    - The caller's hook captures things like "flush failures so far",
//      so Fn (no mutation) would be too strict
//
// 4. What does chunks() do?
//    - Splits a slice into consecutive sub-slices of the given length
//    - The last chunk is simply shorter if the length doesn't divide evenly
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::cache_file_name;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;
    use std::sync::Mutex;

    // A scripted stand-in for the real API. Every call is recorded so tests
    // can assert on exactly what the engine did.
    #[derive(Default)]
    struct FakeApi {
        // What the status lookup answers per URL
        statuses: HashMap<String, PageStatus>,
        // URLs whose status lookup fails at the transport level
        failing_lookups: HashSet<String>,
        // What the publish-metadata lookup answers per URL (default 404)
        publish_codes: Mutex<HashMap<String, u16>>,

        lookups: Mutex<Vec<String>>,
        metadata_checks: Mutex<Vec<String>>,
        index_requests: Mutex<Vec<String>>,
    }

    impl FakeApi {
        fn with_statuses(pairs: &[(&str, PageStatus)]) -> Self {
            FakeApi {
                statuses: pairs
                    .iter()
                    .map(|(url, status)| (url.to_string(), status.clone()))
                    .collect(),
                ..FakeApi::default()
            }
        }

        fn lookup_count(&self) -> usize {
            self.lookups.lock().unwrap().len()
        }

        fn index_request_count(&self) -> usize {
            self.index_requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SearchConsoleApi for FakeApi {
        async fn page_indexing_status(&self, _site_url: &str, url: &str) -> Result<PageStatus> {
            self.lookups.lock().unwrap().push(url.to_string());
            if self.failing_lookups.contains(url) {
                bail!("connection reset by peer");
            }
            Ok(self
                .statuses
                .get(url)
                .cloned()
                .unwrap_or(PageStatus::UnknownToGoogle))
        }

        async fn publish_metadata(&self, url: &str) -> Result<u16> {
            self.metadata_checks.lock().unwrap().push(url.to_string());
            Ok(*self.publish_codes.lock().unwrap().get(url).unwrap_or(&404))
        }

        async fn request_indexing(&self, url: &str) -> Result<()> {
            self.index_requests.lock().unwrap().push(url.to_string());
            // From now on the metadata lookup reports "already requested",
            // like the real API does
            self.publish_codes
                .lock()
                .unwrap()
                .insert(url.to_string(), 200);
            Ok(())
        }
    }

    fn scratch_cache(dir: &tempfile::TempDir) -> (StatusCache, PathBuf) {
        let path = dir.path().join(cache_file_name("https://example.com/"));
        (StatusCache::load(&path).unwrap(), path)
    }

    fn urls(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn aged_record(status: PageStatus, days_old: i64) -> StatusRecord {
        StatusRecord {
            status,
            last_checked_at: Utc::now() - Duration::days(days_old),
        }
    }

    #[tokio::test]
    async fn test_every_url_visited_once_in_ceil_batches() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        let api = FakeApi::with_statuses(&[]);
        let pages = urls(&["u1", "u2", "u3", "u4", "u5", "u6", "u7"]);

        let mut checkpoints = Vec::new();
        let outcomes = run(
            &api,
            "https://example.com/",
            &pages,
            &mut cache,
            3,
            default_ttl(),
            |index, count, _cache| checkpoints.push((index, count)),
        )
        .await;

        // ceil(7 / 3) = 3 batches, in order
        assert_eq!(checkpoints, vec![(0, 3), (1, 3), (2, 3)]);

        // every URL exactly once, input order preserved
        let visited: Vec<&str> = outcomes.iter().map(|o| o.url.as_str()).collect();
        assert_eq!(visited, vec!["u1", "u2", "u3", "u4", "u5", "u6", "u7"]);
    }

    #[tokio::test]
    async fn test_checkpoint_persists_everything_processed_so_far() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, path) = scratch_cache(&dir);
        let api = FakeApi::with_statuses(&[
            ("a", PageStatus::SubmittedAndIndexed),
            ("b", PageStatus::SubmittedAndIndexed),
            ("c", PageStatus::SubmittedAndIndexed),
            ("d", PageStatus::SubmittedAndIndexed),
        ]);
        let pages = urls(&["a", "b", "c", "d"]);

        let mut after_first_batch = None;
        run(
            &api,
            "https://example.com/",
            &pages,
            &mut cache,
            2,
            default_ttl(),
            |index, _count, cache| {
                // the production hook's job: flush at every checkpoint
                cache.flush().unwrap();
                if index == 0 {
                    // what would a crash right now leave on disk?
                    let on_disk = StatusCache::load(&path).unwrap();
                    after_first_batch = Some((
                        on_disk.len(),
                        on_disk.get("a").is_some(),
                        on_disk.get("c").is_some(),
                    ));
                }
            },
        )
        .await;

        // After batch 0, exactly the first batch (a, b) was durable
        assert_eq!(after_first_batch, Some((2, true, false)));

        // After the run, everything is durable
        let on_disk = StatusCache::load(&path).unwrap();
        assert_eq!(on_disk.len(), 4);
    }

    #[tokio::test]
    async fn test_fresh_trusted_status_skips_the_network_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        cache.put(
            "u".to_string(),
            aged_record(PageStatus::SubmittedAndIndexed, 1),
        );

        let api = FakeApi::default();
        let outcomes = run(
            &api,
            "https://example.com/",
            &urls(&["u"]),
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;

        assert_eq!(api.lookup_count(), 0);
        assert_eq!(outcomes[0].status, PageStatus::SubmittedAndIndexed);
    }

    #[tokio::test]
    async fn test_young_actionable_status_is_rechecked_and_resolves() {
        // Scenario: cached "URL is unknown to Google", only a day old.
        // Actionable statuses are rechecked regardless of age; the fresh
        // lookup says it got indexed, so no indexing request is issued.
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        cache.put("u".to_string(), aged_record(PageStatus::UnknownToGoogle, 1));

        let api = FakeApi::with_statuses(&[("u", PageStatus::SubmittedAndIndexed)]);
        let outcomes = run(
            &api,
            "https://example.com/",
            &urls(&["u"]),
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;

        assert_eq!(api.lookup_count(), 1);
        assert_eq!(api.index_request_count(), 0);
        assert!(api.metadata_checks.lock().unwrap().is_empty());
        assert_eq!(outcomes[0].status, PageStatus::SubmittedAndIndexed);
        assert_eq!(
            cache.get("u").unwrap().status,
            PageStatus::SubmittedAndIndexed
        );
    }

    #[tokio::test]
    async fn test_stale_terminal_status_is_rechecked() {
        // Scenario: "Submitted and indexed" but 20 days old (> 14-day TTL)
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        cache.put(
            "u".to_string(),
            aged_record(PageStatus::SubmittedAndIndexed, 20),
        );

        let api = FakeApi::with_statuses(&[("u", PageStatus::SubmittedAndIndexed)]);
        run(
            &api,
            "https://example.com/",
            &urls(&["u"]),
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;

        assert_eq!(api.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_actionable_status_with_no_prior_request_indexes_once() {
        // Scenario: fresh actionable status, metadata lookup answers 404
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        let api = FakeApi::with_statuses(&[("u", PageStatus::DiscoveredNotIndexed)]);

        run(
            &api,
            "https://example.com/",
            &urls(&["u"]),
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;

        assert_eq!(*api.index_requests.lock().unwrap(), vec!["u"]);
        assert_eq!(
            cache.get("u").unwrap().status,
            PageStatus::DiscoveredNotIndexed
        );
    }

    #[tokio::test]
    async fn test_already_requested_url_is_not_requested_again() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        let api = FakeApi::with_statuses(&[("u", PageStatus::CrawledNotIndexed)]);
        api.publish_codes
            .lock()
            .unwrap()
            .insert("u".to_string(), 200);

        run(
            &api,
            "https://example.com/",
            &urls(&["u"]),
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;

        assert_eq!(api.index_request_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_metadata_anomaly_skips_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        let api = FakeApi::with_statuses(&[
            ("bad", PageStatus::CrawledNotIndexed),
            ("good", PageStatus::CrawledNotIndexed),
        ]);
        // 500 from the metadata endpoint: neither "submit" nor "known"
        api.publish_codes
            .lock()
            .unwrap()
            .insert("bad".to_string(), 500);

        let outcomes = run(
            &api,
            "https://example.com/",
            &urls(&["bad", "good"]),
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;

        // the anomaly is skipped, the other URL still got its request
        assert_eq!(*api.index_requests.lock().unwrap(), vec!["good"]);
        assert_eq!(outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_lookup_records_error_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        let mut api = FakeApi::with_statuses(&[("ok", PageStatus::SubmittedAndIndexed)]);
        api.failing_lookups.insert("down".to_string());

        let outcomes = run(
            &api,
            "https://example.com/",
            &urls(&["down", "ok"]),
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;

        // the failing URL is recorded as Error (actionable -> retried next
        // run) and the rest of the batch is unaffected
        assert_eq!(outcomes[0].status, PageStatus::Error);
        assert_eq!(cache.get("down").unwrap().status, PageStatus::Error);
        assert_eq!(outcomes[1].status, PageStatus::SubmittedAndIndexed);
    }

    #[tokio::test]
    async fn test_second_run_issues_no_further_index_requests() {
        // Idempotence: once a request was submitted, re-running the engine
        // against unchanged external state rechecks the actionable URL but
        // submits nothing new
        let dir = tempfile::tempdir().unwrap();
        let (mut cache, _) = scratch_cache(&dir);
        let api = FakeApi::with_statuses(&[("u", PageStatus::DiscoveredNotIndexed)]);
        let pages = urls(&["u"]);

        run(
            &api,
            "https://example.com/",
            &pages,
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;
        assert_eq!(api.index_request_count(), 1);

        run(
            &api,
            "https://example.com/",
            &pages,
            &mut cache,
            10,
            default_ttl(),
            |_, _, _| {},
        )
        .await;

        // rechecked (actionable), but not re-requested
        assert_eq!(api.lookup_count(), 2);
        assert_eq!(api.index_request_count(), 1);
    }

    #[test]
    fn test_tally_groups_in_first_seen_order() {
        let results = vec![
            UrlOutcome {
                url: "a".to_string(),
                status: PageStatus::SubmittedAndIndexed,
            },
            UrlOutcome {
                url: "b".to_string(),
                status: PageStatus::CrawledNotIndexed,
            },
            UrlOutcome {
                url: "c".to_string(),
                status: PageStatus::SubmittedAndIndexed,
            },
        ];

        let groups = tally(&results);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, PageStatus::SubmittedAndIndexed);
        assert_eq!(groups[0].1, vec!["a", "c"]);
        assert_eq!(groups[1].0, PageStatus::CrawledNotIndexed);
        assert_eq!(groups[1].1, vec!["b"]);

        // exhaustive: every outcome in exactly one group
        let total: usize = groups.iter().map(|(_, urls)| urls.len()).sum();
        assert_eq!(total, results.len());
    }

    #[test]
    fn test_tally_of_nothing_is_empty() {
        assert!(tally(&[]).is_empty());
    }
}
