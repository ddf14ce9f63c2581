// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse the command-line argument (the site) using clap
// 2. Obtain an access token for the Google APIs (fatal if that fails)
// 3. Enumerate every page URL from the site's registered sitemaps
// 4. Load the per-site status cache and run the batch engine over the URLs,
//    checkpointing the cache after every batch
// 5. Print a per-status summary and exit with the proper code
//    (0 = success, 1 = nothing to do / no sitemaps, 2 = error)
//
// Rust concepts:
// - async/await: Because we make many network requests concurrently
// - Result<T, E>: For error handling with the ? operator
// - Closures: The batch-checkpoint hook handed to the engine
// =============================================================================

// Module declarations - tells Rust about our other source files
mod auth; //    src/auth/    - service-account token provider
mod cache; //   src/cache/   - per-site status cache
mod cli; //     src/cli.rs   - command-line parsing
mod engine; //  src/engine/  - batch orchestrator + recheck policy
mod gsc; //     src/gsc/     - Search Console vocabulary and API client
mod sitemap; // src/sitemap/ - sitemap discovery and URL enumeration

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use std::fs;
use std::path::Path;

// How many URLs are in flight at once. Each batch of this size must fully
// settle before the next one starts (that's also the checkpoint boundary).
const BATCH_SIZE: usize = 10;

// Where the per-site cache files live, relative to the working directory
const CACHE_DIR: &str = ".cache";

// The #[tokio::main] attribute transforms our async main into a real main
// function. It creates a tokio runtime and runs our async code inside it.
#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Unexpected/fatal error: print the whole context chain
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// The main application logic
// Returns:
//   Ok(0) = run completed
//   Ok(1) = no sitemaps registered for the site
//   Err   = fatal error (credentials, corrupt cache, I/O)
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    // Without a token nothing else can work, so this failure is fatal
    let token = auth::get_access_token(&auth::key_file_path())
        .await
        .context("could not authenticate the service account")?;

    let site_url = gsc::convert_to_site_url(&cli.site);
    println!("🔎 Processing site: {}", site_url);

    let console = gsc::SearchConsole::new(token)?;

    let (sitemaps, pages) = sitemap::get_sitemap_pages(&console, &site_url).await?;
    if sitemaps.is_empty() {
        eprintln!("❌ No sitemaps found, add them to Google Search Console and try again.");
        eprintln!();
        return Ok(1);
    }
    println!(
        "👉 Found {} URLs in {} sitemap(s)",
        pages.len(),
        sitemaps.len()
    );

    fs::create_dir_all(CACHE_DIR)
        .with_context(|| format!("could not create the {} directory", CACHE_DIR))?;
    let cache_path = Path::new(CACHE_DIR).join(cache::cache_file_name(&site_url));

    // A corrupt cache file aborts the run here - treating it as empty would
    // re-request indexing for every URL on the site
    let mut cache = cache::StatusCache::load(&cache_path)?;
    println!("💾 Cache loaded: {} URLs known", cache.len());

    let results = engine::run(
        &console,
        &site_url,
        &pages,
        &mut cache,
        BATCH_SIZE,
        engine::default_ttl(),
        |batch_index, batch_count, cache| {
            println!("📦 Batch {} of {} complete", batch_index + 1, batch_count);

            // Checkpoint: everything processed so far becomes durable.
            // A failed checkpoint is reported but doesn't stop the run -
            // the previous on-disk state is still intact.
            if let Err(e) = cache.flush() {
                eprintln!("  Warning: cache checkpoint failed: {}", e);
            }
        },
    )
    .await;

    // One final flush; failing HERE is fatal because the run's results
    // would otherwise be lost
    cache.flush()?;

    print_summary(pages.len(), &results);

    Ok(0)
}

// Prints the per-status tally that ends every successful run
fn print_summary(page_count: usize, results: &[engine::UrlOutcome]) {
    println!();
    println!("👍 Done, here's the status of all {} pages:", page_count);

    for (status, urls) in engine::tally(results) {
        println!("• {} {}: {} pages", status.emoji(), status, urls.len());
    }

    println!();
    println!("👍 All done!");
}
