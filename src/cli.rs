// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// The surface is deliberately tiny: one positional argument naming the site,
// nothing else. clap still gives us --help, --version and a proper usage
// error (with non-zero exit) when the argument is missing.
//
// Rust concepts:
// - Derive macros: #[derive(Parser)] generates all the parsing code
// - Doc comments: the /// text above a field becomes its --help description
// =============================================================================

use clap::Parser;

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
// The #[command(...)] attributes configure how the CLI behaves
#[derive(Parser, Debug)]
#[command(
    name = "index-guardian",
    version = "0.1.0",
    about = "Bulk-check and request Google indexing for every URL in a site's sitemaps",
    long_about = "index-guardian walks every URL found in a site's sitemaps (as registered in \
                  Google Search Console), checks its current indexing status, and requests \
                  indexing for URLs that aren't indexed yet. Statuses are cached per site in \
                  .cache/ so repeated runs only re-query what's stale or still actionable."
)]
pub struct Cli {
    /// Domain or site URL as registered in Search Console
    ///
    /// A bare domain (example.com) is treated as a Domain property
    /// (sc-domain:example.com); a full URL (https://example.com/) is
    /// treated as a URL-prefix property.
    pub site: String,
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Where are the flags?
//    - There are none on purpose. The tool has exactly one input: the site.
//    - Everything else (credentials path, cache location, batch size) has a
//      sensible fixed default or an environment variable.
//
// 2. What happens when the argument is missing?
//    - clap prints a usage error to stderr and exits non-zero by itself,
//      before our code ever runs
//
// 3. Why String instead of &str?
//    - String is owned (the struct owns the data)
//    - CLI arguments outlive the parsing call, so the struct must own them
// -----------------------------------------------------------------------------
