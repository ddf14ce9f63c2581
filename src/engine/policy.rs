// src/engine/policy.rs
// =============================================================================
// This module decides whether a cached indexing status needs a fresh lookup.
//
// Two independent triggers:
// 1. The status is actionable (see PageStatus::is_actionable) - an
//    actionable status represents a transient or unresolved state, so the
//    cached answer can never be trusted, no matter how fresh it is
// 2. The cached answer is older than the TTL - even a terminal status like
//    "Submitted and indexed" is re-verified eventually, in case the page
//    was dropped from the index
//
// This is a pure function: no I/O, no clock access, deterministic given its
// inputs. The caller passes `now` in, which is what makes it testable.
//
// Rust concepts:
// - chrono::Duration: a signed time span, subtractable from DateTime
// - Pure functions: easiest code in the crate to test exhaustively
// =============================================================================

use crate::gsc::PageStatus;
use chrono::{DateTime, Duration, Utc};

// How long a non-actionable status stays trusted: 14 days
const RECHECK_TTL_DAYS: i64 = 14;

/// The default staleness bound applied to every cached status.
pub fn default_ttl() -> Duration {
    Duration::days(RECHECK_TTL_DAYS)
}

/// Returns true if a cached status should be looked up again.
///
/// True when the status is actionable OR the record is strictly older than
/// `ttl`. A record aged exactly `ttl` is still trusted.
pub fn should_recheck(
    status: &PageStatus,
    last_checked_at: DateTime<Utc>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> bool {
    status.is_actionable() || now - last_checked_at > ttl
}
