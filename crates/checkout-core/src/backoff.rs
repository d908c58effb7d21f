//! # Poll Backoff
//!
//! Poll pacing is tiered on wall-clock time since polling began, not on
//! attempt count: fast while the shopper is watching a card network
//! response, slower for long-running confirmations such as bank holds.
//!
//! ```text
//!   elapsed  0s ────── 60s ─────────── 300s ──────────────▶
//!   interval    2s        │     5s        │      15s
//! ```

use std::time::Duration;

/// Interval while elapsed < 60s
pub const FAST_INTERVAL: Duration = Duration::from_millis(2_000);

/// Interval while 60s <= elapsed < 300s
pub const MEDIUM_INTERVAL: Duration = Duration::from_millis(5_000);

/// Interval once elapsed >= 300s
pub const SLOW_INTERVAL: Duration = Duration::from_millis(15_000);

/// Upper bound (exclusive) of the fast tier, in seconds
pub const FAST_TIER_SECS: u64 = 60;

/// Upper bound (exclusive) of the medium tier, in seconds
pub const MEDIUM_TIER_SECS: u64 = 300;

/// Resolution of the elapsed-time ticker shown to the shopper
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Delay before the next status lookup, given whole seconds since polling began
pub fn poll_interval(elapsed_secs: u64) -> Duration {
    if elapsed_secs < FAST_TIER_SECS {
        FAST_INTERVAL
    } else if elapsed_secs < MEDIUM_TIER_SECS {
        MEDIUM_INTERVAL
    } else {
        SLOW_INTERVAL
    }
}
