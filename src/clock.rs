//! Monotonic nanosecond clock
//!
//! All session timestamps are nanoseconds since a process-wide anchor taken the
//! first time the clock is read, so they are comparable across threads and never
//! go backwards.

use std::sync::OnceLock;
use std::time::Instant;

static CLOCK_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds elapsed since the process anchor
pub fn monotonic_ns() -> u64 {
    let anchor = CLOCK_ANCHOR.get_or_init(Instant::now);
    // u64 nanoseconds covers ~584 years of uptime
    anchor.elapsed().as_nanos().min(u64::MAX as u128) as u64
}

/// `end - start`, clamped to zero when the pair is out of order
pub fn elapsed_between(start_ns: u64, end_ns: u64) -> u64 {
    end_ns.saturating_sub(start_ns)
}
