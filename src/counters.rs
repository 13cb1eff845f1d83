//! Process-wide activity counters and thread-local session attribution
//!
//! Instrumentation hooks bump these counters on every query and cache event.
//! A session's counts are the difference between the values sampled at stop and
//! at start, which is only accurate when no unrelated session overlaps it on the
//! same fabric. That precondition is the caller's responsibility.

use crate::session::SessionHandle;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::info;

/// Kind of event an instrumentation hook reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Query,
    CacheHit,
    CacheMiss,
}

/// Point-in-time copy of the three counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSample {
    pub queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl CounterSample {
    /// Per-counter `self - earlier`, saturating at zero when a reset happened in between
    pub fn delta_since(&self, earlier: &CounterSample) -> CounterSample {
        CounterSample {
            queries: self.queries.saturating_sub(earlier.queries),
            cache_hits: self.cache_hits.saturating_sub(earlier.cache_hits),
            cache_misses: self.cache_misses.saturating_sub(earlier.cache_misses),
        }
    }
}

/// Three atomic counters shared by every thread of the process
#[derive(Debug, Default)]
pub struct CounterFabric {
    queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl CounterFabric {
    pub const fn new() -> Self {
        Self {
            queries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn increment(&self, kind: CounterKind) {
        let counter = match kind {
            CounterKind::Query => &self.queries,
            CounterKind::CacheHit => &self.cache_hits,
            CounterKind::CacheMiss => &self.cache_misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_query(&self) {
        self.increment(CounterKind::Query);
    }

    pub fn increment_cache_hit(&self) {
        self.increment(CounterKind::CacheHit);
    }

    pub fn increment_cache_miss(&self) {
        self.increment(CounterKind::CacheMiss);
    }

    pub fn sample(&self) -> CounterSample {
        CounterSample {
            queries: self.queries.load(Ordering::Acquire),
            cache_hits: self.cache_hits.load(Ordering::Acquire),
            cache_misses: self.cache_misses.load(Ordering::Acquire),
        }
    }

    /// Zero all counters; used between independent measurement episodes
    pub fn reset_all(&self) {
        self.queries.store(0, Ordering::Release);
        self.cache_hits.store(0, Ordering::Release);
        self.cache_misses.store(0, Ordering::Release);
    }
}

static GLOBAL_COUNTERS: OnceLock<Arc<CounterFabric>> = OnceLock::new();

/// The process-wide fabric used by the global profiler
pub fn global_counters() -> &'static Arc<CounterFabric> {
    GLOBAL_COUNTERS.get_or_init(|| {
        info!("📊 Global counter fabric initialized");
        Arc::new(CounterFabric::new())
    })
}

thread_local! {
    static CURRENT_SESSION: Cell<Option<SessionHandle>> = const { Cell::new(None) };
}

/// Mark `handle` as the session this thread's counter events belong to
pub fn set_current_session(handle: Option<SessionHandle>) {
    CURRENT_SESSION.with(|current| current.set(handle));
}

/// Session this thread currently attributes counter events to
pub fn current_session() -> Option<SessionHandle> {
    CURRENT_SESSION.with(|current| current.get())
}

/// Sets the thread's current session, restoring the previous one on drop
#[derive(Debug)]
pub struct CurrentSessionGuard {
    previous: Option<SessionHandle>,
}

impl CurrentSessionGuard {
    pub fn enter(handle: SessionHandle) -> Self {
        let previous = current_session();
        set_current_session(Some(handle));
        Self { previous }
    }
}

impl Drop for CurrentSessionGuard {
    fn drop(&mut self) {
        set_current_session(self.previous);
    }
}
