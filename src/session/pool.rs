//! Fixed-capacity pool of monitoring sessions
//!
//! Slots are claimed with a compare-and-swap on their `occupied` flag, so two
//! concurrent `start` calls can never land on the same slot. Session metadata
//! lives behind a per-slot mutex that is never held across a memory sample.
//! Attribution from counter hooks takes no lock at all: it checks the slot's
//! live generation and bumps atomics. Sessions that are started and never
//! stopped keep their slot until [`SessionPool::reset`].

use super::handle::SessionHandle;
use super::snapshot::MetricsSnapshot;
use crate::clock::{elapsed_between, monotonic_ns};
use crate::common::bounded::bounded_string;
use crate::common::constants::{DEFAULT_OPERATION_TYPE, MAX_OPERATION_NAME_LEN, MAX_OPERATION_TYPE_LEN};
use crate::counters::{CounterFabric, CounterKind, CounterSample};
use crate::errors::{ProfilerError, Result};
use crate::memory::{MemorySampler, NullMemorySampler};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct SessionRecord {
    generation: u32,
    active: bool,
    operation_name: String,
    operation_type: String,
    started_at: DateTime<Utc>,
    start_time_ns: u64,
    memory_start: u64,
    memory_peak: u64,
    counters_start: CounterSample,
}

impl SessionRecord {
    fn vacant() -> Self {
        Self {
            generation: 1,
            active: false,
            operation_name: String::new(),
            operation_type: String::new(),
            started_at: DateTime::<Utc>::default(),
            start_time_ns: 0,
            memory_start: 0,
            memory_peak: 0,
            counters_start: CounterSample::default(),
        }
    }

    fn matches(&self, handle: SessionHandle) -> bool {
        self.active && self.generation == handle.generation()
    }

    /// Deactivate and invalidate every outstanding handle to this slot
    fn retire(&mut self) {
        self.active = false;
        // Generation 0 is reserved for "never valid"
        self.generation = self.generation.wrapping_add(1).max(1);
    }
}

#[derive(Debug)]
struct Slot {
    occupied: AtomicBool,
    /// Generation of the running session, 0 while vacant
    live: AtomicU32,
    attributed: CounterFabric,
    record: Mutex<SessionRecord>,
}

impl Slot {
    fn is_live(&self, handle: SessionHandle) -> bool {
        handle.generation() != 0 && self.live.load(Ordering::Acquire) == handle.generation()
    }

    /// Must be called with the record locked
    fn go_dark(&self) {
        self.live.store(0, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    started: AtomicU64,
    stopped: AtomicU64,
    exhausted: AtomicU64,
    invalid_handles: AtomicU64,
}

/// Pool statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub active: usize,
    pub started: u64,
    pub stopped: u64,
    pub exhausted: u64,
    pub invalid_handles: u64,
}

impl PoolStats {
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.active as f64 / self.capacity as f64
        }
    }
}

/// Summary of a session that is still running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub handle: SessionHandle,
    pub operation_name: String,
    pub operation_type: String,
    pub started_at: DateTime<Utc>,
}

pub struct SessionPool {
    slots: Box<[Slot]>,
    counters: Arc<CounterFabric>,
    memory: Arc<dyn MemorySampler>,
    next_hint: AtomicUsize,
    active: AtomicUsize,
    stats: PoolCounters,
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("capacity", &self.slots.len())
            .field("active", &self.active.load(Ordering::Relaxed))
            .field("memory", &self.memory)
            .finish()
    }
}

impl SessionPool {
    /// Create a pool that measures against `counters` and samples memory with `memory`
    pub fn new(capacity: usize, counters: Arc<CounterFabric>, memory: Arc<dyn MemorySampler>) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                occupied: AtomicBool::new(false),
                live: AtomicU32::new(0),
                attributed: CounterFabric::new(),
                record: Mutex::new(SessionRecord::vacant()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!("Session pool created with {} slots", capacity);
        Self {
            slots,
            counters,
            memory,
            next_hint: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            stats: PoolCounters::default(),
        }
    }

    /// Pool with its own private counter fabric and no memory tracking
    pub fn isolated(capacity: usize) -> Self {
        Self::new(capacity, Arc::new(CounterFabric::new()), Arc::new(NullMemorySampler))
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn counters(&self) -> &Arc<CounterFabric> {
        &self.counters
    }

    /// Begin a session.
    ///
    /// `name` is required; `operation_type` falls back to `"unknown"` when
    /// absent or empty. Both are truncated to their bounds.
    pub fn start<'a>(
        &self,
        name: impl Into<Option<&'a str>>,
        operation_type: impl Into<Option<&'a str>>,
    ) -> Result<SessionHandle> {
        let name = match name.into() {
            Some(n) if !n.is_empty() => n,
            _ => {
                return Err(ProfilerError::InvalidArgument(
                    "operation name must be a non-empty string".to_string(),
                ))
            }
        };
        let operation_type = match operation_type.into() {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_OPERATION_TYPE,
        };

        let index = match self.claim_slot() {
            Some(index) => index,
            None => {
                self.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                warn!(
                    capacity = self.capacity(),
                    operation = name,
                    "⚠️ Session pool exhausted"
                );
                return Err(ProfilerError::ResourceExhausted { capacity: self.capacity() });
            }
        };

        let slot = &self.slots[index];
        let memory_start = self.memory.resident_bytes();
        let mut record = slot.record.lock();
        record.active = true;
        record.operation_name = bounded_string(name, MAX_OPERATION_NAME_LEN);
        record.operation_type = bounded_string(operation_type, MAX_OPERATION_TYPE_LEN);
        record.started_at = Utc::now();
        record.memory_start = memory_start;
        record.memory_peak = memory_start;
        record.counters_start = self.counters.sample();
        record.start_time_ns = monotonic_ns();
        slot.attributed.reset_all();
        slot.live.store(record.generation, Ordering::Release);
        let handle = SessionHandle::new(index as u32, record.generation);
        drop(record);

        self.active.fetch_add(1, Ordering::AcqRel);
        self.stats.started.fetch_add(1, Ordering::Relaxed);
        debug!(%handle, operation = name, operation_type, "Session started");
        Ok(handle)
    }

    /// Finish a session and return its measurement.
    ///
    /// Fails with `InvalidHandle` when the handle is out of range, stale, or
    /// already stopped. On success the slot is free for reuse and `handle` is
    /// permanently invalid.
    pub fn stop(&self, handle: SessionHandle) -> Result<MetricsSnapshot> {
        let end_time_ns = monotonic_ns();
        let counters_end = self.counters.sample();

        let Some(slot) = self.slots.get(handle.index() as usize).filter(|s| s.is_live(handle)) else {
            return Err(self.reject(handle.to_raw()));
        };
        let memory_end = self.memory.resident_bytes();

        let mut record = slot.record.lock();
        if !record.matches(handle) {
            drop(record);
            return Err(self.reject(handle.to_raw()));
        }
        slot.go_dark();

        let memory_peak = record.memory_peak.max(memory_end);
        let delta = counters_end.delta_since(&record.counters_start);
        let snapshot = MetricsSnapshot {
            operation_name: std::mem::take(&mut record.operation_name),
            operation_type: std::mem::take(&mut record.operation_type),
            started_at: record.started_at,
            start_time_ns: record.start_time_ns,
            end_time_ns,
            elapsed_ns: elapsed_between(record.start_time_ns, end_time_ns),
            memory_start_bytes: record.memory_start,
            memory_end_bytes: memory_end,
            memory_peak_bytes: memory_peak,
            memory_delta_bytes: memory_end as i64 - record.memory_start as i64,
            query_count: delta.queries,
            cache_hits: delta.cache_hits,
            cache_misses: delta.cache_misses,
            attributed: slot.attributed.sample(),
        };
        record.retire();
        drop(record);

        slot.occupied.store(false, Ordering::Release);
        self.active.fetch_sub(1, Ordering::AcqRel);
        self.stats.stopped.fetch_add(1, Ordering::Relaxed);
        debug!(
            %handle,
            operation = %snapshot.operation_name,
            elapsed_ms = snapshot.elapsed_ms(),
            queries = snapshot.query_count,
            "Session stopped"
        );
        Ok(snapshot)
    }

    /// [`stop`](Self::stop) for a handle carried as a raw integer
    pub fn stop_raw(&self, raw: i64) -> Result<MetricsSnapshot> {
        match SessionHandle::from_raw(raw) {
            Some(handle) => self.stop(handle),
            None => Err(self.reject(raw)),
        }
    }

    /// Credit one event to a live session. Stale or foreign handles are ignored.
    ///
    /// Lock-free. An event that races with `stop` of the same session may be
    /// missing from that session's snapshot.
    pub fn attribute(&self, handle: SessionHandle, kind: CounterKind) -> bool {
        match self.slots.get(handle.index() as usize) {
            Some(slot) if slot.is_live(handle) => {
                slot.attributed.increment(kind);
                true
            }
            _ => false,
        }
    }

    /// Take an intermediate memory sample so the session's peak reflects it
    pub fn sample_memory(&self, handle: SessionHandle) -> Result<u64> {
        let Some(slot) = self.slots.get(handle.index() as usize).filter(|s| s.is_live(handle)) else {
            return Err(self.reject(handle.to_raw()));
        };
        let bytes = self.memory.resident_bytes();
        let mut record = slot.record.lock();
        if !record.matches(handle) {
            drop(record);
            return Err(self.reject(handle.to_raw()));
        }
        record.memory_peak = record.memory_peak.max(bytes);
        Ok(bytes)
    }

    pub fn is_active(&self, handle: SessionHandle) -> bool {
        self.slots
            .get(handle.index() as usize)
            .map(|slot| slot.record.lock().matches(handle))
            .unwrap_or(false)
    }

    /// Sessions that are currently running, in slot order
    pub fn active_sessions(&self) -> Vec<ActiveSession> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.occupied.load(Ordering::Acquire))
            .filter_map(|(index, slot)| {
                let record = slot.record.lock();
                record.active.then(|| ActiveSession {
                    handle: SessionHandle::new(index as u32, record.generation),
                    operation_name: record.operation_name.clone(),
                    operation_type: record.operation_type.clone(),
                    started_at: record.started_at,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity(),
            active: self.active_count(),
            started: self.stats.started.load(Ordering::Relaxed),
            stopped: self.stats.stopped.load(Ordering::Relaxed),
            exhausted: self.stats.exhausted.load(Ordering::Relaxed),
            invalid_handles: self.stats.invalid_handles.load(Ordering::Relaxed),
        }
    }

    /// Release every slot, including abandoned sessions.
    ///
    /// Outstanding handles become invalid. Returns how many sessions were
    /// still active.
    pub fn reset(&self) -> usize {
        let mut released = 0;
        for slot in self.slots.iter() {
            let mut record = slot.record.lock();
            if record.active {
                slot.go_dark();
                record.retire();
                record.operation_name.clear();
                record.operation_type.clear();
                released += 1;
                drop(record);
                slot.occupied.store(false, Ordering::Release);
                self.active.fetch_sub(1, Ordering::AcqRel);
            }
        }
        if released > 0 {
            info!("🧹 Session pool reset released {} abandoned sessions", released);
        }
        released
    }

    fn claim_slot(&self) -> Option<usize> {
        let capacity = self.slots.len();
        if capacity == 0 {
            return None;
        }
        let first = self.next_hint.load(Ordering::Relaxed) % capacity;
        for offset in 0..capacity {
            let index = (first + offset) % capacity;
            if self.slots[index]
                .occupied
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.next_hint.store((index + 1) % capacity, Ordering::Relaxed);
                return Some(index);
            }
        }
        None
    }

    fn reject(&self, raw: i64) -> ProfilerError {
        self.stats.invalid_handles.fetch_add(1, Ordering::Relaxed);
        debug!(raw_handle = raw, "Rejected invalid session handle");
        ProfilerError::InvalidHandle(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_start_stop_lifecycle() {
        let pool = SessionPool::isolated(4);
        let handle = pool.start("UserViewTest", "view").unwrap();
        thread::sleep(Duration::from_millis(5));
        let snapshot = pool.stop(handle).unwrap();

        assert!(snapshot.end_time_ns > snapshot.start_time_ns);
        assert!(snapshot.elapsed_ms() >= 5.0);
        assert_eq!(snapshot.operation_name, "UserViewTest");
        assert_eq!(snapshot.operation_type, "view");
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_counter_deltas() {
        let pool = SessionPool::isolated(4);
        let counters = pool.counters().clone();
        counters.increment_query();

        let handle = pool.start("MetricsTest", "test").unwrap();
        for _ in 0..8 {
            counters.increment_query();
        }
        for _ in 0..5 {
            counters.increment_cache_hit();
        }
        for _ in 0..3 {
            counters.increment_cache_miss();
        }
        let snapshot = pool.stop(handle).unwrap();

        assert_eq!(snapshot.query_count, 8);
        assert_eq!(snapshot.cache_hits, 5);
        assert_eq!(snapshot.cache_misses, 3);
        assert!((snapshot.cache_hit_ratio() - 5.0 / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_arguments() {
        let pool = SessionPool::isolated(2);
        assert!(matches!(pool.start(None, "view"), Err(ProfilerError::InvalidArgument(_))));
        assert!(matches!(pool.start("", "view"), Err(ProfilerError::InvalidArgument(_))));

        let handle = pool.start("TypeDefaults", None).unwrap();
        let snapshot = pool.stop(handle).unwrap();
        assert_eq!(snapshot.operation_type, DEFAULT_OPERATION_TYPE);

        let handle = pool.start("EmptyType", "").unwrap();
        assert_eq!(pool.stop(handle).unwrap().operation_type, DEFAULT_OPERATION_TYPE);
    }

    #[test]
    fn test_names_are_truncated() {
        let pool = SessionPool::isolated(1);
        let long_name = "N".repeat(1000);
        let long_type = "t".repeat(200);
        let handle = pool.start(long_name.as_str(), long_type.as_str()).unwrap();
        let snapshot = pool.stop(handle).unwrap();
        assert_eq!(snapshot.operation_name.len(), MAX_OPERATION_NAME_LEN);
        assert_eq!(snapshot.operation_type.len(), MAX_OPERATION_TYPE_LEN);
    }

    #[test]
    fn test_double_stop_fails() {
        let pool = SessionPool::isolated(2);
        let handle = pool.start("Once", "view").unwrap();
        assert!(pool.stop(handle).is_ok());
        assert!(matches!(pool.stop(handle), Err(ProfilerError::InvalidHandle(_))));
    }

    #[test]
    fn test_bad_raw_handles() {
        let pool = SessionPool::isolated(2);
        for raw in [-1, -12345, 0, 1, i64::MAX, i64::MIN, 2, (1i64 << 32) | 99] {
            assert!(
                matches!(pool.stop_raw(raw), Err(ProfilerError::InvalidHandle(r)) if r == raw),
                "raw handle {} should be rejected",
                raw
            );
        }
        assert_eq!(pool.stats().invalid_handles, 8);
    }

    #[test]
    fn test_raw_handle_round_trip() {
        let pool = SessionPool::isolated(2);
        let raw = pool.start("Raw", "view").unwrap().to_raw();
        assert!(raw > 0);
        assert!(pool.stop_raw(raw).is_ok());
        assert!(pool.stop_raw(raw).is_err());
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let pool = SessionPool::isolated(1);
        let first = pool.start("First", "view").unwrap();
        pool.stop(first).unwrap();

        let second = pool.start("Second", "view").unwrap();
        assert_eq!(first.index(), second.index());
        assert_ne!(first.generation(), second.generation());

        assert!(pool.stop(first).is_err());
        assert!(pool.is_active(second));
        assert_eq!(pool.stop(second).unwrap().operation_name, "Second");
    }

    #[test]
    fn test_exhaustion_and_recovery() {
        let pool = SessionPool::isolated(8);
        let handles: Vec<_> = (0..8).map(|i| pool.start(format!("op{}", i).as_str(), "view").unwrap()).collect();

        let err = pool.start("overflow", "view").unwrap_err();
        assert!(matches!(err, ProfilerError::ResourceExhausted { capacity: 8 }));
        assert!(err.is_recoverable());

        pool.stop(handles[3]).unwrap();
        assert!(pool.start("refill", "view").is_ok());
        assert!(pool.start("overflow again", "view").is_err());

        let stats = pool.stats();
        assert_eq!(stats.active, 8);
        assert_eq!(stats.exhausted, 2);
        assert_eq!(stats.utilization(), 1.0);
    }

    #[test]
    fn test_concurrent_starts_get_distinct_slots() {
        let pool = Arc::new(SessionPool::isolated(64));
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let pool = pool.clone();
                thread::spawn(move || {
                    (0..8)
                        .map(|i| pool.start(format!("t{}-{}", t, i).as_str(), "concurrent").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let handles: Vec<SessionHandle> = threads.into_iter().flat_map(|t| t.join().unwrap()).collect();
        let indices: HashSet<u32> = handles.iter().map(|h| h.index()).collect();
        assert_eq!(indices.len(), 64);
        assert!(pool.start("one too many", "view").is_err());

        for handle in handles {
            pool.stop(handle).unwrap();
        }
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_concurrent_double_stop_only_one_wins() {
        let pool = Arc::new(SessionPool::isolated(1));
        let handle = pool.start("Race", "view").unwrap();
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || pool.stop(handle).is_ok())
            })
            .collect();
        let wins = threads.into_iter().map(|t| t.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_attribution() {
        let pool = SessionPool::isolated(2);
        let a = pool.start("A", "view").unwrap();
        let b = pool.start("B", "view").unwrap();

        assert!(pool.attribute(a, CounterKind::Query));
        assert!(pool.attribute(a, CounterKind::Query));
        assert!(pool.attribute(b, CounterKind::CacheHit));
        assert!(pool.attribute(b, CounterKind::CacheMiss));

        let snap_a = pool.stop(a).unwrap();
        assert_eq!(snap_a.attributed.queries, 2);
        assert_eq!(snap_a.attributed.cache_hits, 0);
        assert!(!pool.attribute(a, CounterKind::Query));

        let snap_b = pool.stop(b).unwrap();
        assert_eq!(snap_b.attributed.cache_hits, 1);
        assert_eq!(snap_b.attributed.cache_misses, 1);
    }

    #[test]
    fn test_reset_releases_abandoned_sessions() {
        let pool = SessionPool::isolated(2);
        let abandoned = pool.start("Abandoned", "view").unwrap();
        let _other = pool.start("Other", "view").unwrap();
        assert_eq!(pool.active_sessions().len(), 2);

        assert_eq!(pool.reset(), 2);
        assert_eq!(pool.active_count(), 0);
        assert!(pool.stop(abandoned).is_err());
        assert!(pool.start("Fresh", "view").is_ok());
    }

    #[test]
    fn test_sample_memory_updates_peak() {
        #[derive(Debug)]
        struct Stepping(AtomicU64);
        impl MemorySampler for Stepping {
            fn resident_bytes(&self) -> u64 {
                // 1000, 5000, 2000 ...
                match self.0.fetch_add(1, Ordering::SeqCst) {
                    0 => 1000,
                    1 => 5000,
                    _ => 2000,
                }
            }
        }

        let pool = SessionPool::new(1, Arc::new(CounterFabric::new()), Arc::new(Stepping(AtomicU64::new(0))));
        let handle = pool.start("Memory", "query").unwrap();
        assert_eq!(pool.sample_memory(handle).unwrap(), 5000);
        let snapshot = pool.stop(handle).unwrap();
        assert_eq!(snapshot.memory_start_bytes, 1000);
        assert_eq!(snapshot.memory_end_bytes, 2000);
        assert_eq!(snapshot.memory_peak_bytes, 5000);
        assert_eq!(snapshot.memory_delta_bytes, 1000);
    }

    #[test]
    fn test_attribution_does_not_wait_for_slow_memory_sample() {
        #[derive(Debug)]
        struct SlowOnStop(AtomicU64);
        impl MemorySampler for SlowOnStop {
            fn resident_bytes(&self) -> u64 {
                if self.0.fetch_add(1, Ordering::SeqCst) == 1 {
                    thread::sleep(Duration::from_millis(300));
                }
                4096
            }
        }

        let pool = Arc::new(SessionPool::new(
            1,
            Arc::new(CounterFabric::new()),
            Arc::new(SlowOnStop(AtomicU64::new(0))),
        ));
        let handle = pool.start("SlowSampler", "view").unwrap();

        let stopper = {
            let pool = pool.clone();
            thread::spawn(move || pool.stop(handle).unwrap())
        };
        thread::sleep(Duration::from_millis(50));
        let began = std::time::Instant::now();
        assert!(pool.attribute(handle, CounterKind::Query));
        let waited = began.elapsed();

        let snapshot = stopper.join().unwrap();
        assert!(waited < Duration::from_millis(100), "attribute waited {:?}", waited);
        assert_eq!(snapshot.attributed.queries, 1);
        assert!(!pool.attribute(handle, CounterKind::Query));
    }

    #[test]
    fn test_attribution_resets_when_slot_is_reused() {
        let pool = SessionPool::isolated(1);
        let first = pool.start("First", "view").unwrap();
        pool.attribute(first, CounterKind::Query);
        pool.stop(first).unwrap();

        let second = pool.start("Second", "view").unwrap();
        assert!(!pool.attribute(first, CounterKind::Query));
        assert_eq!(pool.stop(second).unwrap().attributed, CounterSample::default());
    }

    #[test]
    fn test_zero_capacity_pool() {
        let pool = SessionPool::isolated(0);
        assert!(matches!(pool.start("x", "y"), Err(ProfilerError::ResourceExhausted { capacity: 0 })));
        assert!(pool.stop_raw(1).is_err());
    }
}
