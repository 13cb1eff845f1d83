use crate::classifier::{self, NPlusOneVerdict, NO_METRICS_SUGGESTION};
use crate::common::constants::{
    BYTES_PER_MB, DEFAULT_MEMORY_INTENSIVE_MB, DEFAULT_POOR_CACHE_HIT_RATIO, NANOS_PER_MILLI,
};
use crate::counters::CounterSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable measurement produced by stopping a session.
///
/// Counter fields are global deltas between start and stop; `attributed`
/// holds only the events that named this session as the thread's current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub operation_name: String,
    pub operation_type: String,
    pub started_at: DateTime<Utc>,
    pub start_time_ns: u64,
    pub end_time_ns: u64,
    pub elapsed_ns: u64,
    pub memory_start_bytes: u64,
    pub memory_end_bytes: u64,
    pub memory_peak_bytes: u64,
    pub memory_delta_bytes: i64,
    pub query_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub attributed: CounterSample,
}

impl MetricsSnapshot {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ns as f64 / NANOS_PER_MILLI
    }

    /// hits / (hits + misses), or 0.0 when no cache operation happened
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Elapsed time spread over the session's queries; `None` without queries
    pub fn avg_query_time_ms(&self) -> Option<f64> {
        if self.query_count == 0 {
            None
        } else {
            Some(self.elapsed_ms() / self.query_count as f64)
        }
    }

    pub fn memory_delta_mb(&self) -> f64 {
        self.memory_delta_bytes as f64 / BYTES_PER_MB
    }

    pub fn peak_memory_mb(&self) -> f64 {
        self.memory_peak_bytes as f64 / BYTES_PER_MB
    }

    pub fn is_memory_intensive(&self) -> bool {
        self.is_memory_intensive_above(DEFAULT_MEMORY_INTENSIVE_MB)
    }

    /// Session grew resident memory by more than `threshold_mb`
    pub fn is_memory_intensive_above(&self, threshold_mb: f64) -> bool {
        self.memory_delta_mb() > threshold_mb
    }

    pub fn has_poor_cache_performance(&self) -> bool {
        self.has_cache_ratio_below(DEFAULT_POOR_CACHE_HIT_RATIO)
    }

    /// Cache was used and its hit ratio fell below `min_ratio`
    pub fn has_cache_ratio_below(&self, min_ratio: f64) -> bool {
        self.cache_hits + self.cache_misses > 0 && self.cache_hit_ratio() < min_ratio
    }

    pub fn verdict(&self) -> NPlusOneVerdict {
        classifier::classify(self.query_count, self.avg_query_time_ms())
    }
}

// Absent snapshots classify as zero queries

pub fn query_count_of(snapshot: Option<&MetricsSnapshot>) -> u64 {
    snapshot.map(|s| s.query_count).unwrap_or(0)
}

pub fn verdict_of(snapshot: Option<&MetricsSnapshot>) -> NPlusOneVerdict {
    snapshot.map(MetricsSnapshot::verdict).unwrap_or_default()
}

pub fn suggestion_for(snapshot: Option<&MetricsSnapshot>) -> &'static str {
    match snapshot {
        Some(s) => s.verdict().suggestion(),
        None => NO_METRICS_SUGGESTION,
    }
}

#[cfg(test)]
pub(crate) fn sample_snapshot(query_count: u64, elapsed_ms: f64) -> MetricsSnapshot {
    let elapsed_ns = (elapsed_ms * NANOS_PER_MILLI) as u64;
    MetricsSnapshot {
        operation_name: "UserViewTest.test_list".to_string(),
        operation_type: "view".to_string(),
        started_at: Utc::now(),
        start_time_ns: 0,
        end_time_ns: elapsed_ns,
        elapsed_ns,
        memory_start_bytes: 50 * 1024 * 1024,
        memory_end_bytes: 50 * 1024 * 1024,
        memory_peak_bytes: 50 * 1024 * 1024,
        memory_delta_bytes: 0,
        query_count,
        cache_hits: 10,
        cache_misses: 5,
        attributed: CounterSample::default(),
    }
}
