//! Query pattern analyzer
//!
//! Observed query text is normalized, hashed and grouped into clusters. The
//! aggregate count and latency since the last boundary feed the same N+1
//! classifier that judges finished sessions. All state sits behind a single
//! mutex; lookups and inserts are short.

pub mod cluster;
pub mod normalize;
pub mod report;

pub use cluster::QueryCluster;
pub use report::DuplicateQuery;

use crate::classifier::{self, Cause, NPlusOneVerdict, Severity};
use crate::common::bounded::{bounded_string, copy_nul_terminated, truncate_str};
use crate::common::constants::{DEFAULT_CLUSTER_CAPACITY, MAX_EXAMPLE_LENGTH, MAX_QUERY_LENGTH};
use crate::errors::{ProfilerError, Result};
use cluster::{ClusterTable, Placement};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerOptions {
    pub cluster_capacity: usize,
    pub max_query_length: usize,
    pub parameterize_literals: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            cluster_capacity: DEFAULT_CLUSTER_CAPACITY,
            max_query_length: MAX_QUERY_LENGTH,
            parameterize_literals: true,
        }
    }
}

/// Aggregate counters reported by [`QueryAnalyzer::statistics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerStats {
    pub total_queries: u64,
    /// Observations implicated in a detected N+1 pattern, 0 when none is detected
    pub n_plus_one_detected: u64,
    /// Observations in clusters with more than one member
    pub similar_queries: u64,
    pub active_clusters: u64,
    /// Observations dropped from clustering because the cluster pool was full
    pub unclustered_queries: u64,
}

#[derive(Debug)]
struct AnalyzerState {
    clusters: ClusterTable,
    total_queries: u64,
    total_exec_ms: f64,
    unclustered_queries: u64,
    boundary_queries: u64,
    boundary_exec_ms: f64,
    overflow_warned: bool,
}

impl AnalyzerState {
    fn new(cluster_capacity: usize) -> Self {
        Self {
            clusters: ClusterTable::new(cluster_capacity),
            total_queries: 0,
            total_exec_ms: 0.0,
            unclustered_queries: 0,
            boundary_queries: 0,
            boundary_exec_ms: 0.0,
            overflow_warned: false,
        }
    }

    fn window_count(&self) -> u64 {
        self.total_queries - self.boundary_queries
    }

    fn window_avg_ms(&self) -> Option<f64> {
        let count = self.window_count();
        if count == 0 {
            None
        } else {
            Some((self.total_exec_ms - self.boundary_exec_ms).max(0.0) / count as f64)
        }
    }

    fn verdict(&self) -> NPlusOneVerdict {
        classifier::classify(self.window_count(), self.window_avg_ms())
    }
}

#[derive(Debug)]
pub struct QueryAnalyzer {
    options: AnalyzerOptions,
    state: Mutex<AnalyzerState>,
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerOptions::default())
    }
}

impl QueryAnalyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self {
            options,
            state: Mutex::new(AnalyzerState::new(options.cluster_capacity)),
        }
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    /// Record one observed query.
    ///
    /// `None` text is rejected; an empty string is a valid zero-length query.
    /// Text past the length limit is dropped before normalization. Negative or
    /// non-finite execution times count as 0 ms.
    pub fn analyze<'a>(&self, text: impl Into<Option<&'a str>>, exec_time_ms: f64) -> Result<()> {
        let text = text
            .into()
            .ok_or_else(|| ProfilerError::InvalidArgument("query text is required".to_string()))?;
        let text = truncate_str(text, self.options.max_query_length);
        let exec_ms = if exec_time_ms.is_finite() && exec_time_ms > 0.0 {
            exec_time_ms
        } else {
            0.0
        };

        let normalized = normalize::normalize(text, self.options.parameterize_literals);
        let signature = normalize::signature(&normalized);

        let mut state = self.state.lock();
        let order = state.total_queries;
        state.total_queries += 1;
        state.total_exec_ms += exec_ms;

        let placement = state.clusters.insert(
            signature,
            normalized,
            || bounded_string(text, MAX_EXAMPLE_LENGTH),
            exec_ms,
            order,
        );
        if placement == Placement::Rejected {
            state.unclustered_queries += 1;
            if !state.overflow_warned {
                state.overflow_warned = true;
                warn!(
                    capacity = self.options.cluster_capacity,
                    "⚠️ Query cluster pool full, new query shapes are no longer clustered"
                );
            }
        }
        Ok(())
    }

    pub fn statistics(&self) -> AnalyzerStats {
        let state = self.state.lock();
        let similar_queries = state.clusters.repeated_members();
        let n_plus_one_detected = if !state.verdict().is_pattern {
            0
        } else if similar_queries > 0 {
            similar_queries
        } else {
            state.total_queries
        };

        AnalyzerStats {
            total_queries: state.total_queries,
            n_plus_one_detected,
            similar_queries,
            active_clusters: state.clusters.len() as u64,
            unclustered_queries: state.unclustered_queries,
        }
    }

    /// Repeated query shapes, most frequent first
    pub fn duplicates(&self) -> Vec<DuplicateQuery> {
        let state = self.state.lock();
        state.clusters.repeated().into_iter().map(DuplicateQuery::from).collect()
    }

    pub fn duplicate_report_string(&self) -> String {
        report::render(&self.duplicates())
    }

    /// Write the duplicate report into `buf` as NUL-terminated UTF-8.
    ///
    /// Output that does not fit is cut on a character boundary. Returns the
    /// number of text bytes written, excluding the terminator.
    pub fn duplicate_report(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Err(ProfilerError::InvalidArgument(
                "report buffer must not be empty".to_string(),
            ));
        }
        Ok(copy_nul_terminated(&self.duplicate_report_string(), buf))
    }

    /// The `k` largest clusters, most frequent first
    pub fn top_clusters(&self, k: usize) -> Vec<QueryCluster> {
        let state = self.state.lock();
        let mut clusters: Vec<_> = state.clusters.iter().collect();
        clusters.sort_by(|a, b| b.count.cmp(&a.count).then(a.first_seen.cmp(&b.first_seen)));
        clusters.into_iter().take(k).cloned().collect()
    }

    /// Fingerprint of the shape repeated most often since the last boundary
    pub fn dominant_signature(&self) -> Option<String> {
        let state = self.state.lock();
        state.clusters.dominant().map(QueryCluster::fingerprint)
    }

    pub fn verdict(&self) -> NPlusOneVerdict {
        self.state.lock().verdict()
    }

    pub fn detect_pattern(&self) -> bool {
        self.verdict().is_pattern
    }

    pub fn severity(&self) -> Severity {
        self.verdict().severity
    }

    pub fn cause(&self) -> Cause {
        self.verdict().cause
    }

    pub fn suggestion(&self) -> &'static str {
        self.verdict().suggestion()
    }

    /// Start a new verdict window without discarding clusters.
    ///
    /// Pattern detection and the dominant signature only consider queries
    /// analyzed after the boundary; statistics and duplicates still cover
    /// everything since the last reset.
    pub fn mark_boundary(&self) {
        let mut state = self.state.lock();
        state.boundary_queries = state.total_queries;
        state.boundary_exec_ms = state.total_exec_ms;
        state.clusters.open_window();
    }

    /// Forget every cluster, counter and boundary
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let had_queries = state.total_queries > 0;
        *state = AnalyzerState::new(self.options.cluster_capacity);
        drop(state);
        if had_queries {
            info!("🧹 Query analyzer reset");
        }
    }
}
