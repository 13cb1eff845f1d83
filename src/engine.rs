//! Profiler facade
//!
//! [`Profiler`] ties a counter fabric, a session pool and a query analyzer
//! together under one configuration. The process-wide instance backs the free
//! functions that instrumentation hooks call; tests and embedders that need
//! isolation build their own.

use crate::analyzer::{AnalyzerStats, QueryAnalyzer};
use crate::config::EngineConfig;
use crate::counters::{self, global_counters, CounterFabric, CounterKind};
use crate::errors::{ProfilerError, Result};
use crate::history::{HistoryStore, SessionSummary};
use crate::memory::{MemorySampler, NullMemorySampler, ProcessMemorySampler};
use crate::session::{MetricsSnapshot, SessionHandle, SessionPool};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

static GLOBAL_PROFILER: OnceLock<Profiler> = OnceLock::new();

#[derive(Debug)]
pub struct Profiler {
    config: EngineConfig,
    counters: Arc<CounterFabric>,
    sessions: SessionPool,
    analyzer: QueryAnalyzer,
}

impl Profiler {
    /// Profiler with its own private counter fabric
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_counters(config, Arc::new(CounterFabric::new()))
    }

    /// Profiler measuring against an existing fabric
    pub fn with_counters(config: EngineConfig, counters: Arc<CounterFabric>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, counters))
    }

    fn build(config: EngineConfig, counters: Arc<CounterFabric>) -> Self {
        let memory: Arc<dyn MemorySampler> = if config.track_memory {
            Arc::new(ProcessMemorySampler::new())
        } else {
            Arc::new(NullMemorySampler)
        };
        let sessions = SessionPool::new(config.session_capacity, counters.clone(), memory);
        let analyzer = QueryAnalyzer::new(config.analyzer_options());
        Self {
            config,
            counters,
            sessions,
            analyzer,
        }
    }

    /// The process-wide profiler, created with default settings on first use
    pub fn global() -> &'static Profiler {
        GLOBAL_PROFILER.get_or_init(|| {
            info!("🚀 Global profiler initialized with default configuration");
            Self::build(EngineConfig::default(), global_counters().clone())
        })
    }

    /// Configure the process-wide profiler. Fails once it already exists.
    pub fn install_global(config: EngineConfig) -> Result<&'static Profiler> {
        config.validate()?;
        let mut installed = false;
        let profiler = GLOBAL_PROFILER.get_or_init(|| {
            installed = true;
            Self::build(config, global_counters().clone())
        });
        if !installed {
            return Err(ProfilerError::Config(
                "global profiler is already initialized".to_string(),
            ));
        }
        info!(
            session_capacity = profiler.config.session_capacity,
            cluster_capacity = profiler.config.cluster_capacity,
            "🚀 Global profiler installed"
        );
        Ok(profiler)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn counters(&self) -> &Arc<CounterFabric> {
        &self.counters
    }

    pub fn sessions(&self) -> &SessionPool {
        &self.sessions
    }

    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    /// Begin a session and open a new analyzer window for its queries.
    ///
    /// Sessions that overlap on one profiler share that window.
    pub fn start<'a>(
        &self,
        name: impl Into<Option<&'a str>>,
        operation_type: impl Into<Option<&'a str>>,
    ) -> Result<SessionHandle> {
        let handle = self.sessions.start(name, operation_type)?;
        self.analyzer.mark_boundary();
        Ok(handle)
    }

    pub fn stop(&self, handle: SessionHandle) -> Result<MetricsSnapshot> {
        self.sessions.stop(handle)
    }

    pub fn stop_raw(&self, raw: i64) -> Result<MetricsSnapshot> {
        self.sessions.stop_raw(raw)
    }

    /// Count one event and credit it to this thread's current session, if any
    pub fn record(&self, kind: CounterKind) {
        self.counters.increment(kind);
        if let Some(handle) = counters::current_session() {
            self.sessions.attribute(handle, kind);
        }
    }

    pub fn record_query(&self) {
        self.record(CounterKind::Query);
    }

    pub fn record_cache_hit(&self) {
        self.record(CounterKind::CacheHit);
    }

    pub fn record_cache_miss(&self) {
        self.record(CounterKind::CacheMiss);
    }

    /// Count a query and feed its text to the analyzer. Missing text is
    /// rejected before anything is counted.
    pub fn observe_query<'a>(&self, text: impl Into<Option<&'a str>>, exec_time_ms: f64) -> Result<()> {
        let text = text
            .into()
            .ok_or_else(|| ProfilerError::InvalidArgument("query text is required".to_string()))?;
        self.record_query();
        self.analyzer.analyze(text, exec_time_ms)
    }

    pub fn statistics(&self) -> AnalyzerStats {
        self.analyzer.statistics()
    }

    /// Memory growth above the configured threshold
    pub fn is_memory_intensive(&self, snapshot: &MetricsSnapshot) -> bool {
        snapshot.is_memory_intensive_above(self.config.memory_intensive_threshold_mb)
    }

    /// Cache hit ratio below the configured threshold
    pub fn has_poor_cache_performance(&self, snapshot: &MetricsSnapshot) -> bool {
        snapshot.has_cache_ratio_below(self.config.poor_cache_hit_ratio)
    }

    /// Classify a snapshot and attach the analyzer's dominant query shape
    pub fn summarize(&self, snapshot: MetricsSnapshot) -> SessionSummary {
        let summary = SessionSummary::new(snapshot, self.analyzer.dominant_signature());
        if summary.verdict.is_pattern {
            warn!(
                operation = %summary.snapshot.operation_name,
                queries = summary.verdict.query_count,
                severity = %summary.verdict.severity,
                cause = ?summary.verdict.cause,
                "🔁 N+1 query pattern detected"
            );
        }
        summary
    }

    /// Stop a session and classify it
    pub fn finish(&self, handle: SessionHandle) -> Result<SessionSummary> {
        let snapshot = self.stop(handle)?;
        Ok(self.summarize(snapshot))
    }

    /// [`finish`](Self::finish) and hand the summary to `store`
    pub fn finish_and_save(&self, handle: SessionHandle, store: &dyn HistoryStore) -> Result<SessionSummary> {
        let summary = self.finish(handle)?;
        store.save(&summary)?;
        Ok(summary)
    }

    /// Zero the activity counters
    pub fn reset_counters(&self) {
        self.counters.reset_all();
    }

    /// Return to the initial state: counters zeroed, analyzer cleared, every
    /// session (including abandoned ones) released.
    pub fn reset(&self) {
        self.counters.reset_all();
        self.analyzer.reset();
        let released = self.sessions.reset();
        info!(released_sessions = released, "🧹 Profiler reset");
    }
}

// Hooks and caller entry points backed by the global profiler

pub fn increment_query() {
    Profiler::global().record_query();
}

pub fn increment_cache_hit() {
    Profiler::global().record_cache_hit();
}

pub fn increment_cache_miss() {
    Profiler::global().record_cache_miss();
}

/// Zero the process-wide counters
pub fn reset_all() {
    global_counters().reset_all();
}

pub fn start<'a>(
    name: impl Into<Option<&'a str>>,
    operation_type: impl Into<Option<&'a str>>,
) -> Result<SessionHandle> {
    Profiler::global().start(name, operation_type)
}

pub fn stop(handle: SessionHandle) -> Result<MetricsSnapshot> {
    Profiler::global().stop(handle)
}

pub fn stop_raw(raw: i64) -> Result<MetricsSnapshot> {
    Profiler::global().stop_raw(raw)
}

pub fn analyze_query<'a>(text: impl Into<Option<&'a str>>, exec_time_ms: f64) -> Result<()> {
    Profiler::global().analyzer().analyze(text, exec_time_ms)
}

pub fn statistics() -> AnalyzerStats {
    Profiler::global().statistics()
}
