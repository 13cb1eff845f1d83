//! Measurement core for a web-framework performance profiler.
//!
//! Units of work (a test, a request handler) are timed as sessions while
//! instrumentation hooks count database queries and cache events. Finished
//! sessions and the stream of observed query text are both checked for the
//! N+1 query pattern.
//!
//! ```no_run
//! use query_profiler::{increment_query, start, stop, CurrentSessionGuard};
//!
//! let handle = start("PostListTest.test_list", "view")?;
//! {
//!     let _current = CurrentSessionGuard::enter(handle);
//!     for _ in 0..21 {
//!         increment_query();
//!     }
//! }
//! let snapshot = stop(handle)?;
//! println!("{}", snapshot.verdict().suggestion());
//! # Ok::<(), query_profiler::ProfilerError>(())
//! ```

pub mod analyzer;
pub mod classifier;
pub mod clock;
pub mod common;
pub mod config;
pub mod counters;
pub mod engine;
pub mod errors;
pub mod history;
pub mod logging;
pub mod memory;
pub mod session;

pub use analyzer::{AnalyzerOptions, AnalyzerStats, DuplicateQuery, QueryAnalyzer, QueryCluster};
pub use classifier::{Cause, NPlusOneVerdict, Severity};
pub use config::EngineConfig;
pub use counters::{current_session, set_current_session, CounterFabric, CounterKind, CounterSample, CurrentSessionGuard};
pub use engine::{
    analyze_query, increment_cache_hit, increment_cache_miss, increment_query, reset_all, start, statistics, stop,
    stop_raw, Profiler,
};
pub use errors::{ProfilerError, Result};
pub use history::{HistoryFilter, HistoryStore, InMemoryHistoryStore, SessionSummary};
pub use session::{MetricsSnapshot, PoolStats, SessionHandle, SessionPool};
