pub mod handle;
pub mod pool;
pub mod snapshot;

pub use handle::SessionHandle;
pub use pool::{ActiveSession, PoolStats, SessionPool};
pub use snapshot::{query_count_of, suggestion_for, verdict_of, MetricsSnapshot};
