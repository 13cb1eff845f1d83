/// Engine-wide limits and classifier thresholds
// Session pool
pub const DEFAULT_SESSION_CAPACITY: usize = 2048;
pub const MAX_OPERATION_NAME_LEN: usize = 255;
pub const MAX_OPERATION_TYPE_LEN: usize = 63;
pub const DEFAULT_OPERATION_TYPE: &str = "unknown";

// Query analyzer
pub const DEFAULT_CLUSTER_CAPACITY: usize = 1024;
pub const MAX_QUERY_LENGTH: usize = 4096;
pub const MAX_EXAMPLE_LENGTH: usize = 512;

// N+1 classification
pub const N_PLUS_ONE_THRESHOLD: u64 = 12;
pub const SEVERITY_MODERATE_MIN: u64 = 10;
pub const SEVERITY_HIGH_MIN: u64 = 20;
pub const SEVERITY_SEVERE_MIN: u64 = 25;
pub const SEVERITY_CRITICAL_MIN: u64 = 50;
pub const CAUSE_HIGH_COUNT_MIN: u64 = 20;
pub const CAUSE_COMPLEX_MIN: u64 = 50;
pub const FAST_QUERY_THRESHOLD_MS: f64 = 2.0;

// Snapshot heuristics
pub const DEFAULT_MEMORY_INTENSIVE_MB: f64 = 50.0;
pub const DEFAULT_POOR_CACHE_HIT_RATIO: f64 = 0.5;

// Unit conversions
pub const NANOS_PER_MILLI: f64 = 1_000_000.0;
pub const BYTES_PER_MB: f64 = 1_048_576.0;
