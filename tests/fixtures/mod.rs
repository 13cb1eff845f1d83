use chrono::Utc;
use query_profiler::{CounterSample, EngineConfig, MetricsSnapshot, Profiler, QueryAnalyzer, SessionSummary};

#[allow(dead_code)]
/// Profiler with private counters and no memory sampling
pub fn create_test_profiler(session_capacity: usize) -> Profiler {
    Profiler::new(EngineConfig {
        session_capacity,
        track_memory: false,
        ..EngineConfig::default()
    })
    .expect("test config is valid")
}

#[allow(dead_code)]
/// Feed the classic list view shape: one parent query, then one child query per post
pub fn feed_posts_and_comments(analyzer: &QueryAnalyzer, posts: u32, exec_ms: f64) {
    analyzer.analyze("SELECT * FROM posts", exec_ms).unwrap();
    for post_id in 1..=posts {
        let query = format!("SELECT * FROM comments WHERE post_id = {}", post_id);
        analyzer.analyze(query.as_str(), exec_ms).unwrap();
    }
}

#[allow(dead_code)]
/// Snapshot with fixed counters and timing, for classifier and store tests
pub fn create_sample_snapshot(name: &str, query_count: u64, elapsed_ms: f64) -> MetricsSnapshot {
    let elapsed_ns = (elapsed_ms * 1_000_000.0) as u64;
    MetricsSnapshot {
        operation_name: name.to_string(),
        operation_type: "view".to_string(),
        started_at: Utc::now(),
        start_time_ns: 1_000,
        end_time_ns: 1_000 + elapsed_ns,
        elapsed_ns,
        memory_start_bytes: 64 * 1024 * 1024,
        memory_end_bytes: 64 * 1024 * 1024,
        memory_peak_bytes: 64 * 1024 * 1024,
        memory_delta_bytes: 0,
        query_count,
        cache_hits: 0,
        cache_misses: 0,
        attributed: CounterSample::default(),
    }
}

#[allow(dead_code)]
pub fn create_sample_summary(name: &str, query_count: u64) -> SessionSummary {
    SessionSummary::new(create_sample_snapshot(name, query_count, 30.0), None)
}
