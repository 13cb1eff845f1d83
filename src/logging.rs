//! Logging setup for hosts embedding the profiler
//!
//! Console output for humans plus a rotating file (JSON by default) that can be
//! correlated with stored session summaries afterwards.

use crate::errors::{ProfilerError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// File name prefix of every log file the profiler writes
pub const LOG_FILE_PREFIX: &str = "query_profiler";
pub const DEFAULT_LEVEL_FILTER: &str = "info,query_profiler=info";

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub log_dir: String,
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    pub level_filter: String,
    pub rotation: LogRotation,
    pub console_timestamps: bool,
    pub file_json_format: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    /// Requested size limit in MB; rolled daily since the appender has no size trigger
    SizeBased(u64),
}

impl FromStr for LogRotation {
    type Err = ProfilerError;

    /// Accepts `"daily"`, `"hourly"` or `"size:<MB>"`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(LogRotation::Daily),
            "hourly" => Ok(LogRotation::Hourly),
            other => other
                .strip_prefix("size:")
                .and_then(|mb| mb.parse().ok())
                .map(LogRotation::SizeBased)
                .ok_or_else(|| ProfilerError::Config(format!("unknown log rotation '{}'", other))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            level_filter: DEFAULT_LEVEL_FILTER.to_string(),
            rotation: LogRotation::Daily,
            console_timestamps: true,
            file_json_format: true,
        }
    }
}

/// Initialize console + rotating file logging.
///
/// Files are named `query_profiler.log.YYYY-MM-DD` (or `-HH` for hourly
/// rotation) inside `log_dir`. The returned guard flushes the background
/// writer on drop and must outlive the host's use of the profiler.
pub fn init_dual_logging(config: LoggingConfig) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)?;

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level_filter));
    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level_filter));

    let file_name = format!("{}.log", LOG_FILE_PREFIX);
    let file_appender = match config.rotation {
        LogRotation::Hourly => tracing_appender::rolling::hourly(&config.log_dir, file_name),
        LogRotation::Daily | LogRotation::SizeBased(_) => {
            tracing_appender::rolling::daily(&config.log_dir, file_name)
        }
    };
    let (file_writer, guard) = non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_level(true)
        .with_target(true)
        .with_timer(if config.console_timestamps {
            ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string())
        } else {
            ChronoUtc::new(String::new())
        })
        .with_filter(console_filter);

    let file_layer = if config.file_json_format {
        fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()))
            .with_filter(file_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_timer(ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string()))
            .with_filter(file_filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ProfilerError::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        log_dir = %config.log_dir,
        rotation = ?config.rotation,
        json_format = config.file_json_format,
        "📁 Dual logging initialized - console + rotating files"
    );
    Ok(guard)
}

/// Console-only logging for tests and small tools
pub fn init_simple_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL_FILTER)),
        )
        .try_init()
        .map_err(|e| ProfilerError::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!("🖥️ Simple console logging initialized");
    Ok(())
}

fn is_profiler_log(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX) && name.contains(".log"))
            .unwrap_or(false)
}

/// Profiler log files in `log_dir`, sorted by name
pub fn get_current_log_files(log_dir: impl AsRef<Path>) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(log_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| is_profiler_log(path))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

/// Remove profiler log files last modified more than `keep_days` ago
pub fn cleanup_old_logs(log_dir: impl AsRef<Path>, keep_days: u32) -> Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(keep_days as u64 * 24 * 3600))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for path in get_current_log_files(log_dir) {
        let modified = path.metadata().and_then(|m| m.modified());
        if matches!(modified, Ok(t) if t < cutoff) && std::fs::remove_file(&path).is_ok() {
            removed += 1;
            tracing::debug!("🗑️ Removed old log file: {:?}", path);
        }
    }

    if removed > 0 {
        tracing::info!("🧹 Cleaned up {} old log files (older than {} days)", removed, keep_days);
    }
    Ok(removed)
}

pub fn log_system_info() {
    tracing::info!(
        package_version = env!("CARGO_PKG_VERSION"),
        target_arch = std::env::consts::ARCH,
        target_os = std::env::consts::OS,
        cpu_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        "📊 Environment information logged"
    );
}
