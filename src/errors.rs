use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid session handle: {0}")]
    InvalidHandle(i64),
    #[error("Session pool exhausted ({capacity} slots in use)")]
    ResourceExhausted { capacity: usize },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ProfilerError {
    /// True for errors a caller should treat as back-pressure and retry later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProfilerError::ResourceExhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, ProfilerError>;
