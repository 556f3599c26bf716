use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a news API fetch failed. Every variant is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("API returned status {0}")]
    BadStatus(u16),

    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be written to the cache.
    #[error("failed to store news file: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("save_days must be greater than 0 (got {0})")]
    InvalidRetention(i64),

    #[error("failed to access cache directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("'{0}' requires admin permission")]
    PermissionDenied(String),
}
