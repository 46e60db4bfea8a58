//! Error kinds surfaced by the memory core.
//!
//! Library code returns [`MemoryError`]; the binary and the config loader wrap
//! everything in `anyhow` at the edges.

use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to (or interpreting the answer of) an embedding provider.
///
/// Always transient from the store's point of view: the whole `remember` or
/// `recall` call may be retried, nothing was applied.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timed out after {0} ms")]
    Timeout(u64),

    #[error("embedding has {actual} dimensions, store expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding task failed: {0}")]
    Task(String),

    #[error("embedding provider not configured: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidResponse(_)
            | Self::DimensionMismatch { .. }
            | Self::Task(_)
            | Self::Unavailable(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The snapshot on disk is unusable. Callers choose between a backup and an empty store.
    #[error("corrupt snapshot at {}: {reason}", path.display())]
    Corruption { path: PathBuf, reason: String },

    #[error("memory not found: {0}")]
    NotFound(u64),

    /// Eviction could not bring the store back to capacity. Always a bug.
    #[error("eviction left {size} records in a store with capacity {capacity}")]
    CapacityInvariant { size: usize, capacity: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    pub(crate) fn corruption(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corruption {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = MemoryError> = std::result::Result<T, E>;
