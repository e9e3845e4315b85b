//! Error types for memory storage and parsing.

/// Errors returned by memory stores and helpers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// No pooled connection could be checked out.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    /// A blocking store task panicked or was aborted.
    #[error("storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Embedding length does not match the store dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A stored or submitted record is malformed.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    /// A ranking or retention parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
