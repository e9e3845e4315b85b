//! Error types for the memory engine.

use mneme_config::ConfigError;
use mneme_memory::MemoryError;
use mneme_protocol::CollaboratorError;
use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum MnemeError {
    /// A durable store failed; fatal to the operation.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] MemoryError),
    /// A completion or embedding call failed where its result is required.
    #[error("external call failed: {0}")]
    ExternalCallFailed(#[from] CollaboratorError),
    /// A caller-supplied argument or engine parameter broke an invariant.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// Engine construction from config failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
