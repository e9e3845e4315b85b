use crate::Instruction;
use async_trait::async_trait;

/// Errors returned by external completion and embedding collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The completion call failed.
    #[error("completion failed: {0}")]
    Completion(String),
    /// The embedding call failed.
    #[error("embedding failed: {0}")]
    Embedding(String),
    /// The call was cancelled or timed out by the caller.
    #[error("call cancelled")]
    Cancelled,
}

/// Stateless single-shot text completion.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Complete an ordered instruction sequence into a single text reply.
    async fn complete(&self, instructions: &[Instruction]) -> Result<String, CollaboratorError>;
}

/// Text embedding with a fixed output dimension.
///
/// Implementations must be deterministic for equal input within one model
/// version.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;

    /// Output dimension, when known ahead of time.
    fn dimension(&self) -> Option<usize> {
        None
    }
}
