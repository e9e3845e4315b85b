//! Storage traits for the long-term and short-term tiers.
//!
//! Implementations do their blocking I/O off the async runtime, so a call
//! waiting on one session's rows never stalls callers working on another.

use crate::error::MemoryError;
use crate::model::{LongTermRecord, NewRecord, RetrievalResult, Role, SessionSummary, Turn};
use async_trait::async_trait;
use uuid::Uuid;

/// Owner-partitioned store of embedded long-term memories.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embedding dimension every record must match.
    fn dimension(&self) -> usize;

    /// Insert a record and return its id.
    async fn insert(&self, owner_id: &str, record: NewRecord) -> Result<Uuid, MemoryError>;

    /// Records for `owner_id` with similarity >= `min_similarity`, best first,
    /// at most `k`. Relevance is left equal to similarity.
    async fn search(
        &self,
        owner_id: &str,
        query_embedding: &[f32],
        k: usize,
        min_similarity: f64,
    ) -> Result<Vec<RetrievalResult>, MemoryError>;

    /// Bump `access_count` and refresh `last_accessed`.
    async fn touch(&self, id: Uuid) -> Result<(), MemoryError> {
        self.touch_many(&[id]).await.map(|_| ())
    }

    /// Touch several records at once; either all are updated or none.
    async fn touch_many(&self, ids: &[Uuid]) -> Result<usize, MemoryError>;

    /// Fetch a single record.
    async fn get(&self, id: Uuid) -> Result<Option<LongTermRecord>, MemoryError>;

    /// All records for an owner, newest first.
    async fn list_all(&self, owner_id: &str) -> Result<Vec<LongTermRecord>, MemoryError>;

    /// Delete a record; returns whether it existed.
    async fn delete(&self, id: Uuid) -> Result<bool, MemoryError>;

    /// Remove every record for an owner in one transaction.
    async fn purge_owner(&self, owner_id: &str) -> Result<usize, MemoryError>;

    /// Number of records held for an owner.
    async fn count(&self, owner_id: &str) -> Result<usize, MemoryError>;
}

/// Append-only per-session log of recent turns.
#[async_trait]
pub trait ShortTermLog: Send + Sync {
    /// Append a turn.
    async fn append(&self, session_id: &str, role: Role, content: &str)
    -> Result<Turn, MemoryError>;

    /// The `limit` most recent turns, oldest first.
    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>, MemoryError>;

    /// The `n` oldest turns, oldest first.
    async fn oldest(&self, session_id: &str, n: usize) -> Result<Vec<Turn>, MemoryError>;

    /// Delete turns by id; returns the number removed.
    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<usize, MemoryError>;

    /// Every turn in the session, oldest first.
    async fn all(&self, session_id: &str) -> Result<Vec<Turn>, MemoryError>;

    /// Number of turns in the session.
    async fn count(&self, session_id: &str) -> Result<usize, MemoryError>;

    /// Drop every turn in the session.
    async fn clear(&self, session_id: &str) -> Result<usize, MemoryError>;
}

/// One running summary per session.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn get_summary(&self, session_id: &str) -> Result<Option<SessionSummary>, MemoryError>;

    /// Replace the session summary, creating it when absent.
    async fn upsert_summary(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<SessionSummary, MemoryError>;

    /// Remove the session summary; returns whether one existed.
    async fn delete_summary(&self, session_id: &str) -> Result<bool, MemoryError>;
}

/// Short-term log and summary store that can compact a chunk atomically.
#[async_trait]
pub trait ConversationStore: ShortTermLog + SummaryStore {
    /// Write the new summary and delete the folded chunk.
    ///
    /// The default writes the summary before deleting, so an interrupted
    /// compaction can duplicate content in the summary but never lose it.
    /// Stores with transactions should override this to commit both at once.
    async fn commit_compaction(
        &self,
        session_id: &str,
        summary: &str,
        chunk_ids: &[Uuid],
    ) -> Result<usize, MemoryError> {
        self.upsert_summary(session_id, summary).await?;
        self.delete_by_ids(chunk_ids).await
    }
}
