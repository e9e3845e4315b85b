//! Memory storage, similarity search, and relevance ranking for Mneme.

pub mod error;
pub mod extraction;
pub mod model;
pub mod ranker;
pub mod sqlite;
pub mod store;
pub mod vector;

/// Memory error type.
pub use error::MemoryError;
/// Classifier output parsing.
pub use extraction::{ExtractedMemory, ExtractionOutcome, parse_extraction};
/// Memory data model.
pub use model::{
    Emphasis, LongTermRecord, MAX_IMPORTANCE, MIN_IMPORTANCE, MemoryCategory, NewRecord,
    RetrievalResult, Role, SessionSummary, Turn,
};
/// Relevance re-ranking.
pub use ranker::RelevanceRanker;
/// Default SQLite store.
pub use sqlite::SqliteMemoryStore;
/// Store interfaces.
pub use store::{ConversationStore, ShortTermLog, SummaryStore, VectorStore};
/// Embedding math.
pub use vector::cosine_similarity;
