//! Builder wiring stores, collaborators, and config into a `MemoryEngine`.

use super::{EngineSettings, MemoryEngine};
use crate::context::ContextAssembler;
use crate::error::MnemeError;
use crate::retention::RetentionPolicy;
use crate::sessions::{ExchangeCounters, SessionLocks};
use log::info;
use mneme_config::MnemeConfig;
use mneme_memory::{ConversationStore, RelevanceRanker, SqliteMemoryStore, VectorStore};
use mneme_protocol::{Completer, Embedder};
use std::sync::Arc;

/// Assemble a [`MemoryEngine`].
///
/// Stores default to one SQLite database at `storage.path`, or an in-memory
/// database when no path is configured.
pub struct MemoryEngineBuilder {
    completer: Arc<dyn Completer>,
    embedder: Arc<dyn Embedder>,
    config: MnemeConfig,
    vector_store: Option<Arc<dyn VectorStore>>,
    conversation_store: Option<Arc<dyn ConversationStore>>,
}

impl std::fmt::Debug for MemoryEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngineBuilder")
            .field("config", &self.config)
            .field("vector_store", &self.vector_store.is_some())
            .field("conversation_store", &self.conversation_store.is_some())
            .finish()
    }
}

impl MemoryEngineBuilder {
    pub fn new(completer: Arc<dyn Completer>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            completer,
            embedder,
            config: MnemeConfig::default(),
            vector_store: None,
            conversation_store: None,
        }
    }

    /// Replace the engine configuration.
    pub fn config(mut self, config: MnemeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an explicit long-term store.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Use an explicit short-term and summary store.
    pub fn conversation_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.conversation_store = Some(store);
        self
    }

    /// Use one SQLite store for both tiers.
    pub fn sqlite_store(self, store: Arc<SqliteMemoryStore>) -> Self {
        self.vector_store(store.clone()).conversation_store(store)
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<MemoryEngine, MnemeError> {
        let config = self.config;
        config.validate()?;

        let dimension = config.long_term.embedding_dim;
        if let Some(embedder_dimension) = self.embedder.dimension()
            && embedder_dimension != dimension
        {
            return Err(MnemeError::InvariantViolation(format!(
                "embedder dimension {embedder_dimension} does not match long_term.embedding_dim {dimension}"
            )));
        }

        let (vector_store, conversation_store): (Arc<dyn VectorStore>, Arc<dyn ConversationStore>) =
            match (self.vector_store, self.conversation_store) {
                (Some(vectors), Some(conversations)) => (vectors, conversations),
                (vectors, conversations) => {
                    let sqlite = Arc::new(open_configured_store(&config)?);
                    let vectors: Arc<dyn VectorStore> = match vectors {
                        Some(vectors) => vectors,
                        None => sqlite.clone(),
                    };
                    let conversations: Arc<dyn ConversationStore> = match conversations {
                        Some(conversations) => conversations,
                        None => sqlite,
                    };
                    (vectors, conversations)
                }
            };
        if vector_store.dimension() != dimension {
            return Err(MnemeError::InvariantViolation(format!(
                "vector store dimension {} does not match long_term.embedding_dim {dimension}",
                vector_store.dimension()
            )));
        }

        let retention = RetentionPolicy::from_config(&config.short_term)?;
        let ranker = RelevanceRanker::new(
            config.ranking.similarity_weight,
            config.ranking.importance_weight,
        )
        .and_then(|ranker| {
            ranker.with_thresholds(
                config.ranking.high_threshold,
                config.ranking.medium_threshold,
            )
        })
        .map_err(|err| MnemeError::InvariantViolation(err.to_string()))?;
        let assembler = ContextAssembler::new(config.context.system_prompt.clone());
        let settings = EngineSettings {
            top_k: config.long_term.top_k,
            min_similarity: config.long_term.min_similarity,
            extract_every: config.long_term.extract_every,
            window_limit: config.short_term.window_limit,
        };

        info!(
            "memory engine ready (retention={:?}, top_k={}, min_similarity={}, extract_every={}, dimension={})",
            retention, settings.top_k, settings.min_similarity, settings.extract_every, dimension
        );
        Ok(MemoryEngine {
            vectors: vector_store,
            conversations: conversation_store,
            completer: self.completer,
            embedder: self.embedder,
            retention,
            ranker,
            assembler,
            settings,
            locks: SessionLocks::default(),
            counters: ExchangeCounters::default(),
        })
    }
}

fn open_configured_store(config: &MnemeConfig) -> Result<SqliteMemoryStore, MnemeError> {
    let dimension = config.long_term.embedding_dim;
    let store = match config.storage.path.as_deref() {
        Some(path) => SqliteMemoryStore::open(path, dimension)?,
        None => SqliteMemoryStore::open_in_memory(dimension)?,
    };
    Ok(store)
}
