//! Memory engine facade coordinating both memory tiers for a turn.
//!
//! Every operation that names a session holds that session's lock for its
//! whole duration. Turn-level helpers take the lock once and call the
//! unlocked internals.

mod builder;

pub use builder::MemoryEngineBuilder;

use crate::context::{ContextAssembler, ContextStats};
use crate::error::MnemeError;
use crate::prompts::extraction_prompt;
use crate::retention::{MaintenanceReport, RetentionPolicy};
use crate::sessions::{ExchangeCounters, SessionLocks};
use log::{debug, info, warn};
use mneme_memory::{
    ConversationStore, ExtractionOutcome, LongTermRecord, MAX_IMPORTANCE, MIN_IMPORTANCE,
    NewRecord, RelevanceRanker, RetrievalResult, Role, Turn, VectorStore, parse_extraction,
};
use mneme_protocol::{CollaboratorError, Completer, Embedder, Instruction};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Retrieval and extraction knobs resolved from config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineSettings {
    pub(crate) top_k: usize,
    pub(crate) min_similarity: f64,
    pub(crate) extract_every: usize,
    pub(crate) window_limit: usize,
}

/// Record counts for an owner and session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub long_term: usize,
    pub short_term: usize,
    pub summary_present: bool,
}

/// What an owner-wide clear removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub long_term_removed: usize,
    pub short_term_removed: usize,
    pub summary_removed: bool,
}

/// Everything needed to call the reply model for one turn.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub instructions: Vec<Instruction>,
    pub recollections: Vec<RetrievalResult>,
    pub maintenance: MaintenanceReport,
    pub stats: ContextStats,
}

/// Result of a full turn through the engine.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    /// Whether a long-term memory was admitted after the exchange.
    pub extracted: bool,
    pub maintenance: MaintenanceReport,
    pub recollections: Vec<RetrievalResult>,
    pub stats: ContextStats,
}

/// Two-tier conversational memory: a bounded per-session window and an
/// owner-partitioned long-term store.
pub struct MemoryEngine {
    vectors: Arc<dyn VectorStore>,
    conversations: Arc<dyn ConversationStore>,
    completer: Arc<dyn Completer>,
    embedder: Arc<dyn Embedder>,
    retention: RetentionPolicy,
    ranker: RelevanceRanker,
    assembler: ContextAssembler,
    settings: EngineSettings,
    locks: SessionLocks,
    counters: ExchangeCounters,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("retention", &self.retention)
            .field("ranker", &self.ranker)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MemoryEngine {
    /// Start building an engine around the two collaborators.
    pub fn builder(
        completer: Arc<dyn Completer>,
        embedder: Arc<dyn Embedder>,
    ) -> MemoryEngineBuilder {
        MemoryEngineBuilder::new(completer, embedder)
    }

    /// Retention strategy selected at construction.
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Assembler used for turn contexts.
    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    /// Ranked long-term memories for a query.
    ///
    /// Returns an empty vector when nothing clears the similarity floor.
    /// Every returned record is touched.
    pub async fn retrieve_for_query(
        &self,
        owner_id: &str,
        query_text: &str,
    ) -> Result<Vec<RetrievalResult>, MnemeError> {
        require_id("owner_id", owner_id)?;
        let embedding = self.embedder.embed(query_text).await?;
        self.check_embedding(&embedding)?;

        let results = self
            .vectors
            .search(
                owner_id,
                &embedding,
                self.settings.top_k,
                self.settings.min_similarity,
            )
            .await?;
        let ranked = self.ranker.rank(results);
        let ids: Vec<Uuid> = ranked.iter().map(|result| result.record.id).collect();
        self.vectors.touch_many(&ids).await?;
        debug!(
            "retrieved long-term memories (owner_id={}, returned={})",
            owner_id,
            ranked.len()
        );
        Ok(ranked)
    }

    /// Count an exchange and, on cadence, try to admit a long-term memory.
    ///
    /// Classifier and embedder failures resolve to `false`.
    pub async fn maybe_extract(
        &self,
        owner_id: &str,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<bool, MnemeError> {
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        self.extract_locked(owner_id, session_id, user_text, assistant_text)
            .await
    }

    /// Apply the retention strategy to a session.
    pub async fn housekeeping(&self, session_id: &str) -> Result<MaintenanceReport, MnemeError> {
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        self.housekeeping_locked(session_id).await
    }

    /// Run the extraction classifier over a batch of exchanges, ignoring the
    /// cadence. Returns how many memories were admitted.
    ///
    /// Classifier and embedder failures skip that exchange; storage errors
    /// abort the batch.
    pub async fn extract_exchanges(
        &self,
        owner_id: &str,
        exchanges: &[(&str, &str)],
    ) -> Result<usize, MnemeError> {
        require_id("owner_id", owner_id)?;
        let mut admitted = 0;
        for (user_text, assistant_text) in exchanges {
            if self.admit(owner_id, user_text, assistant_text).await? {
                admitted += 1;
            }
        }
        info!(
            "batch extraction finished (owner_id={}, exchanges={}, admitted={})",
            owner_id,
            exchanges.len(),
            admitted
        );
        Ok(admitted)
    }

    /// All long-term memories for an owner, newest first.
    pub async fn list_memories(&self, owner_id: &str) -> Result<Vec<LongTermRecord>, MnemeError> {
        require_id("owner_id", owner_id)?;
        Ok(self.vectors.list_all(owner_id).await?)
    }

    /// Delete one long-term memory; returns whether it existed.
    pub async fn delete_memory(&self, id: Uuid) -> Result<bool, MnemeError> {
        let removed = self.vectors.delete(id).await?;
        info!("deleted memory (id={}, removed={})", id, removed);
        Ok(removed)
    }

    /// Remove every long-term memory for an owner.
    pub async fn purge_owner(&self, owner_id: &str) -> Result<usize, MnemeError> {
        require_id("owner_id", owner_id)?;
        Ok(self.vectors.purge_owner(owner_id).await?)
    }

    /// Forget everything held for a user: their long-term memories plus the
    /// session's turns, summary, and exchange counter.
    pub async fn clear_user_data(
        &self,
        owner_id: &str,
        session_id: &str,
    ) -> Result<ClearReport, MnemeError> {
        require_id("owner_id", owner_id)?;
        require_id("session_id", session_id)?;
        let guard = self.locks.acquire(session_id).await;
        let cleared = async {
            let long_term_removed = self.vectors.purge_owner(owner_id).await?;
            let (short_term_removed, summary_removed) = self.clear_locked(session_id).await?;
            Ok::<_, MnemeError>(ClearReport {
                long_term_removed,
                short_term_removed,
                summary_removed,
            })
        }
        .await;
        drop(guard);
        self.locks.release(session_id);
        let report = cleared?;
        info!(
            "cleared user data (owner_id={}, session_id={}, long_term={}, short_term={}, summary={})",
            owner_id,
            session_id,
            report.long_term_removed,
            report.short_term_removed,
            report.summary_removed
        );
        Ok(report)
    }

    /// Record a turn in the session's short-term log.
    pub async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Turn, MnemeError> {
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        Ok(self.conversations.append(session_id, role, content).await?)
    }

    /// The configured window of recent turns, oldest first.
    pub async fn recent_turns(&self, session_id: &str) -> Result<Vec<Turn>, MnemeError> {
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        Ok(self
            .conversations
            .recent(session_id, self.settings.window_limit)
            .await?)
    }

    /// The session's running summary, if compaction has produced one.
    pub async fn session_summary(&self, session_id: &str) -> Result<Option<String>, MnemeError> {
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        Ok(self
            .conversations
            .get_summary(session_id)
            .await?
            .map(|summary| summary.summary_text))
    }

    /// Drop a session's turns, summary, and exchange counter.
    pub async fn clear_session(&self, session_id: &str) -> Result<usize, MnemeError> {
        require_id("session_id", session_id)?;
        let guard = self.locks.acquire(session_id).await;
        let cleared = self.clear_locked(session_id).await;
        drop(guard);
        self.locks.release(session_id);
        let (removed, _) = cleared?;
        info!(
            "cleared session (session_id={}, removed_turns={})",
            session_id, removed
        );
        Ok(removed)
    }

    /// Record counts for an owner and a session.
    pub async fn stats(&self, owner_id: &str, session_id: &str) -> Result<MemoryStats, MnemeError> {
        require_id("owner_id", owner_id)?;
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        Ok(MemoryStats {
            long_term: self.vectors.count(owner_id).await?,
            short_term: self.conversations.count(session_id).await?,
            summary_present: self
                .conversations
                .get_summary(session_id)
                .await?
                .is_some(),
        })
    }

    /// Store the user turn, maintain the window, retrieve memories, and
    /// assemble the reply context.
    pub async fn prepare_turn(
        &self,
        owner_id: &str,
        session_id: &str,
        user_text: &str,
        system_prompt: Option<&str>,
    ) -> Result<PreparedTurn, MnemeError> {
        require_id("owner_id", owner_id)?;
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        self.prepare_locked(owner_id, session_id, user_text, system_prompt)
            .await
    }

    /// Store the assistant turn and run the extraction cadence.
    pub async fn complete_turn(
        &self,
        owner_id: &str,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<bool, MnemeError> {
        require_id("owner_id", owner_id)?;
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;
        self.complete_locked(owner_id, session_id, user_text, assistant_text)
            .await
    }

    /// Run a whole turn: prepare, ask the completer for a reply, complete.
    ///
    /// A failed reply surfaces as `ExternalCallFailed`; the user turn has
    /// already been stored by then.
    pub async fn run_turn(
        &self,
        owner_id: &str,
        session_id: &str,
        user_text: &str,
    ) -> Result<TurnOutcome, MnemeError> {
        require_id("owner_id", owner_id)?;
        require_id("session_id", session_id)?;
        let _guard = self.locks.acquire(session_id).await;

        let prepared = self
            .prepare_locked(owner_id, session_id, user_text, None)
            .await?;
        let reply = self.completer.complete(&prepared.instructions).await?;
        let extracted = self
            .complete_locked(owner_id, session_id, user_text, &reply)
            .await?;
        Ok(TurnOutcome {
            reply,
            extracted,
            maintenance: prepared.maintenance,
            recollections: prepared.recollections,
            stats: prepared.stats,
        })
    }

    /// Turns removed and whether a summary existed.
    async fn clear_locked(&self, session_id: &str) -> Result<(usize, bool), MnemeError> {
        let removed = self.conversations.clear(session_id).await?;
        let summary_removed = self.conversations.delete_summary(session_id).await?;
        self.counters.reset(session_id);
        Ok((removed, summary_removed))
    }

    async fn housekeeping_locked(&self, session_id: &str) -> Result<MaintenanceReport, MnemeError> {
        self.retention
            .maintain(
                self.conversations.as_ref(),
                self.completer.as_ref(),
                session_id,
            )
            .await
    }

    async fn prepare_locked(
        &self,
        owner_id: &str,
        session_id: &str,
        user_text: &str,
        system_prompt: Option<&str>,
    ) -> Result<PreparedTurn, MnemeError> {
        self.conversations
            .append(session_id, Role::User, user_text)
            .await?;
        let maintenance = self.housekeeping_locked(session_id).await?;
        let recollections = self.retrieve_for_query(owner_id, user_text).await?;
        let turns = self
            .conversations
            .recent(session_id, self.settings.window_limit)
            .await?;
        let summary = self.conversations.get_summary(session_id).await?;
        let instructions = self.assembler.assemble_with_summary(
            &recollections,
            summary.as_ref().map(|summary| summary.summary_text.as_str()),
            &turns,
            system_prompt,
        );
        let stats = ContextAssembler::stats(&instructions);
        debug!(
            "prepared turn (session_id={}, instructions={}, memories={}, estimated_tokens={})",
            session_id,
            stats.total,
            recollections.len(),
            stats.estimated_tokens
        );
        Ok(PreparedTurn {
            instructions,
            recollections,
            maintenance,
            stats,
        })
    }

    async fn complete_locked(
        &self,
        owner_id: &str,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<bool, MnemeError> {
        self.conversations
            .append(session_id, Role::Assistant, assistant_text)
            .await?;
        self.extract_locked(owner_id, session_id, user_text, assistant_text)
            .await
    }

    async fn extract_locked(
        &self,
        owner_id: &str,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<bool, MnemeError> {
        require_id("owner_id", owner_id)?;
        if !self
            .counters
            .tick(session_id, self.settings.extract_every)
        {
            return Ok(false);
        }

        self.admit(owner_id, user_text, assistant_text).await
    }

    /// Classify one exchange and store what it yields.
    async fn admit(
        &self,
        owner_id: &str,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<bool, MnemeError> {
        let prompt = extraction_prompt(user_text, assistant_text);
        let raw = match self.completer.complete(&[Instruction::user(prompt)]).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    "extraction classifier failed (owner_id={}, error={})",
                    owner_id, err
                );
                return Ok(false);
            }
        };
        let extracted = match parse_extraction(&raw) {
            ExtractionOutcome::Remember(extracted) => extracted,
            ExtractionOutcome::Nothing => {
                debug!("nothing worth remembering (owner_id={})", owner_id);
                return Ok(false);
            }
        };
        if !(MIN_IMPORTANCE..=MAX_IMPORTANCE).contains(&extracted.importance) {
            return Err(MnemeError::InvariantViolation(format!(
                "importance {} outside [{MIN_IMPORTANCE}, {MAX_IMPORTANCE}] after clamping",
                extracted.importance
            )));
        }

        let embedding = match self.embedder.embed(&extracted.content).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(
                    "extraction embedding failed (owner_id={}, error={})",
                    owner_id, err
                );
                return Ok(false);
            }
        };
        if let Err(err) = self.check_embedding(&embedding) {
            warn!(
                "extraction embedding rejected (owner_id={}, error={})",
                owner_id, err
            );
            return Ok(false);
        }

        let id = self
            .vectors
            .insert(
                owner_id,
                NewRecord {
                    content: extracted.content,
                    category: extracted.category,
                    importance: extracted.importance,
                    embedding,
                },
            )
            .await?;
        info!(
            "admitted long-term memory (owner_id={}, id={}, category={}, importance={})",
            owner_id, id, extracted.category, extracted.importance
        );
        Ok(true)
    }

    fn check_embedding(&self, embedding: &[f32]) -> Result<(), MnemeError> {
        let expected = self.vectors.dimension();
        if embedding.len() == expected {
            Ok(())
        } else {
            Err(MnemeError::ExternalCallFailed(CollaboratorError::Embedding(
                format!(
                    "expected {expected}-dimensional embedding, got {}",
                    embedding.len()
                ),
            )))
        }
    }
}

fn require_id(name: &str, value: &str) -> Result<(), MnemeError> {
    if value.trim().is_empty() {
        Err(MnemeError::InvariantViolation(format!(
            "{name} must not be empty"
        )))
    } else {
        Ok(())
    }
}
