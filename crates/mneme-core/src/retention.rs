//! Short-term window retention: fixed-size trimming or chunked summarization.

use crate::error::MnemeError;
use crate::prompts::{render_transcript, summarize_prompt};
use log::{debug, info, warn};
use mneme_config::{RetentionStrategyKind, ShortTermConfig};
use mneme_memory::ConversationStore;
use mneme_protocol::{Completer, Instruction};
use serde::Serialize;
use uuid::Uuid;

/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Turns removed from the short-term log.
    pub deleted_count: usize,
    /// Whether the running summary was rewritten.
    pub summary_updated: bool,
}

/// Strategy keeping a session's short-term log bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Drop the oldest turns once the log exceeds `max_messages`.
    Trim { max_messages: usize },
    /// Fold the oldest `chunk_size` turns into the summary once the log
    /// exceeds `threshold`.
    Summarize { threshold: usize, chunk_size: usize },
}

impl RetentionPolicy {
    pub fn trim(max_messages: usize) -> Result<Self, MnemeError> {
        if max_messages == 0 {
            return Err(MnemeError::InvariantViolation(
                "trim max_messages must be at least 1".to_string(),
            ));
        }
        Ok(Self::Trim { max_messages })
    }

    pub fn summarize(threshold: usize, chunk_size: usize) -> Result<Self, MnemeError> {
        if chunk_size == 0 || chunk_size > threshold {
            return Err(MnemeError::InvariantViolation(format!(
                "summarize chunk_size must be between 1 and threshold (threshold={threshold}, chunk_size={chunk_size})"
            )));
        }
        Ok(Self::Summarize {
            threshold,
            chunk_size,
        })
    }

    /// Select the configured strategy.
    pub fn from_config(config: &ShortTermConfig) -> Result<Self, MnemeError> {
        match config.strategy {
            RetentionStrategyKind::Trim => Self::trim(config.max_messages),
            RetentionStrategyKind::Summarize => {
                Self::summarize(config.summary_threshold, config.summary_chunk_size)
            }
        }
    }

    /// Apply the strategy to one session.
    ///
    /// All writes happen after the completion call returns, so dropping the
    /// future leaves the store untouched.
    pub async fn maintain(
        &self,
        store: &dyn ConversationStore,
        completer: &dyn Completer,
        session_id: &str,
    ) -> Result<MaintenanceReport, MnemeError> {
        match *self {
            Self::Trim { max_messages } => trim(store, session_id, max_messages).await,
            Self::Summarize {
                threshold,
                chunk_size,
            } => summarize(store, completer, session_id, threshold, chunk_size).await,
        }
    }
}

async fn trim(
    store: &dyn ConversationStore,
    session_id: &str,
    max_messages: usize,
) -> Result<MaintenanceReport, MnemeError> {
    let count = store.count(session_id).await?;
    if count <= max_messages {
        return Ok(MaintenanceReport::default());
    }
    let excess = count - max_messages;
    let ids: Vec<Uuid> = store
        .oldest(session_id, excess)
        .await?
        .into_iter()
        .map(|turn| turn.id)
        .collect();
    let deleted_count = store.delete_by_ids(&ids).await?;
    info!(
        "trimmed short-term log (session_id={}, deleted={}, max_messages={})",
        session_id, deleted_count, max_messages
    );
    Ok(MaintenanceReport {
        deleted_count,
        summary_updated: false,
    })
}

async fn summarize(
    store: &dyn ConversationStore,
    completer: &dyn Completer,
    session_id: &str,
    threshold: usize,
    chunk_size: usize,
) -> Result<MaintenanceReport, MnemeError> {
    let count = store.count(session_id).await?;
    if count <= threshold {
        return Ok(MaintenanceReport::default());
    }
    let chunk = store.oldest(session_id, chunk_size).await?;
    let existing = store.get_summary(session_id).await?;
    let prompt = summarize_prompt(
        existing.as_ref().map(|summary| summary.summary_text.as_str()),
        &render_transcript(&chunk),
    );
    debug!(
        "summarizing chunk (session_id={}, count={}, chunk={})",
        session_id,
        count,
        chunk.len()
    );

    let summary = match completer.complete(&[Instruction::user(prompt)]).await {
        Ok(summary) => summary,
        Err(err) => {
            warn!(
                "summary completion failed; chunk kept (session_id={}, error={})",
                session_id, err
            );
            return Ok(MaintenanceReport::default());
        }
    };
    let summary = summary.trim();
    if summary.is_empty() {
        warn!(
            "summary completion returned blank text; chunk kept (session_id={})",
            session_id
        );
        return Ok(MaintenanceReport::default());
    }

    let ids: Vec<Uuid> = chunk.iter().map(|turn| turn.id).collect();
    let deleted_count = store
        .commit_compaction(session_id, summary, &ids)
        .await?;
    info!(
        "compacted short-term log (session_id={}, deleted={}, summary_len={})",
        session_id,
        deleted_count,
        summary.len()
    );
    Ok(MaintenanceReport {
        deleted_count,
        summary_updated: true,
    })
}
