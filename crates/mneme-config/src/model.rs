//! Configuration schema for Mneme.

use serde::{Deserialize, Serialize};

/// Root config for the Mneme memory engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MnemeConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub short_term: ShortTermConfig,
    #[serde(default)]
    pub long_term: LongTermConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl MnemeConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> MnemeConfigBuilder {
        MnemeConfigBuilder::new()
    }
}

/// Builder for assembling a `MnemeConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct MnemeConfigBuilder {
    config: MnemeConfig,
}

impl MnemeConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: MnemeConfig::default(),
        }
    }

    /// Replace the short-term window configuration.
    pub fn short_term(mut self, short_term: ShortTermConfig) -> Self {
        self.config.short_term = short_term;
        self
    }

    /// Replace the long-term store configuration.
    pub fn long_term(mut self, long_term: LongTermConfig) -> Self {
        self.config.long_term = long_term;
        self
    }

    /// Replace the relevance ranking configuration.
    pub fn ranking(mut self, ranking: RankingConfig) -> Self {
        self.config.ranking = ranking;
        self
    }

    /// Replace the context assembly configuration.
    pub fn context(mut self, context: ContextConfig) -> Self {
        self.config.context = context;
        self
    }

    /// Replace the storage configuration.
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Finalize and return the built `MnemeConfig`.
    pub fn build(self) -> MnemeConfig {
        self.config
    }
}

/// Strategy used to keep the short-term window bounded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetentionStrategyKind {
    /// Drop the oldest turns beyond `max_messages`.
    #[default]
    Trim,
    /// Fold the oldest chunk of turns into a running summary.
    Summarize,
}

/// Short-term window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortTermConfig {
    #[serde(default)]
    pub strategy: RetentionStrategyKind,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_summary_threshold")]
    pub summary_threshold: usize,
    #[serde(default = "default_summary_chunk_size")]
    pub summary_chunk_size: usize,
    #[serde(default = "default_window_limit")]
    pub window_limit: usize,
}

impl Default for ShortTermConfig {
    fn default() -> Self {
        Self {
            strategy: RetentionStrategyKind::default(),
            max_messages: default_max_messages(),
            summary_threshold: default_summary_threshold(),
            summary_chunk_size: default_summary_chunk_size(),
            window_limit: default_window_limit(),
        }
    }
}

/// Default trim bound for the short-term log.
fn default_max_messages() -> usize {
    10
}

/// Default turn count that triggers summarization.
fn default_summary_threshold() -> usize {
    10
}

/// Default number of turns folded into the summary per compaction.
fn default_summary_chunk_size() -> usize {
    6
}

/// Default number of recent turns read into the context.
fn default_window_limit() -> usize {
    10
}

/// Long-term store and extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default = "default_extract_every")]
    pub extract_every: usize,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

impl Default for LongTermConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            extract_every: default_extract_every(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

/// Default number of long-term records retrieved per query.
fn default_top_k() -> usize {
    5
}

/// Default cosine similarity floor for retrieval.
fn default_min_similarity() -> f64 {
    0.7
}

/// Default extraction cadence (attempt after every exchange).
fn default_extract_every() -> usize {
    1
}

/// Default embedding dimension (all-MiniLM-L6-v2).
fn default_embedding_dim() -> usize {
    384
}

/// Relevance scoring weights and emphasis thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f64,
    #[serde(default = "default_importance_weight")]
    pub importance_weight: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            similarity_weight: default_similarity_weight(),
            importance_weight: default_importance_weight(),
            high_threshold: default_high_threshold(),
            medium_threshold: default_medium_threshold(),
        }
    }
}

fn default_similarity_weight() -> f64 {
    0.7
}

fn default_importance_weight() -> f64 {
    0.3
}

fn default_high_threshold() -> f64 {
    0.85
}

fn default_medium_threshold() -> f64 {
    0.70
}

/// Context assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Durable storage settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// SQLite database path; in-memory when unset.
    #[serde(default)]
    pub path: Option<String>,
}
