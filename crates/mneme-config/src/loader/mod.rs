//! Layered configuration loader.
//!
//! Discovers configuration layers (user, cwd, runtime overrides), validates
//! their schema, merges them, and produces a final `MnemeConfig`.

mod discovery;
mod merge;
mod schema;


use crate::{ConfigError, MnemeConfig, RetentionStrategyKind};
use discovery::LoadedLayer;
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "mneme.json5";
/// Default config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".mneme";
/// Tolerance used when checking that ranking weights sum to one.
const WEIGHT_EPSILON: f64 = 1e-6;

/// Merged config and the layers that produced it.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// Validated result of the merge.
    pub config: MnemeConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
}

/// Where a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// `~/.mneme/mneme.json5`.
    User,
    /// `mneme.json5` in the working directory.
    Cwd,
    /// Runtime overrides (highest precedence).
    Runtime,
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    /// Layer origin.
    pub source: ConfigLayerSource,
    /// Location on disk.
    pub path: Option<PathBuf>,
}

/// Layer locations for `load_layered_with_options`.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to resolve the cwd layer.
    pub cwd: PathBuf,
    /// Optional user config path (defaults to `~/.mneme/mneme.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Override files, applied last in order.
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    /// Default user path plus the cwd layer for `cwd`.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            user_config_path: discovery::home_config_path(),
            runtime_paths: Vec::new(),
        }
    }

    /// Override the user config location.
    pub fn with_user_path(mut self, path: impl AsRef<Path>) -> Self {
        self.user_config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Append a runtime override file; it must exist.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl MnemeConfig {
    /// Load one config file without layering.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config (path={})", path.display());
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        config_from_str(&contents, &path.display().to_string())
    }

    /// Load config from JSON5 text without layering.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from text (len={})", contents.len());
        config_from_str(contents, "config")
    }

    /// Load the user, cwd, and no runtime layers for `cwd`.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Merge layers in precedence order: user, cwd, then runtime overrides.
    ///
    /// A file reached through more than one layer is applied once.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let mut sources: Vec<(ConfigLayerSource, PathBuf)> = Vec::new();
        if let Some(path) = options.user_config_path {
            sources.push((ConfigLayerSource::User, path));
        }
        sources.push((ConfigLayerSource::Cwd, options.cwd.join(DEFAULT_CONFIG_FILE)));
        sources.extend(
            options
                .runtime_paths
                .into_iter()
                .map(|path| (ConfigLayerSource::Runtime, path)),
        );

        let mut merged = Value::Object(serde_json::Map::new());
        let mut applied = HashSet::new();
        let mut layers = Vec::new();
        for (source, path) in sources {
            let Some(LoadedLayer { meta, value }) = discovery::read_layer(source, &path)? else {
                continue;
            };
            if !applied.insert(discovery::identity(&path)) {
                debug!(
                    "config layer already applied (source={}, path={})",
                    source.name(),
                    path.display()
                );
                continue;
            }
            merge::merge_json_values(&mut merged, &value);
            layers.push(meta);
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Cross-field checks the schema pass cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let short_term = &self.short_term;
        if short_term.max_messages == 0 {
            return Err(ConfigError::Invalid(
                "short_term.max_messages must be at least 1".to_string(),
            ));
        }
        if short_term.strategy == RetentionStrategyKind::Summarize
            && (short_term.summary_chunk_size == 0
                || short_term.summary_chunk_size > short_term.summary_threshold)
        {
            return Err(ConfigError::Invalid(
                "short_term.summary_chunk_size must be between 1 and summary_threshold"
                    .to_string(),
            ));
        }

        let long_term = &self.long_term;
        if long_term.top_k == 0 {
            return Err(ConfigError::Invalid(
                "long_term.top_k must be at least 1".to_string(),
            ));
        }
        if long_term.extract_every == 0 {
            return Err(ConfigError::Invalid(
                "long_term.extract_every must be at least 1".to_string(),
            ));
        }
        if long_term.embedding_dim == 0 {
            return Err(ConfigError::Invalid(
                "long_term.embedding_dim must be at least 1".to_string(),
            ));
        }
        ensure_unit_interval(long_term.min_similarity, "long_term.min_similarity")?;

        let ranking = &self.ranking;
        ensure_unit_interval(ranking.similarity_weight, "ranking.similarity_weight")?;
        ensure_unit_interval(ranking.importance_weight, "ranking.importance_weight")?;
        ensure_unit_interval(ranking.high_threshold, "ranking.high_threshold")?;
        ensure_unit_interval(ranking.medium_threshold, "ranking.medium_threshold")?;
        if (ranking.similarity_weight + ranking.importance_weight - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::Invalid(
                "ranking weights must sum to 1".to_string(),
            ));
        }
        if ranking.medium_threshold > ranking.high_threshold {
            return Err(ConfigError::Invalid(
                "ranking.medium_threshold must not exceed ranking.high_threshold".to_string(),
            ));
        }

        Ok(())
    }
}

fn ensure_unit_interval(value: f64, path: &str) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidField {
            path: path.to_string(),
            message: "expected a value between 0 and 1".to_string(),
        })
    }
}

fn config_from_str(contents: &str, label: &str) -> Result<MnemeConfig, ConfigError> {
    let value = discovery::parse_json5(contents, label)?;
    config_from_value(value, label)
}

fn config_from_value(value: Value, label: &str) -> Result<MnemeConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: MnemeConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
