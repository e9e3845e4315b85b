//! Locating and reading individual config layers.

use super::{ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, schema};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A parsed layer awaiting merge.
#[derive(Debug, Clone)]
pub(super) struct LoadedLayer {
    pub(super) meta: ConfigLayer,
    pub(super) value: Value,
}

impl ConfigLayerSource {
    /// Short name used in error labels.
    pub fn name(self) -> &'static str {
        match self {
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        }
    }

    /// Runtime overrides are explicit; a missing file is an error.
    fn must_exist(self) -> bool {
        matches!(self, ConfigLayerSource::Runtime)
    }
}

/// Read, parse, and schema-check one layer.
///
/// Returns `None` for a missing user or cwd file.
pub(super) fn read_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<Option<LoadedLayer>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound && !source.must_exist() => {
            debug!(
                "config layer absent (source={}, path={})",
                source.name(),
                path.display()
            );
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let label = format!("{}({})", source.name(), path.display());
    let value = parse_json5(&contents, &label)?;
    schema::validate_layer_schema(&value, &label)?;
    debug!("config layer read (label={})", label);
    Ok(Some(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        value,
    }))
}

pub(super) fn parse_json5(contents: &str, label: &str) -> Result<Value, ConfigError> {
    json5::from_str(contents).map_err(|source| ConfigError::Syntax {
        label: label.to_string(),
        source,
    })
}

/// `~/.mneme/mneme.json5`, when a home directory is known.
pub(super) fn home_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}

/// Key identifying a file regardless of how its path was spelled.
pub(super) fn identity(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
