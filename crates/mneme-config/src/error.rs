//! Config loading and validation failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The text is not valid JSON5.
    #[error("{label} is not valid JSON5: {source}")]
    Syntax { label: String, source: json5::Error },
    /// Valid JSON5 that does not fit the config model.
    #[error("config does not fit the model: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// A cross-field rule failed.
    #[error("invalid config: {0}")]
    Invalid(String),
}
