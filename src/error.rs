use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropfigError {
    #[error("Malformed key path '{path}': empty segment")]
    MalformedPath { path: String },

    #[error("Failed to parse {path} (line {line}): {reason}")]
    Parse {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Invalid YAML in {path}: {reason}")]
    Yaml { path: String, reason: String },

    #[error("Cannot insert '{key}': an existing scalar occupies its parent '{blocking}'")]
    ScalarConflict { key: String, blocking: String },

    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid method signature '{0}'")]
    InvalidSignature(String),

    #[error("Unknown key '{key}' in {path} (line {line})")]
    UnknownKey {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown keys in options file")]
    UnknownKeys(Vec<PropfigError>),

    #[error("Failed to parse {path}: {source}")]
    OptionsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] confique::Error),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to encode rewrite plan: {0}")]
    PlanEncoding(#[from] serde_json::Error),
}
