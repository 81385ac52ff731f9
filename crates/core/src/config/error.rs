//! Errors raised while reading `.notekit/`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid TOML: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The front matter of an agent definition is missing or malformed.
    #[error("bad agent definition {path}: {reason}")]
    MarkdownParse { path: PathBuf, reason: String },

    #[error("cannot list {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Parsed fine, but a value is out of range.
    #[error("invalid setting in {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
