use crate::config::ConfigError;
use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

pub type InitResult<T> = Result<T, InitError>;

#[derive(Debug, Error)]
pub enum InitError {
    /// `.notekit/` is present and `force` was not given.
    #[error("{0:?} already exists; pass --force to overwrite it")]
    DirectoryExists(PathBuf),

    #[error("no embedded template named {0}")]
    TemplateNotFound(String),

    #[error("cannot create {path:?}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path:?}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The files just written do not load back as a configuration.
    #[error("generated configuration is invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot set up the data repository: {0}")]
    Repository(#[from] StoreError),
}
