//! Error types shared by the scanner, the emitter and the generation manifest.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A document or manifest source could not be opened
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A line looked like a directive but did not parse
    #[error("malformed directive in {}:{line}: {reason}", path.display())]
    MalformedDirective {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// An output directory or artifact could not be written
    #[error("failed to write {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    /// A generation manifest named a transform that is not registered
    #[error("unknown transform '{name}'")]
    UnknownTransform { name: String },

    #[error("invalid option '{option}' for transform '{transform}': {reason}")]
    InvalidOption {
        transform: String,
        option: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::WriteFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
