//! Error types for KB encoding, codec, and sampling.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("arity mismatch in relation `{relation}`: expected {expected}, got {actual}")]
    ArityMismatch {
        relation: String,
        expected: usize,
        actual: usize,
    },

    #[error("relation `{0}` must have a positive arity")]
    ZeroArity(String),

    #[error("constant cannot be written to a map file: {0:?}")]
    InvalidConstant(String),

    #[error("identifier {id} out of range 1..={max}")]
    IdOutOfRange { id: i64, max: usize },

    #[error("identifier space exhausted after {0} numerations")]
    NumerationOverflow(usize),

    #[error("invalid numeration assignment: {0}")]
    InvalidNumeration(String),

    #[error("numeration rearrange error: {expected} numerations expected, but {actual} rearranged")]
    RearrangeMismatch { expected: usize, actual: usize },

    #[error("malformed artifact {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("invalid KB name: {0:?}")]
    InvalidKbName(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("failed to parse config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, KbError>;

impl KbError {
    pub(crate) fn malformed(path: &Path, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Per-item failures that ingestion counts instead of aborting on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KbError::ArityMismatch { .. } | KbError::ZeroArity(_) | KbError::InvalidConstant(_)
        )
    }
}

/// Attach the offending path to a raw `io::Error`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| KbError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
