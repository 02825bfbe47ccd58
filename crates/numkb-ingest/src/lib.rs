//! Triple ingestion for numkb (boundary adapter).
//!
//! This crate turns external fact collections into numerated KBs:
//!
//! - [`TripleSource`] implementations read `(subject, predicate, object)`
//!   triples from a YAGO-1 directory tree, a tab-separated file, or memory.
//! - [`Converter`] drives ingest → rearrange → dump and reports per-stage
//!   timings and failure counts.
//!
//! Sources only report what they read. Skipping non-factual predicates and
//! counting failed triples happens in the converter.

pub mod converter;
pub mod sources;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use converter::{ConvertSummary, Converter, IngestStats};
pub use sources::{MemorySource, TsvSource, Yago1Source};

/// One binary fact as read from a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot list {}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl SourceError {
    /// A malformed line only loses that triple; I/O failures end the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Malformed { .. })
    }
}

/// A stream of triples.
///
/// Errors are yielded in-stream: recoverable ones are counted by the
/// converter, anything else aborts the conversion.
pub trait TripleSource: Iterator<Item = Result<Triple, SourceError>> {
    /// Predicates this source knows to be non-factual, on top of the
    /// configured generic set.
    fn source_skip_predicates(&self) -> &'static [&'static str] {
        &[]
    }
}
