use crate::{SourceError, Triple, TripleSource};

/// Triples held in memory, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    triples: std::vec::IntoIter<Triple>,
    skip: &'static [&'static str],
}

impl MemorySource {
    pub fn new(triples: Vec<Triple>) -> Self {
        Self {
            triples: triples.into_iter(),
            skip: &[],
        }
    }

    /// Declare source-specific non-factual predicates.
    pub fn with_source_skip(mut self, skip: &'static [&'static str]) -> Self {
        self.skip = skip;
        self
    }
}

impl FromIterator<Triple> for MemorySource {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Iterator for MemorySource {
    type Item = Result<Triple, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.triples.next().map(Ok)
    }
}

impl TripleSource for MemorySource {
    fn source_skip_predicates(&self) -> &'static [&'static str] {
        self.skip
    }
}
