//! YAGO-1 directory layout.
//!
//! ```text
//! <root>/entities/*          one entity per line, name in the first column
//! <root>/facts/<predicate>/* fact_id \t subject \t object [\t ...]
//! ```
//!
//! Only facts between two known entities become triples; literal-valued
//! facts are dropped silently.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::sources::{list_sorted, LineFiles};
use crate::{SourceError, Triple, TripleSource};

pub const ENTITIES_DIR: &str = "entities";
pub const FACTS_DIR: &str = "facts";

/// Meta-relations of YAGO-1 that carry provenance, not facts.
pub const YAGO1_NON_FACTUAL_PREDICATES: &[&str] =
    &["describes", "foundIn", "extractedBy", "context"];

struct PredicateFiles {
    predicate: String,
    lines: LineFiles,
    started: Instant,
}

pub struct Yago1Source {
    entities: HashSet<String>,
    predicates: VecDeque<(String, PathBuf)>,
    total_predicates: usize,
    skip: HashSet<String>,
    current: Option<PredicateFiles>,
}

impl Yago1Source {
    /// Load the entity set and list the fact directories under `root`.
    pub fn open(root: &Path) -> Result<Self, SourceError> {
        let entity_dir = root.join(ENTITIES_DIR);
        let mut entities = HashSet::new();
        let mut entity_lines = LineFiles::new(list_sorted(&entity_dir, false, |entry| {
            entry.file_type().is_file()
        })?);
        while let Some(line) = entity_lines.next_line() {
            let text = match line {
                Ok((_, text)) => text,
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "entity line skipped");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if let Some(name) = text.split('\t').next().filter(|name| !name.is_empty()) {
                entities.insert(name.to_string());
            }
        }

        let fact_dir = root.join(FACTS_DIR);
        let predicates: VecDeque<(String, PathBuf)> =
            list_sorted(&fact_dir, false, |entry| entry.file_type().is_dir())?
                .into_iter()
                .map(|path| {
                    let predicate = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    (predicate, path)
                })
                .collect();

        info!(
            root = %root.display(),
            entities = entities.len(),
            relations = predicates.len(),
            "YAGO-1 layout opened"
        );
        Ok(Self {
            entities,
            total_predicates: predicates.len(),
            predicates,
            skip: HashSet::new(),
            current: None,
        })
    }

    /// Skip whole predicate directories for these names as well.
    pub fn skipping<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.skip
            .extend(predicates.into_iter().map(|p| p.as_ref().to_string()));
        self
    }

    pub fn total_entities(&self) -> usize {
        self.entities.len()
    }

    fn is_skipped(&self, predicate: &str) -> bool {
        self.skip.contains(predicate) || YAGO1_NON_FACTUAL_PREDICATES.contains(&predicate)
    }
}

impl Iterator for Yago1Source {
    type Item = Result<Triple, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = &mut self.current {
                match current.lines.next_line() {
                    Some(Ok((line_no, text))) => {
                        let fields: Vec<&str> = text.split('\t').collect();
                        if fields.len() < 3 {
                            return Some(Err(current
                                .lines
                                .malformed(line_no, "expected `id<TAB>subject<TAB>object`")));
                        }
                        let (subject, object) = (fields[1], fields[2]);
                        if self.entities.contains(subject) && self.entities.contains(object) {
                            let predicate = current.predicate.as_str();
                            return Some(Ok(Triple::new(subject, predicate, object)));
                        }
                        continue;
                    }
                    Some(Err(err)) => return Some(Err(err)),
                    None => {
                        debug!(
                            relation = %current.predicate,
                            elapsed_ms = current.started.elapsed().as_millis() as u64,
                            finished = self.total_predicates - self.predicates.len(),
                            total = self.total_predicates,
                            "relation loaded"
                        );
                        self.current = None;
                    }
                }
            }

            let (predicate, dir) = self.predicates.pop_front()?;
            if self.is_skipped(&predicate) {
                debug!(relation = %predicate, "non-factual relation skipped");
                continue;
            }
            match list_sorted(&dir, false, |entry| entry.file_type().is_file()) {
                Ok(files) => {
                    self.current = Some(PredicateFiles {
                        predicate,
                        lines: LineFiles::new(files),
                        started: Instant::now(),
                    })
                }
                Err(err) => warn!(error = %err, "cannot list facts; relation skipped"),
            }
        }
    }
}

impl TripleSource for Yago1Source {
    fn source_skip_predicates(&self) -> &'static [&'static str] {
        YAGO1_NON_FACTUAL_PREDICATES
    }
}
