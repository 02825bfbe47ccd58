//! Relation store: fixed-arity numerated records in a flat buffer.

use ahash::AHashSet;

use crate::error::{KbError, Result};
use crate::numeration::NULL_NUM;

/// One relation of a numerated KB.
///
/// Records are stored row-major in `args` (`arity` numerations per record)
/// and keep insertion order. Exact duplicates are dropped on insertion, so the
/// buffer is an insertion-ordered set of records.
///
/// The duplicate index only lives while records are being added: it is built
/// on the first `add_record` and dropped by `renumber`. Loaded and sampled
/// relations never carry one.
#[derive(Debug, Clone)]
pub struct KbRelation {
    name: String,
    id: usize,
    arity: usize,
    args: Vec<u32>,
    seen: Option<AHashSet<Box<[u32]>>>,
}

impl KbRelation {
    pub fn new(name: impl Into<String>, id: usize, arity: usize) -> Result<Self> {
        let name = name.into();
        Self::check_name(&name)?;
        if arity == 0 {
            return Err(KbError::ZeroArity(name));
        }
        Ok(Self {
            name,
            id,
            arity,
            args: Vec::new(),
            seen: None,
        })
    }

    /// Rebuild a relation from a flat argument buffer (load path).
    ///
    /// Records are kept exactly as given, duplicates included.
    pub fn from_args(
        name: impl Into<String>,
        id: usize,
        arity: usize,
        args: Vec<u32>,
    ) -> Result<Self> {
        let mut rel = Self::new(name, id, arity)?;
        if args.len() % arity != 0 {
            return Err(KbError::InvalidNumeration(format!(
                "`{}` holds {} arguments, not a multiple of arity {arity}",
                rel.name,
                args.len()
            )));
        }
        rel.args = args;
        Ok(rel)
    }

    /// Relation names end up in the tab-separated `Relations.tsv`.
    pub fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains(['\t', '\n', '\r']) {
            return Err(KbError::InvalidConstant(name.to_string()));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordinal of this relation inside its KB.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn total_records(&self) -> usize {
        self.args.len() / self.arity
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// The row-major argument buffer.
    pub fn args(&self) -> &[u32] {
        &self.args
    }

    pub fn records(&self) -> impl Iterator<Item = &[u32]> + '_ {
        self.args.chunks_exact(self.arity)
    }

    pub fn contains(&self, record: &[u32]) -> bool {
        match &self.seen {
            Some(seen) => seen.contains(record),
            None => self.records().any(|r| r == record),
        }
    }

    /// Check a record's shape without inserting it.
    pub fn check_arity(&self, actual: usize) -> Result<()> {
        if actual != self.arity {
            return Err(KbError::ArityMismatch {
                relation: self.name.clone(),
                expected: self.arity,
                actual,
            });
        }
        Ok(())
    }

    /// Append a numerated record. Returns `false` if it was already present.
    pub fn add_record(&mut self, record: &[u32]) -> Result<bool> {
        self.check_arity(record.len())?;
        if record.contains(&NULL_NUM) {
            return Err(KbError::InvalidNumeration(format!(
                "record {record:?} of `{}` uses the reserved numeration 0",
                self.name
            )));
        }
        let (args, arity) = (&self.args, self.arity);
        let seen = self
            .seen
            .get_or_insert_with(|| args.chunks_exact(arity).map(Box::from).collect());
        if !seen.insert(record.into()) {
            return Ok(false);
        }
        self.args.extend_from_slice(record);
        Ok(true)
    }

    /// Substitute every argument through `old_to_new` (indexed by old
    /// numeration). Callers guarantee every argument is mapped.
    pub fn renumber(&mut self, old_to_new: &[u32]) {
        for arg in &mut self.args {
            let new = old_to_new[*arg as usize];
            debug_assert_ne!(new, NULL_NUM, "argument {arg} of `{}` left unmapped", self.name);
            *arg = new;
        }
        self.seen = None;
    }

    #[cfg(test)]
    pub(crate) fn has_duplicate_index(&self) -> bool {
        self.seen.is_some()
    }
}
