//! numkb: Dense-Integer Knowledge Base Encoding
//!
//! Turns a relational knowledge base (n-ary tuples over string constants) into
//! a compact numerated layout and extracts bounded samples from it.
//!
//! Key pieces:
//! 1. **Numeration**: every constant is interned once and referenced by a
//!    dense `u32` (starting at 1, `0` reserved)
//! 2. **Rearrangement**: constants are renumbered in first-appearance order,
//!    relation by relation, so each relation touches a tight id range
//! 3. **Codec**: relations as raw little-endian tuple files, the dictionary as
//!    chunked line files, plus a category-value index
//! 4. **Sampling**: highest-degree non-category nodes are selected under an
//!    edge budget and re-encoded with their own numbering
//!
//! ## Module Organization
//!
//! - `numeration`: the string ↔ numeration dictionary
//! - `relation`: flat fixed-arity record storage
//! - `rearrange`: first-appearance renumbering
//! - `codec`: on-disk artifacts (dump/load)
//! - `sampler`: major-node sampling
//! - `migration`: legacy layout import

pub mod codec;
pub mod config;
pub mod error;
pub mod migration;
pub mod numeration;
pub mod rearrange;
pub mod relation;
pub mod sampler;

use ahash::AHashMap;

pub use config::KbConfig;
pub use error::{KbError, Result};
pub use numeration::{NumerationMap, MAX_NUM, NULL_NUM};
pub use rearrange::{rearrange, FirstAppearance, RearrangeSummary};
pub use relation::KbRelation;
pub use sampler::{Edge, MajorNodeSampler, SamplingResult, SamplingStats};

// ============================================================================
// NumeratedKb: The Complete Knowledge Base
// ============================================================================

/// A numerated KB: one dictionary plus relations ordered by ordinal.
#[derive(Debug, Clone)]
pub struct NumeratedKb {
    name: String,
    map: NumerationMap,
    relations: Vec<KbRelation>,
    rel_index: AHashMap<String, usize>,
    /// Candidate category relation names, in priority order.
    category_predicates: Vec<String>,
}

impl NumeratedKb {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, &KbConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: &KbConfig) -> Self {
        Self {
            name: name.into(),
            map: NumerationMap::new(),
            relations: Vec::new(),
            rel_index: AHashMap::new(),
            category_predicates: config.category_predicates.clone(),
        }
    }

    /// Assemble a KB from parts. Relation ids must equal their position and
    /// every argument must lie in `1..=map.total_mappings()`.
    pub fn from_parts(
        name: impl Into<String>,
        map: NumerationMap,
        relations: Vec<KbRelation>,
        config: &KbConfig,
    ) -> Result<Self> {
        let total = map.total_mappings();
        let mut rel_index = AHashMap::with_capacity(relations.len());
        for (pos, rel) in relations.iter().enumerate() {
            if rel.id() != pos {
                return Err(KbError::InvalidNumeration(format!(
                    "relation `{}` has id {} at position {pos}",
                    rel.name(),
                    rel.id()
                )));
            }
            if rel_index.insert(rel.name().to_string(), pos).is_some() {
                return Err(KbError::InvalidNumeration(format!(
                    "relation `{}` appears twice",
                    rel.name()
                )));
            }
            if let Some(&bad) = rel
                .args()
                .iter()
                .find(|&&arg| arg == NULL_NUM || arg as usize > total)
            {
                return Err(KbError::IdOutOfRange {
                    id: bad as i64,
                    max: total,
                });
            }
        }
        Ok(Self {
            name: name.into(),
            map,
            relations,
            rel_index,
            category_predicates: config.category_predicates.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn numeration_map(&self) -> &NumerationMap {
        &self.map
    }

    pub fn total_mappings(&self) -> usize {
        self.map.total_mappings()
    }

    pub fn total_relations(&self) -> usize {
        self.relations.len()
    }

    pub fn total_records(&self) -> usize {
        self.relations.iter().map(KbRelation::total_records).sum()
    }

    /// Relations in ordinal order.
    pub fn relations(&self) -> &[KbRelation] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&KbRelation> {
        self.rel_index.get(name).map(|&id| &self.relations[id])
    }

    pub fn relation_by_id(&self, id: usize) -> Option<&KbRelation> {
        self.relations.get(id)
    }

    pub fn category_predicates(&self) -> &[String] {
        &self.category_predicates
    }

    /// The type/class relation: the first configured category name present.
    pub fn category_relation(&self) -> Option<&KbRelation> {
        self.category_predicates
            .iter()
            .find_map(|name| self.relation(name))
    }

    /// Object-side numerations of every category record, duplicates kept.
    pub fn category_values(&self) -> Vec<u32> {
        self.category_relation()
            .map(|rel| rel.records().filter_map(|r| r.get(1).copied()).collect())
            .unwrap_or_default()
    }

    /// Insert a record given by constant names, creating the relation on first
    /// use (its arity is fixed by that first record).
    ///
    /// The record is validated before anything is internalized, so a rejected
    /// record leaves the dictionary untouched. Returns `false` for duplicates.
    pub fn add_record(&mut self, relation: &str, args: &[&str]) -> Result<bool> {
        match self.rel_index.get(relation) {
            Some(&id) => self.relations[id].check_arity(args.len())?,
            None if args.is_empty() => return Err(KbError::ZeroArity(relation.to_string())),
            None => KbRelation::check_name(relation)?,
        }
        for arg in args {
            NumerationMap::check_name(arg)?;
        }

        let nums = args
            .iter()
            .map(|arg| self.map.internalize(arg))
            .collect::<Result<Vec<u32>>>()?;
        let id = match self.rel_index.get(relation) {
            Some(&id) => id,
            None => {
                let id = self.relations.len();
                self.relations.push(KbRelation::new(relation, id, nums.len())?);
                self.rel_index.insert(relation.to_string(), id);
                id
            }
        };
        self.relations[id].add_record(&nums)
    }

    /// Resolve a numerated record back to constant names.
    pub fn decode_record(&self, record: &[u32]) -> Option<Vec<&str>> {
        record.iter().map(|&num| self.map.name_of(num)).collect()
    }

    /// Apply a full renumbering to every relation and to the dictionary.
    pub(crate) fn apply_permutation(&mut self, old_to_new: &[u32]) -> Result<()> {
        self.map.rearrange(old_to_new)?;
        for rel in &mut self.relations {
            rel.renumber(old_to_new);
        }
        Ok(())
    }
}
