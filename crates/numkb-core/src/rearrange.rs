//! First-appearance renumbering.
//!
//! Relations are scanned in ordinal order (the category relation last) and
//! each numeration gets the next output value the first time it is seen. The
//! permutation is computed read-only, checked, and only then applied.

use tracing::{debug, info};

use crate::error::{KbError, Result};
use crate::numeration::{MAX_NUM, NULL_NUM};
use crate::NumeratedKb;

/// Incremental first-appearance numbering over old numerations `1..=max_old`.
#[derive(Debug, Clone)]
pub struct FirstAppearance {
    /// `old_to_new[old]`, `NULL_NUM` while unassigned.
    old_to_new: Vec<u32>,
    /// `new_to_old[new]`, slot 0 is the sentinel.
    new_to_old: Vec<u32>,
}

impl FirstAppearance {
    pub fn new(max_old: usize) -> Self {
        Self {
            old_to_new: vec![NULL_NUM; max_old + 1],
            new_to_old: vec![NULL_NUM],
        }
    }

    /// New numeration for `old`, assigning the next one on first sight.
    pub fn assign(&mut self, old: u32) -> Result<u32> {
        let max = self.old_to_new.len() - 1;
        if old == NULL_NUM || old as usize > max {
            return Err(KbError::IdOutOfRange {
                id: old as i64,
                max,
            });
        }
        let slot = &mut self.old_to_new[old as usize];
        if *slot == NULL_NUM {
            let next = self.new_to_old.len();
            if next > MAX_NUM as usize {
                return Err(KbError::NumerationOverflow(next - 1));
            }
            *slot = next as u32;
            self.new_to_old.push(old);
        }
        Ok(*slot)
    }

    /// Assign every argument of `record` in order.
    pub fn assign_all(&mut self, record: &[u32]) -> Result<()> {
        for &arg in record {
            self.assign(arg)?;
        }
        Ok(())
    }

    /// Number of numerations assigned so far.
    pub fn assigned(&self) -> usize {
        self.new_to_old.len() - 1
    }

    pub fn old_to_new(&self) -> &[u32] {
        &self.old_to_new
    }

    /// Provenance map: `new_to_old[new] = old`, slot 0 unused.
    pub fn into_new_to_old(self) -> Vec<u32> {
        self.new_to_old
    }
}

/// Relation ids in rearrangement order: ordinal order, category relation last.
pub fn rearrangement_order(kb: &NumeratedKb) -> Vec<usize> {
    let category = kb.category_relation().map(|rel| rel.id());
    let mut order: Vec<usize> = (0..kb.total_relations())
        .filter(|&id| Some(id) != category)
        .collect();
    order.extend(category);
    order
}

/// Compute the first-appearance permutation without touching the KB.
///
/// Fails with [`KbError::RearrangeMismatch`] if any dictionary entry is never
/// referenced by a record.
pub fn compute_permutation(kb: &NumeratedKb) -> Result<Vec<u32>> {
    let expected = kb.total_mappings();
    let mut numbering = FirstAppearance::new(expected);
    for id in rearrangement_order(kb) {
        let rel = &kb.relations()[id];
        for record in rel.records() {
            numbering.assign_all(record)?;
        }
        debug!(
            relation = rel.name(),
            assigned = numbering.assigned(),
            "relation rearranged"
        );
    }

    let actual = numbering.assigned();
    if actual != expected {
        return Err(KbError::RearrangeMismatch { expected, actual });
    }
    Ok(numbering.old_to_new().to_vec())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RearrangeSummary {
    pub numerations: usize,
    pub relations: usize,
    pub category_last: bool,
}

/// Renumber `kb` in place so every relation's numerations are concentrated.
pub fn rearrange(kb: &mut NumeratedKb) -> Result<RearrangeSummary> {
    let old_to_new = compute_permutation(kb)?;
    kb.apply_permutation(&old_to_new)?;

    let summary = RearrangeSummary {
        numerations: kb.total_mappings(),
        relations: kb.total_relations(),
        category_last: kb.category_relation().is_some(),
    };
    info!(
        kb = kb.name(),
        numerations = summary.numerations,
        relations = summary.relations,
        "numerations rearranged"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_kb() -> NumeratedKb {
        let mut kb = NumeratedKb::new("scenario");
        kb.add_record("r1", &["a", "b"]).unwrap();
        kb.add_record("rdf:type", &["x", "t1"]).unwrap();
        kb.add_record("r2", &["x", "y"]).unwrap();
        kb.add_record("r3", &["c", "c"]).unwrap();
        kb
    }

    #[test]
    fn category_relation_is_scanned_last() {
        let kb = scenario_kb();
        assert_eq!(rearrangement_order(&kb), vec![0, 2, 3, 1]);
    }

    #[test]
    fn scenario_numbering() {
        let mut kb = scenario_kb();
        // Ingestion order: a=1 b=2 x=3 t1=4 y=5 c=6
        assert_eq!(kb.numeration_map().num_of("t1"), Some(4));

        let summary = rearrange(&mut kb).unwrap();
        assert_eq!(summary.numerations, 6);
        assert!(summary.category_last);

        let map = kb.numeration_map();
        assert_eq!(map.names(), &["a", "b", "x", "y", "c", "t1"]);
        assert_eq!(kb.relation("r1").unwrap().args(), &[1, 2]);
        assert_eq!(kb.relation("rdf:type").unwrap().args(), &[3, 6]);
        assert_eq!(kb.relation("r2").unwrap().args(), &[3, 4]);
        assert_eq!(kb.relation("r3").unwrap().args(), &[5, 5]);
        assert_eq!(kb.category_values(), vec![6]);
    }

    #[test]
    fn rearranged_relations_release_duplicate_index() {
        let mut kb = scenario_kb();
        assert!(kb.relations().iter().all(|rel| rel.has_duplicate_index()));
        rearrange(&mut kb).unwrap();
        assert!(kb.relations().iter().all(|rel| !rel.has_duplicate_index()));
    }

    #[test]
    fn orphaned_numeration_is_fatal_and_leaves_kb_untouched() {
        let mut map = crate::NumerationMap::new();
        for name in ["a", "b", "orphan"] {
            map.internalize(name).unwrap();
        }
        let rel = crate::KbRelation::from_args("r", 0, 2, vec![2, 1]).unwrap();
        let mut kb =
            NumeratedKb::from_parts("kb", map, vec![rel], &crate::KbConfig::default()).unwrap();

        let err = rearrange(&mut kb).unwrap_err();
        assert!(matches!(
            err,
            KbError::RearrangeMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert_eq!(kb.relation("r").unwrap().args(), &[2, 1]);
        assert_eq!(kb.numeration_map().names(), &["a", "b", "orphan"]);
    }

    #[test]
    fn first_appearance_tracks_provenance() {
        let mut numbering = FirstAppearance::new(10);
        assert_eq!(numbering.assign(7).unwrap(), 1);
        assert_eq!(numbering.assign(3).unwrap(), 2);
        assert_eq!(numbering.assign(7).unwrap(), 1);
        assert!(numbering.assign(0).is_err());
        assert!(numbering.assign(11).is_err());
        assert_eq!(numbering.assigned(), 2);
        assert_eq!(numbering.into_new_to_old(), vec![0, 7, 3]);
    }
}
