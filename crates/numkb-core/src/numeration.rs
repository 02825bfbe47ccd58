//! Dictionary: bijective string ↔ numeration mapping.
//!
//! Numerations are dense and start at 1. `0` is the "unmapped" sentinel
//! ([`NULL_NUM`]) and is never handed out. Names are kept in a `Vec` indexed
//! by `num - 1`, so ascending iteration is free and matches the chunk layout
//! of `map<k>.tsv`.

use ahash::AHashMap;

use crate::error::{KbError, Result};

/// The reserved "unmapped" numeration.
pub const NULL_NUM: u32 = 0;

/// Largest numeration that still fits the on-disk signed 4-byte encoding.
pub const MAX_NUM: u32 = i32::MAX as u32;

/// Interning dictionary for KB constants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumerationMap {
    name_to_num: AHashMap<String, u32>,
    /// `num_to_name[num - 1]`
    num_to_name: Vec<String>,
}

impl NumerationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from names in ascending numeration order: `names[i]` gets `i + 1`.
    pub fn from_ordered_names(names: Vec<String>) -> Result<Self> {
        let mut name_to_num = AHashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let num = Self::num_for_index(idx)?;
            if name_to_num.insert(name.clone(), num).is_some() {
                return Err(KbError::InvalidNumeration(format!(
                    "duplicate name {name:?} at numeration {num}"
                )));
            }
        }
        Ok(Self {
            name_to_num,
            num_to_name: names,
        })
    }

    /// Build from explicit `(name, num)` assignments, which must cover `1..=N`
    /// exactly once.
    pub fn from_assignments<I>(assignments: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let assignments: Vec<(String, u32)> = assignments.into_iter().collect();
        let mut slots: Vec<Option<String>> = vec![None; assignments.len()];
        for (name, num) in assignments {
            if num == NULL_NUM || num > MAX_NUM {
                return Err(KbError::InvalidNumeration(format!(
                    "name {name:?} assigned reserved or oversized numeration {num}"
                )));
            }
            let idx = (num - 1) as usize;
            if idx >= slots.len() {
                return Err(KbError::InvalidNumeration(format!(
                    "name {name:?} assigned numeration {num} beyond the {} mappings",
                    slots.len()
                )));
            }
            if let Some(prev) = &slots[idx] {
                return Err(KbError::InvalidNumeration(format!(
                    "numeration {num} assigned to both {prev:?} and {name:?}"
                )));
            }
            slots[idx] = Some(name);
        }

        let mut names = Vec::with_capacity(slots.len());
        for (idx, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(name) => names.push(name),
                None => {
                    return Err(KbError::InvalidNumeration(format!(
                        "numeration {} has no name",
                        idx + 1
                    )))
                }
            }
        }
        Self::from_ordered_names(names)
    }

    fn num_for_index(idx: usize) -> Result<u32> {
        u32::try_from(idx + 1)
            .ok()
            .filter(|&num| num <= MAX_NUM)
            .ok_or(KbError::NumerationOverflow(idx))
    }

    /// Map files are line-oriented; names with line breaks cannot round-trip.
    pub fn check_name(name: &str) -> Result<()> {
        if name.contains(['\n', '\r']) {
            return Err(KbError::InvalidConstant(name.to_string()));
        }
        Ok(())
    }

    /// Return the numeration of `name`, allocating the next one on first sight.
    pub fn internalize(&mut self, name: &str) -> Result<u32> {
        if let Some(&num) = self.name_to_num.get(name) {
            return Ok(num);
        }
        Self::check_name(name)?;
        let num = Self::num_for_index(self.num_to_name.len())?;
        self.name_to_num.insert(name.to_string(), num);
        self.num_to_name.push(name.to_string());
        Ok(num)
    }

    pub fn num_of(&self, name: &str) -> Option<u32> {
        self.name_to_num.get(name).copied()
    }

    pub fn name_of(&self, num: u32) -> Option<&str> {
        if num == NULL_NUM {
            return None;
        }
        self.num_to_name.get((num - 1) as usize).map(String::as_str)
    }

    pub fn total_mappings(&self) -> usize {
        self.num_to_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_to_name.is_empty()
    }

    /// Names in ascending numeration order (`names()[0]` is numeration 1).
    pub fn names(&self) -> &[String] {
        &self.num_to_name
    }

    /// `(num, name)` pairs in ascending numeration order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.num_to_name
            .iter()
            .enumerate()
            .map(|(idx, name)| ((idx + 1) as u32, name.as_str()))
    }

    /// Renumber every entry through `old_to_new` (indexed by old numeration,
    /// slot 0 unused). The mapping must be a permutation of `1..=N`.
    pub fn rearrange(&mut self, old_to_new: &[u32]) -> Result<()> {
        let total = self.total_mappings();
        if old_to_new.len() != total + 1 {
            return Err(KbError::InvalidNumeration(format!(
                "permutation covers {} numerations, dictionary holds {total}",
                old_to_new.len().saturating_sub(1)
            )));
        }

        let mut hit = vec![false; total];
        for (old, &new) in old_to_new.iter().enumerate().skip(1) {
            if new == NULL_NUM || new as usize > total {
                return Err(KbError::InvalidNumeration(format!(
                    "numeration {old} maps to out-of-range {new}"
                )));
            }
            let seen = &mut hit[(new - 1) as usize];
            if *seen {
                return Err(KbError::InvalidNumeration(format!(
                    "numeration {new} is the image of two names"
                )));
            }
            *seen = true;
        }

        let mut slots: Vec<String> = vec![String::new(); total];
        for (old_idx, name) in self.num_to_name.drain(..).enumerate() {
            slots[(old_to_new[old_idx + 1] - 1) as usize] = name;
        }
        self.num_to_name = slots;
        self.name_to_num = self
            .num_to_name
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), (idx + 1) as u32))
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internalize_is_sequential_from_one() {
        let mut map = NumerationMap::new();
        assert_eq!(map.internalize("a").unwrap(), 1);
        assert_eq!(map.internalize("b").unwrap(), 2);
        assert_eq!(map.internalize("a").unwrap(), 1);
        assert_eq!(map.total_mappings(), 2);
        assert_eq!(map.name_of(2), Some("b"));
        assert_eq!(map.name_of(NULL_NUM), None);
        assert_eq!(map.name_of(3), None);
    }

    #[test]
    fn line_breaks_are_rejected_without_consuming_a_numeration() {
        let mut map = NumerationMap::new();
        assert!(matches!(
            map.internalize("bad\nname"),
            Err(KbError::InvalidConstant(_))
        ));
        assert_eq!(map.internalize("ok").unwrap(), 1);
    }

    #[test]
    fn rearrange_applies_permutation() {
        let mut map = NumerationMap::from_ordered_names(vec![
            "x".to_string(),
            "y".to_string(),
            "z".to_string(),
        ])
        .unwrap();
        map.rearrange(&[0, 3, 1, 2]).unwrap();
        assert_eq!(map.names(), &["y", "z", "x"]);
        assert_eq!(map.num_of("x"), Some(3));
        assert_eq!(map.num_of("y"), Some(1));
    }

    #[test]
    fn rearrange_rejects_non_permutation() {
        let mut map =
            NumerationMap::from_ordered_names(vec!["x".to_string(), "y".to_string()]).unwrap();
        assert!(map.rearrange(&[0, 1, 1]).is_err());
        assert!(map.rearrange(&[0, 1]).is_err());
    }

    #[test]
    fn assignments_must_be_dense() {
        let ok = NumerationMap::from_assignments(vec![
            ("b".to_string(), 2),
            ("a".to_string(), 1),
        ])
        .unwrap();
        assert_eq!(ok.names(), &["a", "b"]);

        let gap = NumerationMap::from_assignments(vec![("a".to_string(), 2)]);
        assert!(matches!(gap, Err(KbError::InvalidNumeration(_))));

        let zero = NumerationMap::from_assignments(vec![("a".to_string(), 0)]);
        assert!(zero.is_err());
    }

    #[test]
    fn numeration_beyond_count_is_rejected_up_front() {
        let far = NumerationMap::from_assignments(vec![
            ("a".to_string(), 1),
            ("x".to_string(), 0x7fff_ffff),
        ]);
        assert!(matches!(far, Err(KbError::InvalidNumeration(_))));
    }
}
