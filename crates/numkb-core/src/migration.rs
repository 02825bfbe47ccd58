//! Import of the legacy numerated layout.
//!
//! A legacy KB directory holds `<relation>_<arity>_<records>.rel` files with
//! raw little-endian tuples and `map<k>.tsv` files whose lines are
//! `name \t <hex numeration>`. Migration loads both, rearranges, and dumps the
//! current layout.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::{debug, info};

use crate::codec::{self, kb_path};
use crate::config::KbConfig;
use crate::error::{IoResultExt, KbError, Result};
use crate::numeration::NumerationMap;
use crate::rearrange::rearrange;
use crate::relation::KbRelation;
use crate::NumeratedKb;

/// Relation metadata encoded in a legacy relation file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRelationInfo {
    pub name: String,
    pub arity: usize,
    pub total_records: usize,
}

fn rel_file_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(.+)_([0-9]+)_([0-9]+)\.rel$").ok())
        .as_ref()
}

fn map_file_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^map[0-9]+\.tsv$").ok())
        .as_ref()
}

/// Parse `<name>_<arity>_<records>.rel`; `None` for any other file name.
pub fn parse_legacy_rel_file_name(file_name: &str) -> Option<LegacyRelationInfo> {
    let caps = rel_file_pattern()?.captures(file_name)?;
    Some(LegacyRelationInfo {
        name: caps[1].to_string(),
        arity: caps[2].parse().ok()?,
        total_records: caps[3].parse().ok()?,
    })
}

fn is_legacy_map_file(file_name: &str) -> bool {
    map_file_pattern().is_some_and(|re| re.is_match(file_name))
}

fn read_legacy_relation(path: &Path, info: LegacyRelationInfo, id: usize) -> Result<KbRelation> {
    let raw = codec::read_le_ints(path)?;
    let expected = info.arity.checked_mul(info.total_records).ok_or_else(|| {
        KbError::malformed(path, "file name promises more integers than addressable")
    })?;
    if raw.len() != expected {
        return Err(KbError::malformed(
            path,
            format!("file name promises {expected} integers, found {}", raw.len()),
        ));
    }
    let args = raw
        .into_iter()
        .map(|value| {
            u32::try_from(value)
                .ok()
                .filter(|&num| num > 0)
                .ok_or_else(|| KbError::malformed(path, format!("bad numeration {value}")))
        })
        .collect::<Result<Vec<u32>>>()?;
    KbRelation::from_args(info.name, id, info.arity, args)
}

fn read_legacy_mappings(path: &Path, into: &mut Vec<(String, u32)>) -> Result<()> {
    let reader = BufReader::new(fs::File::open(path).at(path)?);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.at(path)?;
        if line.is_empty() {
            continue;
        }
        let parsed = line
            .split_once('\t')
            .and_then(|(name, hex)| Some((name, u32::from_str_radix(hex.trim(), 16).ok()?)));
        let Some((name, num)) = parsed else {
            return Err(KbError::malformed(
                path,
                format!("line {}: expected `name<TAB>hex`", line_no + 1),
            ));
        };
        into.push((name.to_string(), num));
    }
    Ok(())
}

/// Load the legacy KB at `<old_path>/<old_name>/`.
///
/// Relation files are taken in file-name order, which fixes the relation
/// ordinals of the migrated KB.
pub fn load_legacy_kb(old_path: &Path, old_name: &str, config: &KbConfig) -> Result<NumeratedKb> {
    let dir = kb_path(old_path, old_name);
    let mut file_names = Vec::new();
    for entry in fs::read_dir(&dir).at(&dir)? {
        let entry = entry.at(&dir)?;
        if entry.file_type().at(&entry.path())?.is_file() {
            file_names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    file_names.sort();

    let mut relations = Vec::new();
    let mut assignments = Vec::new();
    for file_name in &file_names {
        let path = dir.join(file_name);
        if let Some(info) = parse_legacy_rel_file_name(file_name) {
            debug!(
                relation = %info.name,
                arity = info.arity,
                records = info.total_records,
                "legacy relation"
            );
            relations.push(read_legacy_relation(&path, info, relations.len())?);
        } else if is_legacy_map_file(file_name) {
            read_legacy_mappings(&path, &mut assignments)?;
        }
    }

    let map = NumerationMap::from_assignments(assignments)?;
    let kb = NumeratedKb::from_parts(old_name, map, relations, config)?;
    info!(
        kb = old_name,
        relations = kb.total_relations(),
        records = kb.total_records(),
        numerations = kb.total_mappings(),
        "legacy KB loaded"
    );
    Ok(kb)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSummary {
    pub relations: usize,
    pub records: usize,
    pub numerations: usize,
    pub path: PathBuf,
    pub load_time: Duration,
    pub rearrange_time: Duration,
    pub dump_time: Duration,
}

impl MigrationSummary {
    pub fn total_time(&self) -> Duration {
        self.load_time + self.rearrange_time + self.dump_time
    }
}

/// Load a legacy KB, rearrange it, and dump it to `<new_path>/<old_name>/`.
///
/// Unreferenced legacy numerations fail the rearrangement post-condition.
pub fn migrate(
    old_path: &Path,
    old_name: &str,
    new_path: &Path,
    config: &KbConfig,
) -> Result<MigrationSummary> {
    let started = Instant::now();
    let mut kb = load_legacy_kb(old_path, old_name, config)?;
    let load_time = started.elapsed();

    let started = Instant::now();
    rearrange(&mut kb)?;
    let rearrange_time = started.elapsed();

    let started = Instant::now();
    let path = kb.dump(new_path, config)?;
    let dump_time = started.elapsed();

    Ok(MigrationSummary {
        relations: kb.total_relations(),
        records: kb.total_records(),
        numerations: kb.total_mappings(),
        path,
        load_time,
        rearrange_time,
        dump_time,
    })
}
