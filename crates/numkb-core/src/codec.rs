//! On-disk artifacts of a numerated KB.
//!
//! ## Layout
//!
//! All files live in `<base>/<kb name>/`:
//!
//! ```text
//! Relations.tsv   name \t arity \t record_count   (one line per relation, ordinal order)
//! <ordinal>.rel   record_count * arity little-endian i32
//! map<k>.tsv      one constant per line, k = 1, 2, ... (ascending numeration)
//! TypeValues.dat  little-endian i32 per category record (object side)
//! ConstMap.dat    little-endian i32 per sampled numeration 1..=M (sampler output)
//! ```
//!
//! Dumps are staged in a hidden sibling directory and renamed into place once
//! every artifact is written, so a failed dump never leaves a KB directory
//! under the final name.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use roaring::RoaringBitmap;
use tracing::{debug, info, warn};

use crate::config::KbConfig;
use crate::error::{IoResultExt, KbError, Result};
use crate::numeration::{NumerationMap, MAX_NUM};
use crate::relation::KbRelation;
use crate::NumeratedKb;

pub const RELATION_INFO_FILE_NAME: &str = "Relations.tsv";
pub const REL_FILE_EXTENSION: &str = "rel";
pub const MAP_FILE_NUMERATION_START: usize = 1;
pub const TYPE_VALUES_FILE_NAME: &str = "TypeValues.dat";
pub const CONST_MAP_FILE_NAME: &str = "ConstMap.dat";

const INT_BYTES: usize = 4;

// ============================================================================
// Paths
// ============================================================================

pub fn kb_path(base: &Path, name: &str) -> PathBuf {
    base.join(name)
}

pub fn relation_info_path(dir: &Path) -> PathBuf {
    dir.join(RELATION_INFO_FILE_NAME)
}

pub fn rel_file_path(dir: &Path, ordinal: usize) -> PathBuf {
    dir.join(format!("{ordinal}.{REL_FILE_EXTENSION}"))
}

pub fn map_file_path(dir: &Path, k: usize) -> PathBuf {
    dir.join(format!("map{k}.tsv"))
}

fn check_kb_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with('.')
        || name.contains(['/', '\\']);
    if bad {
        return Err(KbError::InvalidKbName(name.to_string()));
    }
    Ok(())
}

// ============================================================================
// Little-endian integer files
// ============================================================================

/// Write numerations as consecutive little-endian 4-byte integers.
pub fn write_le_ints<I>(path: &Path, values: I) -> Result<usize>
where
    I: IntoIterator<Item = u32>,
{
    let file = File::create(path).at(path)?;
    let mut writer = BufWriter::new(file);
    let mut count = 0usize;
    for value in values {
        if value > MAX_NUM {
            return Err(KbError::IdOutOfRange {
                id: value as i64,
                max: MAX_NUM as usize,
            });
        }
        writer.write_all(&(value as i32).to_le_bytes()).at(path)?;
        count += 1;
    }
    writer.flush().at(path)?;
    Ok(count)
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .at(path)?;
    Ok(bytes)
}

fn decode_le_ints(bytes: &[u8]) -> impl Iterator<Item = i32> + '_ {
    bytes
        .chunks_exact(INT_BYTES)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

/// Read a file of little-endian 4-byte integers; the length must be exact.
pub fn read_le_ints(path: &Path) -> Result<Vec<i32>> {
    let bytes = read_bytes(path)?;
    if bytes.len() % INT_BYTES != 0 {
        return Err(KbError::malformed(
            path,
            format!("{} bytes is not a whole number of 4-byte integers", bytes.len()),
        ));
    }
    Ok(decode_le_ints(&bytes).collect())
}

fn to_num(path: &Path, value: i32, max: usize) -> Result<u32> {
    if value <= 0 || value as usize > max {
        return Err(KbError::malformed(
            path,
            format!("numeration {value} outside 1..={max}"),
        ));
    }
    Ok(value as u32)
}

// ============================================================================
// Relation metadata
// ============================================================================

/// One line of `Relations.tsv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationInfo {
    pub name: String,
    pub arity: usize,
    pub total_records: usize,
}

pub fn write_relation_info(dir: &Path, relations: &[KbRelation]) -> Result<()> {
    let path = relation_info_path(dir);
    let mut writer = BufWriter::new(File::create(&path).at(&path)?);
    for rel in relations {
        writeln!(
            writer,
            "{}\t{}\t{}",
            rel.name(),
            rel.arity(),
            rel.total_records()
        )
        .at(&path)?;
    }
    writer.flush().at(&path)?;
    Ok(())
}

pub fn read_relation_info(dir: &Path) -> Result<Vec<RelationInfo>> {
    let path = relation_info_path(dir);
    let reader = BufReader::new(File::open(&path).at(&path)?);
    let mut infos = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.at(&path)?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let &[name, arity, total_records] = fields.as_slice() else {
            return Err(KbError::malformed(
                &path,
                format!("line {}: expected 3 tab-separated fields", line_no + 1),
            ));
        };
        let parse = |field: &str, what: &str| {
            field.parse::<usize>().map_err(|_| {
                KbError::malformed(&path, format!("line {}: bad {what} {field:?}", line_no + 1))
            })
        };
        let arity = parse(arity, "arity")?;
        if arity == 0 {
            return Err(KbError::malformed(
                &path,
                format!("line {}: relation `{name}` has arity 0", line_no + 1),
            ));
        }
        infos.push(RelationInfo {
            name: name.to_string(),
            arity,
            total_records: parse(total_records, "record count")?,
        });
    }
    Ok(infos)
}

// ============================================================================
// Dictionary chunks
// ============================================================================

/// Write names in ascending numeration order, `chunk_size` lines per file.
/// Returns the number of chunk files written.
pub fn write_map_chunks(dir: &Path, names: &[String], chunk_size: usize) -> Result<usize> {
    if chunk_size == 0 {
        return Err(KbError::Config("map_chunk_size must be at least 1".into()));
    }
    let mut written = 0usize;
    for (idx, chunk) in names.chunks(chunk_size).enumerate() {
        let path = map_file_path(dir, idx + MAP_FILE_NUMERATION_START);
        let mut writer = BufWriter::new(File::create(&path).at(&path)?);
        for name in chunk {
            writeln!(writer, "{name}").at(&path)?;
        }
        writer.flush().at(&path)?;
        debug!(path = %path.display(), entries = chunk.len(), "map chunk written");
        written += 1;
    }
    Ok(written)
}

/// Read `map1.tsv`, `map2.tsv`, ... until the first missing chunk.
pub fn read_map_chunks(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut k = MAP_FILE_NUMERATION_START;
    loop {
        let path = map_file_path(dir, k);
        if !path.is_file() {
            break;
        }
        let reader = BufReader::new(File::open(&path).at(&path)?);
        for line in reader.lines() {
            names.push(line.at(&path)?);
        }
        k += 1;
    }
    Ok(names)
}

// ============================================================================
// Category-value index and provenance map
// ============================================================================

pub fn write_category_values(dir: &Path, values: &[u32]) -> Result<usize> {
    write_le_ints(&dir.join(TYPE_VALUES_FILE_NAME), values.iter().copied())
}

/// Load `TypeValues.dat` into a deduplicating set.
///
/// A KB without a category relation has no index, which yields an empty set.
/// A trailing partial integer is ignored.
pub fn load_category_values(dir: &Path) -> Result<RoaringBitmap> {
    let path = dir.join(TYPE_VALUES_FILE_NAME);
    if !path.exists() {
        debug!(path = %path.display(), "no category-value index");
        return Ok(RoaringBitmap::new());
    }
    let bytes = read_bytes(&path)?;
    if bytes.len() % INT_BYTES != 0 {
        warn!(
            path = %path.display(),
            trailing = bytes.len() % INT_BYTES,
            "ignoring trailing bytes in category-value index"
        );
    }
    let mut values = RoaringBitmap::new();
    for value in decode_le_ints(&bytes) {
        if value <= 0 {
            return Err(KbError::malformed(
                &path,
                format!("category value {value} is not a numeration"),
            ));
        }
        values.insert(value as u32);
    }
    Ok(values)
}

/// Write `const_map[1..]`; slot 0 is the sentinel and never written.
pub fn write_const_map(dir: &Path, const_map: &[u32]) -> Result<usize> {
    write_le_ints(
        &dir.join(CONST_MAP_FILE_NAME),
        const_map.iter().skip(1).copied(),
    )
}

/// Read `ConstMap.dat` back, re-inserting the unused slot 0.
pub fn read_const_map(dir: &Path) -> Result<Vec<u32>> {
    let path = dir.join(CONST_MAP_FILE_NAME);
    let mut const_map = vec![0u32];
    for value in read_le_ints(&path)? {
        const_map.push(to_num(&path, value, MAX_NUM as usize)?);
    }
    Ok(const_map)
}

// ============================================================================
// Staged dump
// ============================================================================

/// Run `write` against a staging directory and move it to `<base>/<name>`.
///
/// The staging directory is removed if `write` fails; an existing KB
/// directory of the same name is replaced only after `write` succeeded.
pub fn dump_staged<F>(base: &Path, name: &str, write: F) -> Result<PathBuf>
where
    F: FnOnce(&Path) -> Result<()>,
{
    check_kb_name(name)?;
    fs::create_dir_all(base).at(base)?;
    let staging = base.join(format!(".{name}.partial"));
    if staging.exists() {
        fs::remove_dir_all(&staging).at(&staging)?;
    }
    fs::create_dir(&staging).at(&staging)?;

    if let Err(err) = write(&staging) {
        if let Err(cleanup) = fs::remove_dir_all(&staging) {
            warn!(path = %staging.display(), error = %cleanup, "failed to remove staging directory");
        }
        return Err(err);
    }

    let target = kb_path(base, name);
    replace_dir(&staging, &target, &base.join(format!(".{name}.previous")))?;
    Ok(target)
}

/// Move `staging` to `target`. An existing `target` is parked at `previous`
/// until the move succeeded and restored if it did not.
fn replace_dir(staging: &Path, target: &Path, previous: &Path) -> Result<()> {
    if previous.exists() {
        fs::remove_dir_all(previous).at(previous)?;
    }
    let parked = target.exists();
    if parked {
        fs::rename(target, previous).at(target)?;
    }
    let moved = fs::rename(staging, target);
    if moved.is_err() && parked {
        if let Err(restore) = fs::rename(previous, target) {
            warn!(path = %previous.display(), error = %restore, "failed to restore previous KB directory");
        }
    }
    moved.at(target)?;
    if parked {
        if let Err(cleanup) = fs::remove_dir_all(previous) {
            warn!(path = %previous.display(), error = %cleanup, "failed to remove previous KB directory");
        }
    }
    Ok(())
}

// ============================================================================
// NumeratedKb dump/load
// ============================================================================

impl NumeratedKb {
    /// Dump every artifact to `<base>/<name>/`, returning that directory.
    pub fn dump(&self, base: &Path, config: &KbConfig) -> Result<PathBuf> {
        let dir = dump_staged(base, self.name(), |staging| {
            self.write_artifacts(staging, config.map_chunk_size)
        })?;
        info!(
            kb = self.name(),
            path = %dir.display(),
            relations = self.total_relations(),
            records = self.total_records(),
            numerations = self.total_mappings(),
            "KB dumped"
        );
        Ok(dir)
    }

    /// Write metadata, relation files, map chunks, then the category index.
    pub fn write_artifacts(&self, dir: &Path, map_chunk_size: usize) -> Result<()> {
        write_relation_info(dir, self.relations())?;
        for rel in self.relations() {
            let path = rel_file_path(dir, rel.id());
            write_le_ints(&path, rel.args().iter().copied())?;
            debug!(relation = rel.name(), records = rel.total_records(), "relation written");
        }
        write_map_chunks(dir, self.numeration_map().names(), map_chunk_size)?;
        if self.category_relation().is_some() {
            write_category_values(dir, &self.category_values())?;
        }
        Ok(())
    }

    /// Load the KB stored at `<base>/<name>/`.
    pub fn load(base: &Path, name: &str, config: &KbConfig) -> Result<Self> {
        check_kb_name(name)?;
        let dir = kb_path(base, name);
        let infos = read_relation_info(&dir)?;
        let map = NumerationMap::from_ordered_names(read_map_chunks(&dir)?)?;
        let total = map.total_mappings();

        let mut relations = Vec::with_capacity(infos.len());
        for (ordinal, info) in infos.into_iter().enumerate() {
            let path = rel_file_path(&dir, ordinal);
            let raw = read_le_ints(&path)?;
            let expected = info.total_records.checked_mul(info.arity).ok_or_else(|| {
                KbError::malformed(
                    &path,
                    format!(
                        "{} records of arity {} overflow the integer count",
                        info.total_records, info.arity
                    ),
                )
            })?;
            if raw.len() != expected {
                return Err(KbError::malformed(
                    &path,
                    format!(
                        "expected {expected} integers for {} records of arity {}, found {}",
                        info.total_records,
                        info.arity,
                        raw.len()
                    ),
                ));
            }
            let args = raw
                .into_iter()
                .map(|value| to_num(&path, value, total))
                .collect::<Result<Vec<u32>>>()?;
            relations.push(KbRelation::from_args(info.name, ordinal, info.arity, args)?);
        }

        let kb = NumeratedKb::from_parts(name, map, relations, config)?;
        info!(
            kb = name,
            relations = kb.total_relations(),
            records = kb.total_records(),
            numerations = kb.total_mappings(),
            "KB loaded"
        );
        Ok(kb)
    }
}
