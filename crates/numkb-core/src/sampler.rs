//! Major-node sampling.
//!
//! Nodes are ranked by total degree over all binary relations, category values
//! are skipped, and whole neighbourhoods are taken greedily until the selected
//! degree reaches the edge budget. The sampled edges are then renumbered with
//! the first-appearance numbering and kept as a standalone KB together with a
//! provenance map back to the original numerations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use roaring::RoaringBitmap;
use tracing::{debug, info};

use crate::codec::{self, dump_staged};
use crate::config::KbConfig;
use crate::error::{KbError, Result};
use crate::numeration::NumerationMap;
use crate::rearrange::FirstAppearance;
use crate::relation::KbRelation;
use crate::NumeratedKb;

/// A binary record seen as a labelled graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub subject: u32,
    /// Ordinal of the relation the record belongs to.
    pub relation: u32,
    pub object: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingStats {
    /// Hub nodes accepted.
    pub selected_nodes: usize,
    /// Sum of the accepted nodes' degrees (the budget counter).
    pub selected_degree: u64,
    /// Distinct edges in the sampled KB.
    pub sampled_edges: usize,
}

/// A sampled KB and the provenance of its numerations.
#[derive(Debug, Clone)]
pub struct SamplingResult {
    pub kb: NumeratedKb,
    /// `const_map[new] = original`; slot 0 is the sentinel.
    pub const_map: Vec<u32>,
    /// Original numerations of the selected hubs, in selection order.
    pub hubs: Vec<u32>,
    pub stats: SamplingStats,
}

impl SamplingResult {
    /// Dump the sampled KB plus `ConstMap.dat`.
    pub fn dump(&self, base: &Path, config: &KbConfig) -> Result<PathBuf> {
        let dir = dump_staged(base, self.kb.name(), |staging| {
            self.kb.write_artifacts(staging, config.map_chunk_size)?;
            codec::write_const_map(staging, &self.const_map)?;
            Ok(())
        })?;
        info!(
            kb = self.kb.name(),
            path = %dir.display(),
            numerations = self.kb.total_mappings(),
            "sampled KB dumped"
        );
        Ok(dir)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MajorNodeSampler {
    category_values: RoaringBitmap,
}

impl MajorNodeSampler {
    pub fn new(category_values: RoaringBitmap) -> Self {
        Self { category_values }
    }

    /// Sampler excluding the category values indexed in `dir/TypeValues.dat`.
    pub fn for_kb_dir(dir: &Path) -> Result<Self> {
        Ok(Self::new(codec::load_category_values(dir)?))
    }

    pub fn category_values(&self) -> &RoaringBitmap {
        &self.category_values
    }

    /// Sample `kb` until at least `budget` edges' worth of degree is selected.
    pub fn sample(
        &self,
        kb: &NumeratedKb,
        budget: u64,
        sampled_name: &str,
    ) -> Result<SamplingResult> {
        let adjacency = build_adjacency(kb);
        let ranked = rank_nodes(&adjacency);

        let mut sampled: Vec<BTreeSet<(u32, u32)>> = vec![BTreeSet::new(); kb.total_relations()];
        let mut stats = SamplingStats::default();
        let mut hubs = Vec::new();
        for node in ranked {
            if stats.selected_degree >= budget {
                break;
            }
            if self.category_values.contains(node) {
                continue;
            }
            let edges = &adjacency[node as usize];
            if edges.is_empty() {
                break;
            }
            hubs.push(node);
            stats.selected_nodes += 1;
            stats.selected_degree += edges.len() as u64;
            for edge in edges {
                sampled[edge.relation as usize].insert((edge.subject, edge.object));
            }
        }
        stats.sampled_edges = sampled.iter().map(BTreeSet::len).sum();
        debug!(
            nodes = stats.selected_nodes,
            degree = stats.selected_degree,
            budget,
            "major nodes selected"
        );

        let (sampled_kb, const_map) = reencode(kb, &sampled, sampled_name)?;
        info!(
            kb = sampled_name,
            hubs = stats.selected_nodes,
            edges = stats.sampled_edges,
            numerations = sampled_kb.total_mappings(),
            "KB sampled"
        );
        Ok(SamplingResult {
            kb: sampled_kb,
            const_map,
            hubs,
            stats,
        })
    }
}

/// Adjacency lists indexed by numeration (slot 0 stays empty).
///
/// Every binary record is pushed to both endpoints; a self-loop only once.
pub fn build_adjacency(kb: &NumeratedKb) -> Vec<Vec<Edge>> {
    let mut adjacency = vec![Vec::new(); kb.total_mappings() + 1];
    for rel in kb.relations().iter().filter(|rel| rel.arity() == 2) {
        for record in rel.records() {
            let edge = Edge {
                subject: record[0],
                relation: rel.id() as u32,
                object: record[1],
            };
            adjacency[edge.subject as usize].push(edge);
            if edge.object != edge.subject {
                adjacency[edge.object as usize].push(edge);
            }
        }
    }
    adjacency
}

/// Numerations by descending degree, ties in ascending numeration order.
pub fn rank_nodes(adjacency: &[Vec<Edge>]) -> Vec<u32> {
    let mut nodes: Vec<u32> = (1..adjacency.len() as u32).collect();
    nodes.sort_by(|a, b| adjacency[*b as usize].len().cmp(&adjacency[*a as usize].len()));
    nodes
}

fn reencode(
    kb: &NumeratedKb,
    sampled: &[BTreeSet<(u32, u32)>],
    sampled_name: &str,
) -> Result<(NumeratedKb, Vec<u32>)> {
    let mut numbering = FirstAppearance::new(kb.total_mappings());
    let mut relations = Vec::with_capacity(kb.total_relations());
    for (rel, pairs) in kb.relations().iter().zip(sampled) {
        let mut args = Vec::with_capacity(pairs.len() * 2);
        for &(subject, object) in pairs {
            args.push(numbering.assign(subject)?);
            args.push(numbering.assign(object)?);
        }
        relations.push(KbRelation::from_args(rel.name(), rel.id(), rel.arity(), args)?);
    }

    let const_map = numbering.into_new_to_old();
    let names = const_map[1..]
        .iter()
        .map(|&old| {
            kb.numeration_map()
                .name_of(old)
                .map(str::to_string)
                .ok_or(KbError::IdOutOfRange {
                    id: old as i64,
                    max: kb.total_mappings(),
                })
        })
        .collect::<Result<Vec<String>>>()?;
    let map = NumerationMap::from_ordered_names(names)?;

    let config = KbConfig {
        category_predicates: kb.category_predicates().to_vec(),
        ..KbConfig::default()
    };
    let sampled_kb = NumeratedKb::from_parts(sampled_name, map, relations, &config)?;
    Ok((sampled_kb, const_map))
}
