//! Conversion pipeline: ingest → rearrange → dump.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use numkb_core::{rearrange, KbConfig, NumeratedKb};
use tracing::{debug, info, warn};

use crate::TripleSource;

/// Counters of one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Triples yielded by the source, malformed lines included.
    pub read: usize,
    /// Dropped for a non-factual predicate.
    pub skipped: usize,
    /// Malformed or unrepresentable triples.
    pub failed: usize,
    /// Exact repeats of an already-ingested record.
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSummary {
    pub ingest: IngestStats,
    pub relations: usize,
    pub records: usize,
    pub numerations: usize,
    pub path: PathBuf,
    pub load_time: Duration,
    pub rearrange_time: Duration,
    pub dump_time: Duration,
}

impl ConvertSummary {
    pub fn total_time(&self) -> Duration {
        self.load_time + self.rearrange_time + self.dump_time
    }
}

pub struct Converter {
    config: KbConfig,
}

impl Converter {
    pub fn new(config: KbConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    /// Predicates dropped for `source`: the configured set plus the source's own.
    pub fn skip_set<S: TripleSource + ?Sized>(&self, source: &S) -> HashSet<String> {
        self.config
            .non_factual_predicates
            .iter()
            .cloned()
            .chain(source.source_skip_predicates().iter().map(|p| p.to_string()))
            .collect()
    }

    /// Read every triple of `source` into a fresh KB named `name`.
    ///
    /// Malformed lines and unrepresentable triples are counted and skipped;
    /// source I/O failures and identifier exhaustion abort.
    pub fn ingest<S: TripleSource>(
        &self,
        name: &str,
        mut source: S,
    ) -> Result<(NumeratedKb, IngestStats)> {
        let skip = self.skip_set(&source);
        let mut kb = NumeratedKb::with_config(name, &self.config);
        let mut stats = IngestStats::default();

        for item in &mut source {
            stats.read += 1;
            let triple = match item {
                Ok(triple) => triple,
                Err(err) if err.is_recoverable() => {
                    debug!(error = %err, "malformed triple");
                    stats.failed += 1;
                    continue;
                }
                Err(err) => return Err(err).context("reading triples"),
            };
            if skip.contains(&triple.predicate) {
                stats.skipped += 1;
                continue;
            }
            match kb.add_record(&triple.predicate, &[&triple.subject, &triple.object]) {
                Ok(true) => {}
                Ok(false) => stats.duplicates += 1,
                Err(err) if err.is_recoverable() => {
                    debug!(error = %err, predicate = %triple.predicate, "triple rejected");
                    stats.failed += 1;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!(
                            "adding ({}, {}, {})",
                            triple.subject, triple.predicate, triple.object
                        )
                    })
                }
            }
        }

        if stats.failed > 0 {
            warn!(failed = stats.failed, "triples failed to be loaded");
        }
        info!(
            kb = name,
            read = stats.read,
            skipped = stats.skipped,
            relations = kb.total_relations(),
            records = kb.total_records(),
            numerations = kb.total_mappings(),
            "triples loaded"
        );
        Ok((kb, stats))
    }

    /// Ingest, rearrange, and dump to `<output_path>/<output_name>/`.
    pub fn convert<S: TripleSource>(
        &self,
        source: S,
        output_path: &Path,
        output_name: &str,
    ) -> Result<ConvertSummary> {
        let started = Instant::now();
        let (mut kb, ingest) = self.ingest(output_name, source)?;
        let load_time = started.elapsed();

        let started = Instant::now();
        rearrange(&mut kb).context("rearranging numerations")?;
        let rearrange_time = started.elapsed();

        let started = Instant::now();
        let path = kb
            .dump(output_path, &self.config)
            .with_context(|| format!("dumping KB to {}", output_path.display()))?;
        let dump_time = started.elapsed();

        Ok(ConvertSummary {
            ingest,
            relations: kb.total_relations(),
            records: kb.total_records(),
            numerations: kb.total_mappings(),
            path,
            load_time,
            rearrange_time,
            dump_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySource, Triple};

    #[test]
    fn skip_set_unites_config_and_source() {
        let converter = Converter::new(KbConfig::default());
        let source = MemorySource::default().with_source_skip(&["describes"]);
        let skip = converter.skip_set(&source);
        assert!(skip.contains("rdfs:label"));
        assert!(skip.contains("describes"));
        assert!(!skip.contains("rdf:type"));
    }

    #[test]
    fn ingest_counts_skips_failures_and_duplicates() {
        let converter = Converter::new(KbConfig::default());
        let source: MemorySource = vec![
            Triple::new("a", "knows", "b"),
            Triple::new("a", "label", "A"),
            Triple::new("a", "knows", "b"),
            Triple::new("a", "knows", "bad\nname"),
            Triple::new("b", "knows", "c"),
        ]
        .into_iter()
        .collect();

        let (kb, stats) = converter.ingest("kb", source).unwrap();
        assert_eq!(
            stats,
            IngestStats {
                read: 5,
                skipped: 1,
                failed: 1,
                duplicates: 1,
            }
        );
        assert_eq!(kb.total_records(), 2);
        assert_eq!(kb.total_mappings(), 3);
        assert!(kb.relation("label").is_none());
    }
}
