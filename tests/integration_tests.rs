//! Integration tests for the complete numkb pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Triple source → Converter → dumped KB → load
//! - Loaded KB → MajorNodeSampler → sampled KB → provenance decode
//! - Legacy layout → migration → same artifacts as a direct conversion
//!
//! Run with: cargo test --test integration_tests

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use numkb_core::codec::{self, kb_path};
use numkb_core::migration::migrate;
use numkb_core::{KbConfig, MajorNodeSampler, NumeratedKb};
use numkb_ingest::{Converter, MemorySource, Triple};
use proptest::prelude::*;
use tempfile::tempdir;

fn decoded(kb: &NumeratedKb) -> BTreeSet<Triple> {
    let mut out = BTreeSet::new();
    for rel in kb.relations() {
        for record in rel.records() {
            let names = kb.decode_record(record).unwrap();
            out.insert(Triple::new(names[0], rel.name(), names[1]));
        }
    }
    out
}

fn social_triples() -> Vec<Triple> {
    let mut triples = Vec::new();
    for i in 0..8 {
        triples.push(Triple::new("hub", "knows", format!("p{i}")));
        triples.push(Triple::new(format!("p{i}"), "likes", format!("p{}", (i + 1) % 8)));
        triples.push(Triple::new(format!("p{i}"), "type", "Person"));
    }
    triples.push(Triple::new("hub", "type", "Person"));
    triples.push(Triple::new("hub", "label", "The Hub"));
    triples
}

// ============================================================================
// Convert → load → sample
// ============================================================================

#[test]
fn test_convert_load_sample_decode() {
    let base = tempdir().unwrap();
    let config = KbConfig {
        map_chunk_size: 4,
        ..KbConfig::default()
    };
    let triples = social_triples();
    let summary = Converter::new(config.clone())
        .convert(MemorySource::new(triples.clone()), base.path(), "social")
        .unwrap();
    assert_eq!(summary.ingest.skipped, 1);

    let kb = NumeratedKb::load(base.path(), "social", &config).unwrap();
    let expected: BTreeSet<Triple> = triples
        .into_iter()
        .filter(|t| t.predicate != "label")
        .collect();
    assert_eq!(decoded(&kb), expected);
    // Person only occurs as a category value and is numbered last
    assert_eq!(
        kb.numeration_map().num_of("Person"),
        Some(kb.total_mappings() as u32)
    );

    let dir = kb_path(base.path(), "social");
    let sampler = MajorNodeSampler::for_kb_dir(&dir).unwrap();
    let person = kb.numeration_map().num_of("Person").unwrap();
    assert!(sampler.category_values().contains(person));

    let result = sampler.sample(&kb, 5, "social_s").unwrap();
    assert_eq!(
        result.hubs,
        vec![kb.numeration_map().num_of("hub").unwrap()]
    );
    assert!(result.stats.selected_degree >= 5);
    result.dump(base.path(), &config).unwrap();

    let sampled = NumeratedKb::load(base.path(), "social_s", &config).unwrap();
    let const_map = codec::read_const_map(&kb_path(base.path(), "social_s")).unwrap();
    assert_eq!(const_map.len(), sampled.total_mappings() + 1);
    for rel in sampled.relations() {
        let original_rel = kb.relation(rel.name()).unwrap();
        assert_eq!(original_rel.id(), rel.id());
        for record in rel.records() {
            let original: Vec<u32> = record.iter().map(|&n| const_map[n as usize]).collect();
            assert!(original_rel.contains(&original));
            assert_eq!(kb.decode_record(&original), sampled.decode_record(record));
        }
    }
    // Only the hub's own edges are sampled
    assert_eq!(sampled.relation("knows").unwrap().total_records(), 8);
    assert!(sampled.relation("likes").unwrap().is_empty());
    assert_eq!(sampled.relation("type").unwrap().total_records(), 1);
}

// ============================================================================
// Migration
// ============================================================================

fn write_as_legacy(kb: &NumeratedKb, base: &Path) {
    let dir = base.join(kb.name());
    fs::create_dir_all(&dir).unwrap();
    for rel in kb.relations() {
        let file = dir.join(format!(
            "{}_{}_{}.rel",
            rel.name(),
            rel.arity(),
            rel.total_records()
        ));
        codec::write_le_ints(&file, rel.args().iter().copied()).unwrap();
    }
    let lines: String = kb
        .numeration_map()
        .iter()
        .map(|(num, name)| format!("{name}\t{num:x}\n"))
        .collect();
    fs::write(dir.join("map1.tsv"), lines).unwrap();
}

#[test]
fn test_migration_matches_direct_conversion() {
    let converted = tempdir().unwrap();
    let legacy = tempdir().unwrap();
    let migrated = tempdir().unwrap();
    let config = KbConfig::default();

    Converter::new(config.clone())
        .convert(MemorySource::new(social_triples()), converted.path(), "social")
        .unwrap();
    let kb = NumeratedKb::load(converted.path(), "social", &config).unwrap();
    write_as_legacy(&kb, legacy.path());

    migrate(legacy.path(), "social", migrated.path(), &config).unwrap();

    let a = kb_path(converted.path(), "social");
    let b = kb_path(migrated.path(), "social");
    for file in ["Relations.tsv", "0.rel", "1.rel", "2.rel", "map1.tsv", "TypeValues.dat"] {
        assert_eq!(
            fs::read(a.join(file)).unwrap(),
            fs::read(b.join(file)).unwrap(),
            "{file} differs"
        );
    }
}

// ============================================================================
// Round trip
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn dumped_kb_decodes_to_input_triples(
        raw in prop::collection::vec((0u8..12, 0usize..3, 0u8..12), 1..60),
        chunk in 1usize..5,
    ) {
        const PREDICATES: [&str; 3] = ["knows", "likes", "rdf:type"];
        let triples: Vec<Triple> = raw
            .into_iter()
            .map(|(s, p, o)| Triple::new(format!("e{s}"), PREDICATES[p], format!("e{o}")))
            .collect();
        let base = tempdir().unwrap();
        let config = KbConfig {
            map_chunk_size: chunk,
            ..KbConfig::default()
        };
        Converter::new(config.clone())
            .convert(MemorySource::new(triples.clone()), base.path(), "rt")
            .unwrap();

        let kb = NumeratedKb::load(base.path(), "rt", &config).unwrap();
        let expected: BTreeSet<Triple> = triples.into_iter().collect();
        prop_assert_eq!(decoded(&kb), expected);
    }
}
