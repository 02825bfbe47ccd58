use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;

fn numkb_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_numkb"))
}

fn run(args: &[&str]) -> Output {
    Command::new(numkb_bin())
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("run numkb")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn write_facts(path: &Path) {
    fs::write(
        path,
        "alice\tknows\tbob\n\
         bob\tknows\tcarol\n\
         carol\tknows\talice\n\
         alice\trdf:type\tPerson\n\
         bob\trdf:type\tPerson\n\
         dave\tlikes\talice\n",
    )
    .expect("write facts");
}

#[test]
fn convert_then_sample() {
    let work = tempdir().expect("tempdir");
    let facts = work.path().join("facts.tsv");
    write_facts(&facts);
    let kbs = work.path().join("kbs");

    let out = run(&["convert", "tsv", path_arg(&facts), path_arg(&kbs), "family"]);
    assert!(out.status.success(), "convert failed: {out:?}");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Loading triples"));
    assert!(stdout.contains("Rearranging mappings"));
    assert!(stdout.contains("Total time:"));

    let kb_dir = kbs.join("family");
    assert_eq!(
        fs::read_to_string(kb_dir.join("Relations.tsv")).expect("relations"),
        "knows\t2\t3\nrdf:type\t2\t2\nlikes\t2\t1\n"
    );
    assert!(kb_dir.join("TypeValues.dat").is_file());

    let out = run(&[
        "sample",
        path_arg(&kbs),
        "family",
        path_arg(&kbs),
        "family_s",
        "2",
    ]);
    assert!(out.status.success(), "sample failed: {out:?}");
    let sampled = kbs.join("family_s");
    let const_map = fs::read(sampled.join("ConstMap.dat")).expect("const map");
    let map = fs::read_to_string(sampled.join("map1.tsv")).expect("map");
    assert_eq!(const_map.len(), 4 * map.lines().count());
    assert!(!map.lines().any(|line| line.is_empty()));
}

#[test]
fn migrate_legacy_layout() {
    let work = tempdir().expect("tempdir");
    let legacy = work.path().join("old").join("legacy");
    fs::create_dir_all(&legacy).expect("legacy dir");
    let ints: Vec<u8> = [2i32, 1].iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(legacy.join("knows_2_1.rel"), ints).expect("rel");
    fs::write(legacy.join("map1.tsv"), "alice\t1\nbob\t2\n").expect("map");

    let new = work.path().join("new");
    let out = run(&[
        "migrate",
        path_arg(&work.path().join("old")),
        "legacy",
        path_arg(&new),
    ]);
    assert!(out.status.success(), "migrate failed: {out:?}");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Loading original data"));
    assert!(stdout.contains("Rearranging mappings"));
    assert!(stdout.contains("1 relations, 1 records, 2 constants"));
    assert!(stdout.contains("Total time:"));
    assert_eq!(
        fs::read_to_string(new.join("legacy").join("map1.tsv")).expect("map"),
        "bob\nalice\n"
    );
}

#[test]
fn missing_input_fails_with_path() {
    let work = tempdir().expect("tempdir");
    let missing = work.path().join("nowhere");
    let out = run(&[
        "convert",
        "yago1",
        path_arg(&missing),
        path_arg(work.path()),
        "kb",
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("nowhere"), "stderr: {stderr}");
    assert!(!work.path().join("kb").exists());
}

#[test]
fn bad_config_is_rejected() {
    let work = tempdir().expect("tempdir");
    let facts = work.path().join("facts.tsv");
    write_facts(&facts);
    let config = work.path().join("numkb.json");
    fs::write(&config, r#"{ "map_chunk_size": 0 }"#).expect("config");

    let out = run(&[
        "convert",
        "tsv",
        path_arg(&facts),
        path_arg(work.path()),
        "kb",
        "--config",
        path_arg(&config),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("map_chunk_size"));
}
