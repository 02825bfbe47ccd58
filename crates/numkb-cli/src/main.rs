//! numkb CLI
//!
//! - `convert`: ingest a YAGO-1 tree or TSV triples into a numerated KB
//! - `sample`: extract a major-node sample from a numerated KB
//! - `migrate`: rewrite a legacy numerated KB in the current layout
//!
//! Diagnostics go to stderr through `tracing` (`RUST_LOG`, default `warn`);
//! stage progress goes to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use numkb_core::codec::kb_path;
use numkb_core::migration::migrate;
use numkb_core::{KbConfig, MajorNodeSampler, NumeratedKb};
use numkb_ingest::{Converter, IngestStats, TsvSource, Yago1Source};

#[derive(Parser)]
#[command(name = "numkb")]
#[command(
    author,
    version,
    about = "numkb: dense-integer knowledge base encoding and sampling"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a triple collection into a numerated KB.
    Convert {
        /// Layout of the input.
        source: SourceKind,

        /// YAGO-1 root directory, or a TSV file/directory.
        input: PathBuf,

        /// Directory the KB directory is created in.
        output_path: PathBuf,

        /// Name of the output KB.
        output_name: String,

        /// JSON config file (defaults apply to missing keys).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Sample the highest-degree nodes of a numerated KB.
    Sample {
        /// Directory containing the original KB.
        input_path: PathBuf,

        /// Name of the original KB.
        original_name: String,

        /// Directory the sampled KB is created in.
        output_path: PathBuf,

        /// Name of the sampled KB.
        sampled_name: String,

        /// Minimum number of edges to select.
        budget: u64,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Rewrite a legacy numerated KB in the current layout.
    Migrate {
        /// Directory containing the legacy KB.
        old_path: PathBuf,

        /// Name of the legacy KB (kept for the migrated one).
        old_name: String,

        /// Directory the migrated KB is created in.
        new_path: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    /// `entities/` + `facts/<predicate>/` directory tree
    Yago1,
    /// `subject<TAB>predicate<TAB>object` lines
    Tsv,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            source,
            input,
            output_path,
            output_name,
            config,
        } => cmd_convert(source, &input, &output_path, &output_name, config.as_deref()),
        Commands::Sample {
            input_path,
            original_name,
            output_path,
            sampled_name,
            budget,
            config,
        } => cmd_sample(
            &input_path,
            &original_name,
            &output_path,
            &sampled_name,
            budget,
            config.as_deref(),
        ),
        Commands::Migrate {
            old_path,
            old_name,
            new_path,
            config,
        } => cmd_migrate(&old_path, &old_name, &new_path, config.as_deref()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

fn load_config(path: Option<&Path>) -> Result<KbConfig> {
    let config = match path {
        Some(path) => KbConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => KbConfig::default(),
    };
    tracing::debug!(?config, "effective configuration");
    Ok(config)
}

/// Run one pipeline stage, printing its label and elapsed time.
fn stage<T>(label: &str, run: impl FnOnce() -> Result<T>) -> Result<T> {
    println!("{} ...", label.green().bold());
    let started = Instant::now();
    let out = run()?;
    print_done(started.elapsed());
    Ok(out)
}

/// Report a stage that already ran inside a library pipeline.
fn print_stage(label: &str, elapsed: Duration) {
    println!("{} ...", label.green().bold());
    print_done(elapsed);
}

fn print_done(elapsed: Duration) {
    println!("  {} Done ({} ms)", "→".cyan(), elapsed.as_millis());
}

fn print_total(elapsed: Duration) {
    println!("{} {} ms", "Total time:".bold(), elapsed.as_millis());
}

fn print_kb(dir: &Path, relations: usize, records: usize, numerations: usize) {
    println!("  {} {}", "→".cyan(), dir.display());
    println!(
        "  {} {relations} relations, {records} records, {numerations} constants",
        "→".yellow(),
    );
}

fn cmd_convert(
    source: SourceKind,
    input: &Path,
    output_path: &Path,
    output_name: &str,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let converter = Converter::new(config.clone());

    let summary = match source {
        SourceKind::Yago1 => {
            let triples = Yago1Source::open(input)
                .with_context(|| format!("opening YAGO-1 layout {}", input.display()))?
                .skipping(&config.non_factual_predicates);
            converter.convert(triples, output_path, output_name)?
        }
        SourceKind::Tsv => {
            let triples = TsvSource::open(input)
                .with_context(|| format!("opening {}", input.display()))?;
            converter.convert(triples, output_path, output_name)?
        }
    };

    print_stage("Loading triples", summary.load_time);
    print_ingest_stats(&summary.ingest);
    print_stage("Rearranging mappings", summary.rearrange_time);
    print_stage("Dumping", summary.dump_time);
    print_kb(
        &summary.path,
        summary.relations,
        summary.records,
        summary.numerations,
    );
    print_total(summary.total_time());
    Ok(())
}

fn print_ingest_stats(stats: &IngestStats) {
    println!(
        "  {} {} triples read, {} skipped, {} duplicates",
        "→".yellow(),
        stats.read,
        stats.skipped,
        stats.duplicates
    );
    if stats.failed > 0 {
        eprintln!(
            "{} {} triples failed to be loaded",
            "warning:".yellow().bold(),
            stats.failed
        );
    }
}

fn cmd_sample(
    input_path: &Path,
    original_name: &str,
    output_path: &Path,
    sampled_name: &str,
    budget: u64,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let started = Instant::now();

    let (kb, sampler) = stage("Loading original KB", || {
        let kb = NumeratedKb::load(input_path, original_name, &config).with_context(|| {
            format!(
                "loading KB `{original_name}` from {}",
                input_path.display()
            )
        })?;
        let sampler = MajorNodeSampler::for_kb_dir(&kb_path(input_path, original_name))
            .context("loading category values")?;
        Ok((kb, sampler))
    })?;

    let result = stage("Sampling", || {
        sampler
            .sample(&kb, budget, sampled_name)
            .context("sampling major nodes")
    })?;
    println!(
        "  {} {} hubs, selected degree {}, {} edges",
        "→".yellow(),
        result.stats.selected_nodes,
        result.stats.selected_degree,
        result.stats.sampled_edges
    );

    let dir = stage("Dumping", || {
        result
            .dump(output_path, &config)
            .with_context(|| format!("dumping sample to {}", output_path.display()))
    })?;
    print_kb(
        &dir,
        result.kb.total_relations(),
        result.kb.total_records(),
        result.kb.total_mappings(),
    );
    print_total(started.elapsed());
    Ok(())
}

fn cmd_migrate(
    old_path: &Path,
    old_name: &str,
    new_path: &Path,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let summary = migrate(old_path, old_name, new_path, &config).with_context(|| {
        format!(
            "migrating legacy KB `{old_name}` from {}",
            old_path.display()
        )
    })?;

    print_stage("Loading original data", summary.load_time);
    print_stage("Rearranging mappings", summary.rearrange_time);
    print_stage("Dumping", summary.dump_time);
    print_kb(
        &summary.path,
        summary.relations,
        summary.records,
        summary.numerations,
    );
    print_total(summary.total_time());
    Ok(())
}
