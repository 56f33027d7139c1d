use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

use chainsaw::catalog::ContentCatalog;
use chainsaw::catalog::entities::ProgramType;
use chainsaw::config::EngineConfig;
use chainsaw::segment::store::SegmentStore;
use chainsaw::segment::{Chain, SegmentBundle};

#[derive(Parser)]
#[command(name = "chainsaw", version, about = "Generative chain fabrication engine")]
struct Cli {
    /// Path to the engine config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fabricate a chain of segments from a catalog snapshot
    Fabricate {
        /// Catalog snapshot (JSON)
        catalog: PathBuf,

        /// Chain name
        #[arg(long, default_value = "demo")]
        name: String,

        /// Number of segments to craft
        #[arg(short = 'n', long, default_value = "8")]
        segments: usize,

        /// Override the configured random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write the fabricated chain as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show catalog statistics
    Inspect {
        /// Catalog snapshot (JSON)
        catalog: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let mut config = EngineConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Fabricate {
            catalog,
            name,
            segments,
            seed,
            output,
        } => {
            if let Some(seed) = seed {
                config.craft.seed = seed;
            }
            let catalog = load_catalog(&catalog)?;

            let mut store = SegmentStore::new();
            let chain = Chain::new(&name, Utc::now());
            store.put_chain(chain.clone());

            let bundles =
                chainsaw::craft::fabricate_chain(&catalog, &mut store, chain.id, segments, &config)
                    .context("Fabrication failed")?;

            println!();
            println!("Chain \"{}\": {} segments", chain.name, bundles.len());
            println!();
            print_segment_table(&bundles);

            if let Some(path) = output {
                let export = store.export_chain(chain.id).context("Export failed")?;
                let json = serde_json::to_string_pretty(&export)?;
                fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!();
                println!("Chain written to {}", path.display());
            }
        }

        Commands::Inspect { catalog } => {
            let catalog = load_catalog(&catalog)?;
            print_catalog_stats(&catalog);
        }
    }

    Ok(())
}

fn load_catalog(path: &Path) -> Result<ContentCatalog> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    ContentCatalog::from_json(&json).context("Failed to parse catalog JSON")
}

/// Print a fixed-width summary of the crafted segments.
fn print_segment_table(bundles: &[SegmentBundle]) {
    println!(
        "{:<4} {:<10} {:<10} {:>6} {:>5} {:>7} {:>5}  {}",
        "Off", "Type", "Key", "Tempo", "Beats", "Choices", "Picks", "Memes"
    );
    println!("{}", "-".repeat(80));

    for bundle in bundles {
        let segment = &bundle.segment;
        let segment_type = segment
            .segment_type
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".into());
        let key = segment.key.clone().unwrap_or_else(|| "-".into());
        let mut memes: Vec<&str> = bundle.memes.iter().map(|m| m.name.as_str()).collect();
        memes.sort();

        println!(
            "{:<4} {:<10} {:<10} {:>6.1} {:>5} {:>7} {:>5}  {}",
            segment.offset,
            segment_type,
            key,
            segment.tempo.unwrap_or(0.0),
            segment.total.unwrap_or(0),
            bundle.choices.len(),
            bundle.picks.len(),
            memes.join(" "),
        );
    }
}

/// Print catalog statistics: programs by type, then instrument counts.
fn print_catalog_stats(catalog: &ContentCatalog) {
    println!("Catalog");
    println!("=======");

    for program_type in [
        ProgramType::Macro,
        ProgramType::Main,
        ProgramType::Rhythm,
        ProgramType::Detail,
    ] {
        let programs = catalog.programs_of_type(program_type);
        if programs.is_empty() {
            continue;
        }
        println!();
        println!("{} programs:", program_type);
        for program in programs {
            let sequences = catalog.sequences_of_program(program.id).len();
            let offsets = catalog.available_offsets(program.id);
            let voices = catalog.voices_of_program(program.id).len();
            if offsets.is_empty() {
                println!(
                    "  {:<24} key {:<9} {:>5.1} BPM  {} sequences, {} voices",
                    program.name, program.key, program.tempo, sequences, voices
                );
            } else {
                println!(
                    "  {:<24} key {:<9} {:>5.1} BPM  {} sequences, offsets {:?}",
                    program.name, program.key, program.tempo, sequences, offsets
                );
            }
        }
    }

    println!();
    println!(
        "{} instruments, {} audios",
        catalog.instruments.len(),
        catalog.instrument_audios.len()
    );
}
