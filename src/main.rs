//! CLI entry point for the sparse index.
//!
//! Provides commands for configuring, building, querying and inspecting an
//! on-disk index. Documents are read as JSON lines.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use serde::Deserialize;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use seismic_sparse::display::{
    create_build_table, create_results_table, create_stats_table, optional_progress_bar,
    optional_spinner,
};
use seismic_sparse::{DocId, IndexConfig, IndexError, QueryParams, Settings, SparseIndex};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Sparse-vector index with clustered postings
#[derive(Parser)]
#[command(
    name = "seismic",
    version = env!("CARGO_PKG_VERSION"),
    about = "Sparse-vector index with clustered postings",
    long_about = "Build and query an embedded sparse-vector index with byte-quantized weights.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Quick Start:\n  $ seismic init\n  $ seismic index docs.jsonl --progress\n  $ seismic search '{\"17\": 1.2, \"940\": 0.4}' --k 5"
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .seismic directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// Ingest JSON-lines documents and build postings
    #[command(
        about = "Ingest documents and build the index",
        after_help = "Each line is a JSON object:\n  {\"id\": 1, \"vector\": {\"17\": 0.9, \"940\": 0.2}}"
    )]
    Index {
        /// JSON-lines file of documents
        path: PathBuf,

        /// Number of threads to use (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Discard any existing index first
        #[arg(short, long)]
        force: bool,

        /// Show progress during ingestion and build
        #[arg(short, long)]
        progress: bool,
    },

    /// Run a top-k query
    #[command(about = "Search the index with a JSON token -> weight object")]
    Search {
        /// Query vector, e.g. '{"17": 1.2}'
        query: String,

        /// Number of hits (overrides config)
        #[arg(short, long)]
        k: Option<usize>,

        /// Query tokens kept, heaviest first (overrides config)
        #[arg(long)]
        top_n: Option<usize>,

        /// Cluster skipping slack (overrides config)
        #[arg(long)]
        heap_factor: Option<f32>,

        /// Score multiplier
        #[arg(long)]
        boost: Option<f32>,

        /// Only return these document ids
        #[arg(long, value_delimiter = ',')]
        filter: Vec<u32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    #[command(about = "Display document, term and cluster counts")]
    Stats {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// One input line.
#[derive(Debug, Deserialize)]
struct DocumentRecord {
    id: u32,
    vector: HashMap<String, f32>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        if let Some(index_err) = err.downcast_ref::<IndexError>() {
            eprintln!("Code: {}", index_err.status_code());
            for suggestion in index_err.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .map_err(|e| anyhow!("Configuration error loading from {}: {e}", path.display()))?,
        None => Settings::load().unwrap_or_else(|e| {
            eprintln!("Configuration error: {e}");
            Settings::default()
        }),
    };

    init_tracing(&cli, &settings)?;

    match cli.command {
        Commands::Init { force } => {
            let path = Settings::init_config_file(force).map_err(|e| anyhow!("{e}"))?;
            println!("Created configuration file at: {}", path.display());
            println!("Edit this file to customize your settings.");
        }
        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!("{}", toml::to_string_pretty(&settings)?);
        }
        Commands::Index {
            path,
            threads,
            force,
            progress,
        } => {
            if let Some(threads) = threads {
                settings.clustering.parallel_threads = threads;
            }
            index_documents(&settings, &path, force, progress)?;
        }
        Commands::Search {
            query,
            k,
            top_n,
            heap_factor,
            boost,
            filter,
            json,
        } => {
            let mut params = settings.query_params();
            if let Some(k) = k {
                params.k = k;
            }
            if let Some(top_n) = top_n {
                params.top_n = top_n;
            }
            if let Some(heap_factor) = heap_factor {
                params.heap_factor = heap_factor;
            }
            if let Some(boost) = boost {
                params.boost = boost;
            }
            if !filter.is_empty() {
                params.filter = Some(filter.into_iter().map(DocId::new).collect::<BTreeSet<_>>());
            }
            search(&settings, &query, &params, json)?;
        }
        Commands::Stats { json } => {
            let index = SparseIndex::open(&settings.index_path, IndexConfig::from(&settings))?;
            let stats = index.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", create_stats_table(&stats));
            }
        }
    }
    Ok(())
}

fn init_tracing(cli: &Cli, settings: &Settings) -> Result<()> {
    let level = if cli.verbose || settings.debug {
        Level::DEBUG
    } else {
        settings.logging.level.parse::<Level>().unwrap_or(Level::WARN)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn index_documents(settings: &Settings, path: &Path, force: bool, progress: bool) -> Result<()> {
    let index_path = &settings.index_path;
    let config = IndexConfig::from(settings);

    if force && index_path.exists() {
        info!("Removing existing index at {}", index_path.display());
        std::fs::remove_dir_all(index_path)
            .with_context(|| format!("Failed to remove {}", index_path.display()))?;
    }

    let index = if SparseIndex::exists(index_path) {
        SparseIndex::open(index_path, config)?
    } else {
        SparseIndex::in_memory(config)?
    };

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let spinner = optional_spinner(progress, "Ingesting documents");
    let mut ingested = 0usize;
    let mut skipped = 0usize;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: DocumentRecord = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid document", path.display(), line_no + 1))?;
        if index
            .ingest(DocId::new(record.id), record.vector)
            .with_context(|| format!("{}:{}", path.display(), line_no + 1))?
        {
            ingested += 1;
        } else {
            skipped += 1;
        }
        spinner.inc(1);
    }
    spinner.finish_and_clear();
    if skipped > 0 {
        warn!("{skipped} documents were already indexed and were skipped");
    }

    let pending = index.stats().pending_terms as u64;
    let bar = optional_progress_bar(progress, pending, "Clustering postings");
    let stats = index.build_with_progress(|| bar.inc(1))?;
    bar.finish_and_clear();

    index.save(index_path)?;

    println!(
        "Indexed {ingested} documents ({skipped} skipped) into {}",
        index_path.display()
    );
    println!("{}", create_build_table(&stats));
    Ok(())
}

fn search(settings: &Settings, query: &str, params: &QueryParams, json: bool) -> Result<()> {
    let query: HashMap<String, f32> =
        serde_json::from_str(query).context("Query must be a JSON object of token -> weight")?;
    let index = SparseIndex::open(&settings.index_path, IndexConfig::from(settings))?;
    let results = index.search(query, params)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.hits.is_empty() {
        println!("No matching documents");
    } else {
        println!("{}", create_results_table(&results));
    }
    Ok(())
}
