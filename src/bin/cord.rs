//! cord CLI - replay recorded gateway sessions into the entity cache
//!
//! `cord replay session.ndjson` applies every dispatch event in the file and
//! prints what ended up in the cache. `cord schema` lists each model's fields.

use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use cord::ingest::{self, ReplayStats};
use cord::models::schemas;
use cord::runtime::{CacheConfig, CacheSummary, State};

#[derive(Parser)]
#[command(name = "cord")]
#[command(version, about = "Hydrate gateway records into a typed entity cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an NDJSON file of gateway payloads and print the cache summary
    Replay {
        /// NDJSON file, one gateway payload per line ("-" for stdin)
        events: PathBuf,

        /// YAML file with a `cache` section
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate and print the field table of every model
    Schema,
}

#[derive(serde::Serialize)]
struct ReplayReport {
    replay: ReplayStats,
    cache: CacheSummary,
}

fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay { events, config } => replay(events, config),
        Commands::Schema => print_schemas(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn replay(events: PathBuf, config: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let config = match config {
        Some(path) => CacheConfig::load_from_file(path)?,
        None => CacheConfig::default(),
    }
    .with_env();
    tracing::info!(?config, "Starting replay");

    let state = State::new(config);
    let stats = if events.as_os_str() == "-" {
        ingest::replay(&state, io::stdin().lock())?
    } else {
        ingest::replay(&state, BufReader::new(File::open(&events)?))?
    };

    let report = ReplayReport {
        replay: stats,
        cache: state.summary(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_schemas() -> Result<(), Box<dyn Error>> {
    for schema in schemas() {
        schema.validate()?;
        println!("{} ({})", schema.name, schema.kind);
        for field in schema.fields {
            println!("  {}", field);
        }
    }
    Ok(())
}
