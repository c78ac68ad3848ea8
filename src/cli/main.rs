//! Command-line front end for the region resolver.
//!
//! Resolves single points or CSV batches against a division snapshot or a
//! sled database, and imports snapshots into sled.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use quyu::config::{Config, StoreBackend};
use quyu::store::{snapshot, DivisionStore, SledDivisionStore};
use quyu::{GeocodingProvider, RegionResolver, ResolverMode};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const BATCH_CHUNK: usize = 1_000;

#[derive(Parser, Debug)]
#[command(name = "quyu")]
#[command(about = "Resolve coordinates to Chinese administrative regions")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the resolver mode
    #[arg(long, value_enum)]
    mode: Option<ResolverMode>,

    /// Division snapshot (JSON or CSV) to load into memory
    #[arg(long, conflicts_with = "db")]
    snapshot: Option<PathBuf>,

    /// Sled division database directory
    #[arg(long)]
    db: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a single coordinate and print JSON
    Resolve {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Resolve a CSV of `lat,lon` rows
    Batch {
        #[arg(short, long)]
        input: PathBuf,
        /// Output CSV (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import a snapshot into a sled database
    Import {
        /// Snapshot file (JSON or CSV, optionally .gz)
        snapshot: PathBuf,
        /// Target database directory
        db: PathBuf,
    },
    /// Report store capabilities
    Probe,
}

#[derive(Debug, Deserialize)]
struct PointRow {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    store: &'static str,
    mode: ResolverMode,
    exact_supported: bool,
    strategy: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Import {
            snapshot: ref path,
            ref db,
        } => import(path, db),
        Command::Resolve { lat, lon } => {
            let provider = load_config(&args)?.build_provider()?;
            info!("Using {} provider", provider.name());

            let info = provider.reverse(lat, lon).await;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Command::Batch {
            ref input,
            ref output,
        } => {
            let provider = load_config(&args)?.build_provider()?;
            let resolver = provider
                .resolver()
                .context("Batch resolution needs the local provider")?;
            batch(resolver, input, output.as_deref()).await
        }
        Command::Probe => {
            let provider = load_config(&args)?.build_provider()?;
            let resolver = provider
                .resolver()
                .context("Probing needs the local provider")?;

            let exact_supported = resolver
                .store()
                .has_exact_geometry_support()
                .await
                .unwrap_or(false);
            let report = ProbeReport {
                store: resolver.store().name(),
                mode: resolver.mode(),
                exact_supported,
                strategy: format!("{:?}", resolver.strategy().await),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

/// Configuration file plus command-line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };

    if let Some(mode) = args.mode {
        config.resolver.mode = mode;
    }
    if let Some(path) = &args.snapshot {
        config.store.backend = StoreBackend::Memory;
        config.store.snapshot = Some(path.clone());
    }
    if let Some(path) = &args.db {
        config.store.backend = StoreBackend::Sled;
        config.store.path = Some(path.clone());
    }

    Ok(config)
}

fn import(snapshot_path: &Path, db: &Path) -> Result<()> {
    let divisions = snapshot::load_snapshot(snapshot_path)?;
    let store = SledDivisionStore::open(db)?;
    let written = store.import(divisions)?;
    info!(
        "Database {} now holds {} divisions ({} written)",
        db.display(),
        store.len()?,
        written
    );
    Ok(())
}

async fn batch(resolver: &RegionResolver, input: &Path, output: Option<&Path>) -> Result<()> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let points = reader
        .deserialize::<PointRow>()
        .map(|row| row.map(|p| (p.lat, p.lon)))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read points")?;
    info!("Resolving {} points", points.len());

    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record([
        "lat",
        "lon",
        "province",
        "city",
        "district",
        "province_en",
        "city_en",
        "district_en",
        "memo",
    ])?;

    let pb = ProgressBar::new(points.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    for chunk in points.chunks(BATCH_CHUNK) {
        let results = resolver.resolve_many(chunk).await;
        for ((lat, lon), result) in chunk.iter().zip(results) {
            writer.write_record([
                lat.to_string(),
                lon.to_string(),
                result.province.name,
                result.city.name,
                result.district.name,
                result.province.name_en,
                result.city.name_en,
                result.district.name_en,
                result.memo,
            ])?;
        }
        pb.inc(chunk.len() as u64);
    }

    writer.flush()?;
    pb.finish_and_clear();

    let stats = resolver.stats();
    info!(
        "Done: {} queries, {} exact, {} approximate, {} fallbacks, {} not found",
        stats.queries,
        stats.exact_queries,
        stats.approximate_queries,
        stats.exact_fallbacks,
        stats.not_found
    );
    Ok(())
}
