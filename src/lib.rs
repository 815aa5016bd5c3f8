//! Roimill: scale-invariant region-of-interest detection over chained
//! worker pools.
//!
//! Datasets enter an ingestion pool and flow through a pyramid stage, a
//! sliding window stage and a detector stage. Every stage is a pool of
//! workers behind a router; pools are linked into a chain, locally or across
//! processes. Detections are accumulated per source, consolidated and
//! rendered back onto the original dataset.
//!
//! # Modules
//!
//! - [`roi`]: work units, metadata tags, datasets and coordinate decoding
//! - [`pool`]: the pool runtime and its Link/Work/Result/Shutdown protocol
//! - [`remote`]: addresses, the TCP endpoint and the remote resolver
//! - [`stages`]: the ingest, pyramid, slider, finder and consolidation stages
//! - [`consolidate`]: region merging, Non-Maximum Suppression and rendering
//! - [`store`]: per-source result accumulation
//! - [`error`]: error types for roimill operations

pub mod config;
pub mod consolidate;
pub mod error;
pub mod feeder;
pub mod logging;
pub mod mill;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod remote;
pub mod roi;
pub mod stages;
pub mod store;

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use tracing::info;

pub use error::RoiMillError;

use config::Config;
use consolidate::RenderMode;
use feeder::Feeder;
use mill::Mill;
use output::ResultWriter;
use pipeline::LocalPipeline;

/// The roimill CLI application.
#[derive(Parser)]
#[command(name = "roimill")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase logging verbosity (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run the detection pools and expose them to remote feeders.
    Mill(MillArgs),
    /// Feed sources to a remote mill and write the collected results.
    Thresh(ThreshArgs),
    /// Run the whole pipeline in this process.
    Run(RunArgs),
}

#[derive(clap::Args)]
struct MillArgs {
    /// Configuration file.
    config: PathBuf,
}

#[derive(clap::Args)]
struct ThreshArgs {
    /// Configuration file.
    config: PathBuf,

    /// Source datasets to ingest.
    files: Vec<PathBuf>,

    /// Seconds to wait for results before writing them.
    #[arg(long, default_value_t = 10)]
    wait_secs: u64,

    /// Render mode, overriding `consolidation.mode`.
    #[arg(long)]
    mode: Option<RenderMode>,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Configuration file.
    config: PathBuf,

    /// Source datasets to ingest.
    files: Vec<PathBuf>,

    /// Render mode, overriding `consolidation.mode`.
    #[arg(long)]
    mode: Option<RenderMode>,
}

/// Run the roimill CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), RoiMillError> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("roimill {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Scale-invariant ROI detection over chained worker pools.");
        println!();
        println!("Run 'roimill --help' for usage information.");
        return Ok(());
    };

    logging::init_logging(cli.verbose);

    // Configuration and inputs are checked before any pool exists
    let config_path = match &command {
        Commands::Mill(args) => &args.config,
        Commands::Thresh(args) => &args.config,
        Commands::Run(args) => &args.config,
    };
    let config = Config::load(config_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        match command {
            Commands::Mill(_) => run_mill(&config).await,
            Commands::Thresh(args) => run_thresh(&config, args).await,
            Commands::Run(args) => run_local(&config, args).await,
        }
    })
}

fn check_inputs(files: &[PathBuf]) -> Result<(), RoiMillError> {
    match files.iter().find(|f| !f.is_file()) {
        Some(missing) => Err(RoiMillError::MissingFile {
            path: missing.clone(),
        }),
        None => Ok(()),
    }
}

fn report(written: &[PathBuf]) {
    for path in written {
        println!("{}", path.display());
    }
}

async fn run_mill(config: &Config) -> Result<(), RoiMillError> {
    let mill = Mill::start(config).await?;
    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");
    mill.shutdown()?;
    mill.join().await
}

async fn run_thresh(config: &Config, args: ThreshArgs) -> Result<(), RoiMillError> {
    check_inputs(&args.files)?;
    let writer = ResultWriter::from_config(config, args.mode)?;

    let feeder = Feeder::connect(config).await?;
    for file in &args.files {
        feeder.ingest(file).await?;
    }
    if !feeder.is_degraded() {
        tokio::time::sleep(Duration::from_secs(args.wait_secs)).await;
    }
    let collected = feeder.collected().await?;
    info!(rois = collected, "Collected results");
    let written = feeder.write_results(&writer).await?;
    feeder.close().await?;
    report(&written);
    Ok(())
}

async fn run_local(config: &Config, args: RunArgs) -> Result<(), RoiMillError> {
    check_inputs(&args.files)?;
    let writer = ResultWriter::from_config(config, args.mode)?;

    let pipeline = LocalPipeline::start(config)?;
    for file in &args.files {
        pipeline.ingest(file).await?;
    }
    let mut store = pipeline.finish().await?;
    let written = writer.write_store(&mut store)?;
    report(&written);
    Ok(())
}
