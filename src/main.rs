//! RPGML runtime - Main Entry Point
//!
//! Loads a TOML graph description from a file or stdin and runs it until a
//! node requests exit or the pass limit is reached.

use anyhow::Context;
use clap::Parser;
use rpgml::{config::GraphFile, gc::GarbageCollector, pipeline::load_graph};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run an RPGML node graph
#[derive(Debug, Parser)]
#[command(name = "rpgml", version, about)]
struct Cli {
    /// Graph description (TOML); read from stdin when omitted
    source: Option<PathBuf>,

    /// Number of worker threads
    #[arg(long)]
    threads: Option<usize>,

    /// Stop after this many passes
    #[arg(long)]
    passes: Option<u64>,

    /// Run the collector every N passes (0 disables it)
    #[arg(long)]
    gc_interval: Option<u64>,
}

fn read_graph(source: Option<&PathBuf>) -> anyhow::Result<GraphFile> {
    match source {
        Some(path) => GraphFile::load(path).with_context(|| format!("loading {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading graph from stdin")?;
            GraphFile::from_toml_str(&text).context("parsing graph from stdin")
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut file = read_graph(cli.source.as_ref())?;
    if let Some(threads) = cli.threads {
        file.runtime.threads = threads;
    }
    if let Some(passes) = cli.passes {
        file.runtime.max_passes = Some(passes);
    }
    if let Some(interval) = cli.gc_interval {
        file.runtime.gc_interval = interval;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(file.runtime.log_filter())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RPGML runtime");

    let gc = Arc::new(GarbageCollector::new());
    let loaded = load_graph(&file, gc).context("building graph")?;
    let mut runtime = loaded.into_runtime().context("starting runtime")?;
    let summary = runtime.run().context("running graph")?;

    tracing::info!("Shutting down...");
    let stats = runtime.shutdown();
    tracing::info!(
        "{} passes, {} failed ticks, {} objects collected",
        summary.passes,
        summary.failed_ticks,
        summary.collected + stats.collected
    );
    Ok(())
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
