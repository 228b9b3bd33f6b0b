use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use core_shaping::{
    load_shaping_config_from_env, replay_trace, ReplayOptions, RewardShaper, ShapingConfig,
};

/// Replays a JSON-lines telemetry trace through a reward shaper and prints
/// per-episode statistics.
#[derive(Debug, Parser)]
#[command(name = "shaping_replay")]
struct Args {
    /// Trace file; reads stdin when omitted.
    trace: Option<PathBuf>,

    /// Shaping config file. Falls back to SHAPING_CONFIG_PATH, then the builtin.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the position heat matrix after the last episode.
    #[arg(long)]
    heat_matrix: bool,

    /// Print the statistics averaged over every finished episode.
    #[arg(long)]
    summary: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ShapingConfig::from_file(path)
            .with_context(|| format!("loading shaping config {}", path.display()))?,
        None => load_shaping_config_from_env().0.as_ref().clone(),
    };

    let reader: Box<dyn BufRead> = match &args.trace {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening trace {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let mut shaper = RewardShaper::new(&config).context("building reward shaper")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let options = ReplayOptions {
        summary: args.summary,
        heat_matrix: args.heat_matrix,
    };
    replay_trace(&mut shaper, reader, &mut out, options).context("replaying trace")?;
    Ok(())
}
