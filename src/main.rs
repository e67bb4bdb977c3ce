//! Command-line driver replaying interaction scripts against a workspace.
use std::io::Write;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use blocksynth::{init_logging, Config, RecordingEngine, Script, Workspace};
use clap::Parser;
use log::info;

/// Replays block interaction scripts and prints the dispatched program
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON script of interaction events to replay
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start from the default scene
    #[arg(long)]
    seed: bool,

    /// Override the proximity threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = args
        .config
        .as_ref()
        .map_or_else(|| Ok(Config::default()), Config::from_path)?;
    if let Some(threshold) = args.threshold {
        config.proximity_threshold = threshold;
        config = config.validate()?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    let mut workspace = Workspace::with_config(&config, RecordingEngine::new());
    if args.seed {
        workspace.seed_default_scene()?;
    }
    ensure!(
        args.seed || args.script.is_some(),
        "nothing to do: pass --script and/or --seed"
    );
    if let Some(path) = &args.script {
        let script = Script::from_path(path)?;
        info!("replaying {} events from {}", script.events.len(), path.display());
        script
            .replay(&mut workspace)
            .with_context(|| format!("replaying {}", path.display()))?;
    }

    let mut stdout = std::io::stdout().lock();
    if let Some(program) = workspace.engine().last_program() {
        writeln!(stdout, "{program}")?;
    } else {
        info!("no program was dispatched");
    }
    Ok(())
}
