//! Command line for the modpack installer.
//!
//! Updates, checks or re-indexes the client and/or server mod directories
//! against the manifest in the data directory.

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, CommandFactory, Parser};
use installer::{
    DescriptorIndex, HttpFetcher, InstallationTarget, IntoProgressCallback, LauncherConfig, Layout,
    LogProgressReporter, Manifest, Reconciler, Target, capacity, index, platform, reconcile,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "modpack")]
#[command(about = "Keep client and server mod directories in line with the modpack manifest")]
#[command(group(ArgGroup::new("action").required(true).args(["update", "check", "index"])))]
struct Args {
    /// Update mod files; download new files, delete old ones
    #[arg(short = 'u', long)]
    update: bool,

    /// Check for updates to the modpack without changing anything
    #[arg(short = 'x', long)]
    check: bool,

    /// Resolve every manifest entry against the descriptor index and rewrite the manifest
    #[arg(long)]
    index: bool,

    /// The client mod directory
    #[arg(short, long)]
    client: Option<PathBuf>,

    /// The server mod directory
    #[arg(short, long)]
    server: Option<PathBuf>,

    /// Directory holding mods.json, launcher.json and the index
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Descriptor index directory (defaults to <data-dir>/index)
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Manifest file (defaults to <data-dir>/mods.json)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Launcher config file (defaults to <data-dir>/launcher.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base temp directory for downloads (defaults to the platform temp directory)
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn layout(&self) -> Layout {
        let mut layout = Layout::from_data_dir(&self.data_dir);
        if let Some(ref index_dir) = self.index_dir {
            layout.index_dir = index_dir.clone();
        }
        if let Some(ref manifest) = self.manifest {
            layout.manifest_path = manifest.clone();
        }
        if let Some(ref config) = self.config {
            layout.config_path = config.clone();
        }
        layout
    }

    fn targets(&self) -> Vec<InstallationTarget> {
        [(Target::Client, &self.client), (Target::Server, &self.server)]
            .into_iter()
            .filter_map(|(kind, dir)| dir.as_ref().map(|dir| InstallationTarget::new(kind, dir)))
            .collect()
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn run(args: Args) -> Result<()> {
    let layout = args.layout();

    if args.index {
        return rebuild_index(&layout);
    }

    let targets = args.targets();
    if targets.is_empty() {
        Args::command().print_help()?;
        bail!("At least one of either the client or server mod directory must be specified");
    }

    index::require_root(&layout.index_dir)?;
    let manifest = Manifest::load(&layout.manifest_path)?;

    if args.check {
        return check(&manifest, &targets).await;
    }

    let config = LauncherConfig::load(&layout.config_path)?;
    let available = capacity::query_available_space(platform::capacity_root()?)?;
    capacity::validate(available, capacity::query_required_space(&config))?;

    let scratch_base = match args.temp_dir {
        Some(dir) => dir,
        None => platform::scratch_base()?,
    };
    let scratch_dir = platform::prepare_scratch_dir(&scratch_base)?;

    let fetcher = HttpFetcher::from_config(&config.fetch)?.with_progress(LogProgressReporter.into_callback());
    let reconciler = Reconciler::new(fetcher, &layout.index_dir, scratch_dir);

    let reports = reconciler
        .reconcile_all(&manifest, &targets)
        .await
        .context("Modpack update aborted")?;

    let installed: usize = reports.iter().map(|r| r.installed.len()).sum();
    let removed: usize = reports.iter().map(|r| r.removed.len()).sum();
    info!("Modpack updated: {} mods installed, {} files removed", installed, removed);
    Ok(())
}

/// Write resolved descriptor paths back into the manifest
fn rebuild_index(layout: &Layout) -> Result<()> {
    let index = DescriptorIndex::build(&layout.index_dir)?;
    info!("Found {} descriptors in {}", index.len(), layout.index_dir.display());

    let mut manifest = Manifest::load(&layout.manifest_path)?;
    manifest.resolve_and_persist(&index, &layout.manifest_path)?;
    Ok(())
}

/// Log what an update would do, touching nothing
async fn check(manifest: &Manifest, targets: &[InstallationTarget]) -> Result<()> {
    for target in targets {
        let plan = reconcile::plan(manifest, target).await?;
        if plan.is_converged() {
            info!("{} mods are up to date", plan.target);
            continue;
        }
        for required in &plan.missing {
            info!("{}: would install '{}' ({})", plan.target, required.record.name, required.record.filename);
        }
        for name in &plan.stale {
            info!("{}: would delete '{}'", plan.target, name);
        }
    }
    Ok(())
}
