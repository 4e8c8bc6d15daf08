// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use snapdot::{
    config::SnapdotConfig,
    path::{absolutize, default_index_file, default_settings_file},
    registry::inspect::MemberListing,
    Registry,
};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::{fs::read_to_string, io::ErrorKind, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "snapdot [options] <snapdot-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Use this index file instead of the configured one.
    #[arg(short, long, global = true, value_name = "path")]
    pub index: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self, registry: &mut Registry, config: &SnapdotConfig) -> Result<()> {
        match self.command {
            Command::Add(opts) => run_add(registry, opts),
            Command::Rm(opts) => run_rm(registry, opts),
            Command::Ls => run_ls(registry),
            Command::Backup(opts) => run_backup(registry, config, opts),
            Command::Restore(opts) => run_restore(registry, config, opts),
            Command::Inspect(opts) => run_inspect(config, opts),
            Command::Extract(opts) => run_extract(config, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Start tracking paths.
    #[command(override_usage = "snapdot add [options] <path>...")]
    Add(AddOptions),

    /// Stop tracking paths.
    #[command(override_usage = "snapdot rm [options] <path>...")]
    Rm(RmOptions),

    /// List tracked paths.
    #[command(override_usage = "snapdot ls [options]")]
    Ls,

    /// Back up every tracked path into an archive.
    #[command(override_usage = "snapdot backup [options] [<archive>]")]
    Backup(ArchiveOptions),

    /// Restore an archive, and track every path it restored.
    #[command(override_usage = "snapdot restore [options] [<archive>]")]
    Restore(ArchiveOptions),

    /// List members of an archive.
    #[command(override_usage = "snapdot inspect [options] [<archive>]")]
    Inspect(ArchiveOptions),

    /// Extract an archive into a directory without tracking anything.
    #[command(override_usage = "snapdot extract [options] <destination> [<archive>]")]
    Extract(ExtractOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Paths to track.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RmOptions {
    /// Paths to stop tracking.
    #[arg(required = true, value_name = "path")]
    pub paths: Vec<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ArchiveOptions {
    /// Archive to use instead of the configured one.
    #[arg(required = false, value_name = "archive")]
    pub archive: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExtractOptions {
    /// Directory to extract into.
    #[arg(required = true, value_name = "destination")]
    pub destination: PathBuf,

    /// Archive to use instead of the configured one.
    #[arg(required = false, value_name = "archive")]
    pub archive: Option<PathBuf>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config()?;
    let index_path = match (&cli.index, &config.settings.index) {
        (Some(path), _) | (None, Some(path)) => path.clone(),
        (None, None) => default_index_file()?,
    };

    let mut registry = Registry::load(index_path)?;
    let outcome = cli.run(&mut registry, &config);

    // INVARIANT: Index changes made before a failure are still persisted.
    let saved = registry.save();
    outcome?;
    saved?;

    Ok(())
}

fn load_config() -> Result<SnapdotConfig> {
    let path = default_settings_file()?;
    match read_to_string(&path) {
        Ok(content) => content
            .parse()
            .with_context(|| format!("invalid settings file {:?}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(SnapdotConfig::default()),
        Err(err) => {
            Err(err).with_context(|| format!("cannot read settings file {:?}", path.display()))
        }
    }
}

fn archive_path(config: &SnapdotConfig, archive: Option<PathBuf>) -> Result<PathBuf> {
    archive
        .or_else(|| config.settings.archive.clone())
        .ok_or_else(|| anyhow!("no archive given, and no default archive configured"))
}

fn run_add(registry: &mut Registry, opts: AddOptions) -> Result<()> {
    for path in opts.paths {
        registry.add(absolutize(path)?);
    }

    Ok(())
}

fn run_rm(registry: &mut Registry, opts: RmOptions) -> Result<()> {
    for path in opts.paths {
        registry.remove(absolutize(path)?);
    }

    Ok(())
}

fn run_ls(registry: &Registry) -> Result<()> {
    for path in registry.index().iter() {
        println!("{}", path.display());
    }

    Ok(())
}

fn run_backup(registry: &Registry, config: &SnapdotConfig, opts: ArchiveOptions) -> Result<()> {
    let archive = archive_path(config, opts.archive)?;
    registry
        .backup(&archive, &ProgressBar::new(0))
        .with_context(|| format!("backup to {:?} aborted", archive.display()))?;
    info!(
        "backed up {} paths into {:?}",
        registry.index().len(),
        archive.display()
    );

    Ok(())
}

fn run_restore(registry: &mut Registry, config: &SnapdotConfig, opts: ArchiveOptions) -> Result<()> {
    let archive = archive_path(config, opts.archive)?;
    let restored = registry
        .restore(&archive, &ProgressBar::new(0))
        .with_context(|| format!("restore from {:?} aborted", archive.display()))?;
    info!("restored {} paths from {:?}", restored.len(), archive.display());

    Ok(())
}

fn run_inspect(config: &SnapdotConfig, opts: ArchiveOptions) -> Result<()> {
    let archive = archive_path(config, opts.archive)?;
    for member in Registry::inspect(&archive)? {
        println!("{}", MemberListing::new(&member));
    }

    Ok(())
}

fn run_extract(config: &SnapdotConfig, opts: ExtractOptions) -> Result<()> {
    let archive = archive_path(config, opts.archive)?;
    Registry::extract(&archive, &opts.destination)
        .with_context(|| format!("extract into {:?} aborted", opts.destination.display()))?;

    Ok(())
}
