use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shipit::cli::orchestration::read_changelog;
use shipit::cli::{ReleaseKind, ReleaseOrchestrator, ReleaseRequest};
use shipit::config;
use shipit::supervisor::ProcessSupervisor;
use shipit::{ui, ShipitError};

#[derive(clap::Parser)]
#[command(
    name = "shipit",
    version,
    about = "Build and release a project at the latest version in its changelog"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(
        short = 'C',
        long,
        global = true,
        help = "Project directory (defaults to the current directory)"
    )]
    project_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the build script with the latest changelog version
    Build {
        #[arg(short, long, help = "Print the full output while the build runs")]
        verbose: bool,
    },
    /// Run the release script, then tag the version and push tags
    Release {
        #[arg(short, long, help = "Print the full output while the release runs")]
        verbose: bool,
    },
    /// List the versions found in the changelog
    Versions,
}

fn main() {
    let args = Args::parse();

    let verbose = matches!(
        args.command,
        Commands::Build { verbose: true } | Commands::Release { verbose: true }
    );
    init_tracing(verbose);

    if let Err(e) = run(args) {
        report_failure(&e, verbose);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<()> {
    let project_dir = resolve_project_dir(args.project_dir.as_deref())?;
    let config = config::load_config(args.config.as_deref(), &project_dir)?;

    let (kind, verbose) = match args.command {
        Commands::Build { verbose } => (ReleaseKind::Build, verbose),
        Commands::Release { verbose } => (ReleaseKind::Release, verbose),
        Commands::Versions => {
            let entries = read_changelog(&config.changelog_path(&project_dir))?;
            ui::display_versions(&entries);
            return Ok(());
        }
    };

    let request = ReleaseRequest::for_project(kind, &project_dir, &config, verbose)?;
    let supervisor = ProcessSupervisor::from_config(&config.execution);
    let orchestrator = ReleaseOrchestrator::new(supervisor, config);

    let report = orchestrator.execute(&request)?;

    if report.tagged {
        ui::display_success(&format!("Released and tagged {}", report.entry.version));
    } else {
        ui::display_success(&format!("Built {}", report.entry.version));
    }
    println!("OK :)");
    Ok(())
}

fn resolve_project_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    std::fs::canonicalize(&dir)
        .with_context(|| format!("Project directory '{}' is not accessible", dir.display()))
}

fn report_failure(error: &anyhow::Error, verbose: bool) {
    let Some(shipit_error) = error.downcast_ref::<ShipitError>() else {
        ui::display_error(&format!("{:#}", error));
        return;
    };
    ui::display_error(&shipit_error.to_string());

    // Verbose runs already streamed the output; unhandled errors embed the log
    if !verbose && !matches!(shipit_error, ShipitError::Unhandled { .. }) {
        ui::display_log(shipit_error.log());
    }
}
