// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cue - scenario scheduler CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod completions;
mod error;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{check, control, daemon, jobs, runs};

use crate::client::{find_project_root, DaemonClient};
use crate::error::CueError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "cue",
    version,
    about = "cue - run scenarios on a schedule, one character at a time"
)]
struct Cli {
    /// Project root directory (defaults to the nearest directory holding .cue/)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon management
    Daemon(daemon::DaemonArgs),
    /// Validate the catalog and preview upcoming fire times
    Check(check::CheckArgs),
    /// List entries armed in the running daemon
    Jobs,
    /// Show run history from the ledger
    Runs(runs::RunsArgs),
    /// Skip the next scheduled run of an entry
    Skip(control::EntryArgs),
    /// Clear a pending skip flag
    Unskip(control::EntryArgs),
    /// List entries flagged to skip
    Skipped,
    /// Stop an active run (SIGTERM, then SIGKILL after the grace period)
    Stop(control::StopArgs),
    /// Reload the catalog in the running daemon
    Reload,
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<CueError>() {
                Some(cue) => eprint!("{}", cue),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.output;

    if let Commands::Completions(args) = &cli.command {
        completions::generate_completions::<Cli>(args.shell);
        return Ok(());
    }

    let project_root = match cli.project {
        Some(root) => root,
        None => find_project_root().map_err(CueError::from)?,
    };

    match cli.command {
        Commands::Daemon(args) => daemon::daemon(args, project_root, format).await,
        Commands::Check(args) => check::check(args, &project_root, format),
        Commands::Runs(args) if !args.active => runs::history(&args, &project_root, format),
        Commands::Runs(_) => runs::active(&connect(project_root)?, format).await,
        Commands::Jobs => jobs::jobs(&connect(project_root)?, format).await,
        Commands::Skip(args) => control::skip(&connect(project_root)?, args).await,
        Commands::Unskip(args) => control::unskip(&connect(project_root)?, args).await,
        Commands::Skipped => control::skipped(&connect(project_root)?, format).await,
        Commands::Stop(args) => control::stop(&connect(project_root)?, args).await,
        Commands::Reload => control::reload(&connect(project_root)?).await,
        Commands::Completions(_) => Ok(()),
    }
}

/// Query and control commands never auto-start the daemon
fn connect(project_root: PathBuf) -> Result<DaemonClient> {
    DaemonClient::connect(project_root).map_err(|e| CueError::from(e).into())
}

/// Diagnostics go to stderr, filtered by `CUE_LOG` (default: warn)
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_env("CUE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
