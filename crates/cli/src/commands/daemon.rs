// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cue daemon`: start, stop and inspect cued

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use crate::client::{
    daemon_stop, get_daemon_dir, run_daemon_foreground, ClientError, DaemonClient,
};
use crate::error::CueError;
use crate::output::{format_duration_ms, print_json, OutputFormat};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start {
        /// Run in the foreground instead (logs still go to the log file)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon, waiting for active runs to wind down
    Stop,
    /// Show whether the daemon is running and what it is doing
    Status,
    /// Show the daemon log
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
        /// Keep printing new lines until interrupted
        #[arg(short, long)]
        follow: bool,
    },
}

pub async fn daemon(args: DaemonArgs, project_root: PathBuf, format: OutputFormat) -> Result<()> {
    match args.command {
        DaemonCommand::Start { foreground } => start(&project_root, foreground).await,
        DaemonCommand::Stop => {
            if daemon_stop(&project_root).await.map_err(CueError::from)? {
                println!("Daemon stopped");
            } else {
                println!("Daemon not running");
            }
            Ok(())
        }
        DaemonCommand::Status => status(project_root, format).await,
        DaemonCommand::Logs { lines, follow } => logs(&project_root, lines, follow),
    }
}

async fn start(project_root: &Path, foreground: bool) -> Result<()> {
    if foreground {
        let status = run_daemon_foreground(project_root).map_err(CueError::from)?;
        if !status.success() {
            anyhow::bail!("cued exited with {}", status);
        }
        return Ok(());
    }

    let (_client, started) = DaemonClient::connect_or_start(project_root.to_path_buf())
        .await
        .map_err(CueError::from)?;
    if started {
        println!("Daemon started");
    } else {
        println!("Daemon already running");
    }
    Ok(())
}

async fn status(project_root: PathBuf, format: OutputFormat) -> Result<()> {
    let client = match DaemonClient::connect(project_root) {
        Ok(client) => client,
        Err(ClientError::DaemonNotRunning) => {
            match format {
                OutputFormat::Text => println!("Daemon not running"),
                OutputFormat::Json => print_json(&json!({ "running": false }))?,
            }
            return Ok(());
        }
        Err(e) => return Err(CueError::from(e).into()),
    };

    let version = client.hello().await.map_err(CueError::from)?;
    let (uptime_secs, status) = client.status().await.map_err(CueError::from)?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "running": true,
            "version": version,
            "uptime_secs": uptime_secs,
            "status": status,
        }))?,
        OutputFormat::Text => {
            println!("Status: running");
            println!("Version: {}", version);
            println!("Uptime: {}", format_duration_ms(uptime_secs * 1000));
            println!("Jobs: {}", status.jobs);
            println!("Active runs: {}/{}", status.active, status.global_limit);
            println!("Queued: {}", status.queued);
            println!("Skip flags: {}", status.skipped);
            println!("Pending retries: {}", status.pending_retries);
        }
    }
    Ok(())
}

fn logs(project_root: &Path, lines: usize, follow: bool) -> Result<()> {
    let log_path = get_daemon_dir(project_root)
        .map_err(CueError::from)?
        .join("daemon.log");

    let content = match std::fs::read_to_string(&log_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !follow => {
            println!("No daemon log at {}", log_path.display());
            return Ok(());
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let all: Vec<&str> = content.lines().collect();
    for line in &all[all.len().saturating_sub(lines)..] {
        println!("{}", line);
    }

    if follow {
        follow_log(&log_path, content.len() as u64)?;
    }
    Ok(())
}

/// Print bytes appended to the log until Ctrl-C
fn follow_log(path: &Path, mut offset: u64) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    while running.load(Ordering::SeqCst) {
        if let Ok(mut file) = std::fs::File::open(path) {
            let len = file.metadata()?.len();
            // Truncated or replaced: start over
            if len < offset {
                offset = 0;
            }
            if len > offset {
                file.seek(SeekFrom::Start(offset))?;
                let mut chunk = String::new();
                file.read_to_string(&mut chunk)?;
                offset += chunk.len() as u64;
                print!("{}", chunk);
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    Ok(())
}
