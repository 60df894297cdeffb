// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Commands that change daemon state: skip flags, stop, reload

use anyhow::Result;
use clap::Args;
use cue_core::EntryKey;

use crate::client::DaemonClient;
use crate::error::CueError;
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct EntryArgs {
    /// Entry to act on, as <schedule>/<entry>
    pub entry: EntryKey,
}

#[derive(Args)]
pub struct StopArgs {
    /// Run id (see `cue runs --active`)
    pub run_id: String,
}

pub async fn skip(client: &DaemonClient, args: EntryArgs) -> Result<()> {
    let changed = client
        .skip(args.entry.clone())
        .await
        .map_err(CueError::from)?;
    if changed {
        println!("Next scheduled run of {} will be skipped", args.entry);
    } else {
        println!("{} is already flagged to skip", args.entry);
    }
    Ok(())
}

pub async fn unskip(client: &DaemonClient, args: EntryArgs) -> Result<()> {
    let changed = client
        .unskip(args.entry.clone())
        .await
        .map_err(CueError::from)?;
    if changed {
        println!("Cleared skip flag for {}", args.entry);
    } else {
        println!("{} had no skip flag", args.entry);
    }
    Ok(())
}

pub async fn skipped(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let entries = client.skipped().await.map_err(CueError::from)?;
    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Text if entries.is_empty() => println!("No skip flags"),
        OutputFormat::Text => {
            for key in entries {
                println!("{}", key);
            }
        }
    }
    Ok(())
}

pub async fn stop(client: &DaemonClient, args: StopArgs) -> Result<()> {
    client.stop(&args.run_id).await.map_err(CueError::from)?;
    println!("Stopping run {}", args.run_id);
    Ok(())
}

pub async fn reload(client: &DaemonClient) -> Result<()> {
    let jobs = client.reload().await.map_err(CueError::from)?;
    println!("Catalog reloaded: {} jobs armed", jobs);
    Ok(())
}
