// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cue runs`: ledger history, or live runs with `--active`

use std::path::Path;

use anyhow::Result;
use clap::Args;
use cue_adapters::JsonlRunLedger;
use cue_core::{EntryKey, RunRecord};
use cue_engine::{RunSnapshot, RunState};

use crate::client::{get_daemon_dir, DaemonClient};
use crate::error::CueError;
use crate::output::{format_duration_ms, format_time, print_json, print_table, OutputFormat};

#[derive(Args)]
pub struct RunsArgs {
    /// Show runs in flight instead of the ledger
    #[arg(long)]
    pub active: bool,

    /// Number of most recent records to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,

    /// Only runs of this entry (<schedule>/<entry>)
    #[arg(long)]
    pub entry: Option<EntryKey>,

    /// Only runs with this status (success, error, timeout, killed, skipped)
    #[arg(long)]
    pub status: Option<String>,
}

/// Ledger history. Reads the file directly so it works without a daemon.
pub fn history(args: &RunsArgs, project_root: &Path, format: OutputFormat) -> Result<()> {
    let path = get_daemon_dir(project_root)
        .map_err(CueError::from)?
        .join("runs.jsonl");
    let entries = JsonlRunLedger::replay(&path)
        .map_err(|e| CueError::new(format!("cannot read run ledger: {}", e)).with_source(e))?;
    let records = select(
        entries.into_iter().map(|e| e.record).collect(),
        args.entry.as_ref(),
        args.status.as_deref(),
        args.limit,
    );

    if format == OutputFormat::Json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No runs");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                format_time(&r.timestamp),
                r.run_id.to_string(),
                r.key().to_string(),
                r.character_id.to_string(),
                r.status.to_string(),
                r.attempt.to_string(),
                format_duration_ms(r.duration_ms),
                detail(r),
            ]
        })
        .collect();
    print_table(
        &[
            "TIME",
            "RUN",
            "ENTRY",
            "CHARACTER",
            "STATUS",
            "ATTEMPT",
            "DURATION",
            "DETAIL",
        ],
        &rows,
    );
    Ok(())
}

pub async fn active(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let runs = client.active_runs().await.map_err(CueError::from)?;

    if format == OutputFormat::Json {
        return print_json(&runs);
    }
    if runs.is_empty() {
        println!("No active runs");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = runs.iter().map(active_row).collect();
    print_table(
        &[
            "RUN",
            "ENTRY",
            "CHARACTER",
            "PID",
            "STATE",
            "ATTEMPT",
            "ELAPSED",
            "REMAINING",
        ],
        &rows,
    );
    Ok(())
}

/// Filter then keep the newest `limit`, oldest first
pub(crate) fn select(
    records: Vec<RunRecord>,
    entry: Option<&EntryKey>,
    status: Option<&str>,
    limit: usize,
) -> Vec<RunRecord> {
    let matching: Vec<RunRecord> = records
        .into_iter()
        .filter(|r| entry.is_none_or(|key| r.key() == *key))
        .filter(|r| status.is_none_or(|s| r.status.to_string().eq_ignore_ascii_case(s)))
        .collect();
    let skip = matching.len().saturating_sub(limit);
    matching.into_iter().skip(skip).collect()
}

fn detail(record: &RunRecord) -> String {
    if let Some(reason) = &record.skip_reason {
        return reason.to_string();
    }
    if let Some(error) = &record.error {
        return error.clone();
    }
    match (record.exit_code, record.signal) {
        (_, Some(sig)) => format!("signal {}", sig),
        (Some(code), None) if code != 0 => format!("exit {}", code),
        _ => String::new(),
    }
}

fn active_row(run: &RunSnapshot) -> Vec<String> {
    let state = match run.state {
        RunState::Starting => "starting",
        RunState::Running => "running",
        RunState::GracefulStop => "stopping",
        RunState::Killing => "killing",
    };
    vec![
        run.run_id.to_string(),
        run.key.to_string(),
        run.character_id.to_string(),
        run.pid.to_string(),
        state.to_string(),
        run.attempt.to_string(),
        format_duration_ms(run.elapsed_ms),
        format_duration_ms(run.remaining_ms),
    ]
}

#[cfg(test)]
#[path = "runs_tests.rs"]
mod tests;
