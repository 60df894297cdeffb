// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cue jobs`: entries registered with the running daemon

use anyhow::Result;

use crate::client::DaemonClient;
use crate::error::CueError;
use crate::output::{format_optional_time, print_json, print_table, OutputFormat};

pub async fn jobs(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let jobs = client.jobs().await.map_err(CueError::from)?;

    if format == OutputFormat::Json {
        return print_json(&jobs);
    }
    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|j| {
            vec![
                j.key.to_string(),
                j.scenario_id.to_string(),
                j.character_id.to_string(),
                j.cadence.clone(),
                j.overlap.to_string(),
                format_optional_time(j.next_run_at.as_ref()),
                format_optional_time(j.last_run_at.as_ref()),
            ]
        })
        .collect();
    print_table(
        &[
            "ENTRY",
            "SCENARIO",
            "CHARACTER",
            "CADENCE",
            "OVERLAP",
            "NEXT",
            "LAST",
        ],
        &rows,
    );
    Ok(())
}
