// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cue check`: validate the catalog and preview fire times without a daemon

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::Args;
use cue_catalog::{catalog_dir, load_catalog, Catalog};
use cue_core::{CharacterId, EntryKey, OverlapPolicy, ScenarioId, Timetable};
use serde::Serialize;

use crate::error::CueError;
use crate::output::{format_time, print_json, OutputFormat};

#[derive(Args)]
pub struct CheckArgs {
    /// Number of upcoming fire times to show per entry
    #[arg(short = 'n', long, default_value = "3")]
    pub count: usize,
}

/// What registering one entry right now would do
#[derive(Debug, Serialize)]
pub struct EntryPreview {
    pub key: EntryKey,
    pub scenario_id: ScenarioId,
    pub character_id: CharacterId,
    pub cadence: String,
    pub overlap: OverlapPolicy,
    pub enabled: bool,
    pub next: Vec<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn check(args: CheckArgs, project_root: &Path, format: OutputFormat) -> Result<()> {
    let catalog = load_catalog(project_root).map_err(|e| {
        CueError::new(format!("invalid catalog: {}", e))
            .with_context(format!(
                "loaded from {}",
                catalog_dir(project_root).display()
            ))
            .with_source(e)
    })?;

    let previews = preview(&catalog, &Local::now(), args.count);
    let broken = previews.iter().filter(|p| p.error.is_some()).count();

    match format {
        OutputFormat::Json => print_json(&previews)?,
        OutputFormat::Text => print_text(&catalog, &previews),
    }

    if broken > 0 {
        let noun = if broken == 1 { "entry" } else { "entries" };
        anyhow::bail!("{} {} cannot be armed", broken, noun);
    }
    Ok(())
}

/// Compute up to `count` fire times after `now` for every entry
pub fn preview(catalog: &Catalog, now: &DateTime<Local>, count: usize) -> Vec<EntryPreview> {
    let mut previews = Vec::new();
    for schedule in &catalog.schedules {
        for entry in &schedule.entries {
            let (next, error) = match upcoming(entry, now, count) {
                Ok(next) => (next, None),
                Err(e) => (Vec::new(), Some(e)),
            };
            previews.push(EntryPreview {
                key: schedule.key(entry),
                scenario_id: entry.scenario_id.clone(),
                character_id: entry.character_id.clone(),
                cadence: entry.cadence.to_string(),
                overlap: entry.overlap,
                enabled: schedule.enabled && entry.enabled,
                next,
                error,
            });
        }
    }
    previews
}

fn upcoming(
    entry: &cue_core::ScheduleEntry,
    now: &DateTime<Local>,
    count: usize,
) -> Result<Vec<DateTime<Local>>, String> {
    let timetable = Timetable::compile(&entry.cadence).map_err(|e| e.to_string())?;
    let origin = timetable.origin(now).map_err(|e| e.to_string())?;

    let mut next = Vec::with_capacity(count);
    let mut cursor = *now;
    while next.len() < count {
        match timetable
            .next_after(&origin, &cursor)
            .map_err(|e| e.to_string())?
        {
            Some(at) => {
                cursor = at;
                next.push(at);
            }
            None => break,
        }
    }
    Ok(next)
}

fn print_text(catalog: &Catalog, previews: &[EntryPreview]) {
    println!(
        "Catalog OK: {} schedules, {} entries, {} scenarios, {} characters",
        catalog.schedules.len(),
        previews.len(),
        catalog.scenarios.len(),
        catalog.characters.len()
    );

    for p in previews {
        println!();
        let state = if p.enabled { "" } else { " [disabled]" };
        println!(
            "{}  {} @ {}  {} ({}){}",
            p.key, p.scenario_id, p.character_id, p.cadence, p.overlap, state
        );
        if let Some(error) = &p.error {
            println!("  error: {}", error);
        } else if p.next.is_empty() {
            println!("  next: never (expired)");
        } else {
            let times: Vec<String> = p.next.iter().map(format_time).collect();
            println!("  next: {}", times.join(", "));
        }
    }
}

#[cfg(test)]
#[path = "check_tests.rs"]
mod tests;
