// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Specs for commands that talk to a running daemon

use crate::prelude::*;

fn started(catalog: &str) -> Project {
    let temp = Project::with_catalog(catalog);
    temp.cue().args(&["daemon", "start"]).passes();
    temp
}

#[test]
fn jobs_lists_armed_entries() {
    require_daemon!();
    let temp = started(MINIMAL_CATALOG);

    temp.cue()
        .args(&["jobs"])
        .passes()
        .stdout_has("daily/morning")
        .stdout_has("farm")
        .stdout_has("char-1");

    let out = temp.cue().args(&["-o", "json", "jobs"]).passes();
    let jobs = out.json();
    assert_eq!(jobs.as_array().unwrap().len(), 1);
    assert!(jobs[0]["next_run_at"].is_string());
}

#[test]
fn skip_and_unskip_toggle_the_flag() {
    require_daemon!();
    let temp = started(MINIMAL_CATALOG);

    temp.cue()
        .args(&["skip", "daily/morning"])
        .passes()
        .stdout_has("will be skipped");
    temp.cue()
        .args(&["skip", "daily/morning"])
        .passes()
        .stdout_has("already flagged");
    temp.cue()
        .args(&["skipped"])
        .passes()
        .stdout_has("daily/morning");

    temp.cue()
        .args(&["unskip", "daily/morning"])
        .passes()
        .stdout_has("Cleared skip flag");
    temp.cue()
        .args(&["skipped"])
        .passes()
        .stdout_has("No skip flags");
}

#[test]
fn skip_unknown_entry_suggests_jobs() {
    require_daemon!();
    let temp = started(MINIMAL_CATALOG);

    temp.cue()
        .args(&["skip", "daily/nope"])
        .fails()
        .stderr_has("unknown entry")
        .stderr_has("cue jobs");
}

#[test]
fn stop_unknown_run_fails() {
    require_daemon!();
    let temp = started(MINIMAL_CATALOG);

    temp.cue()
        .args(&["stop", "no-such-run"])
        .fails()
        .stderr_has("unknown run");
}

#[test]
fn reload_picks_up_catalog_changes() {
    require_daemon!();
    let temp = started(MINIMAL_CATALOG);

    temp.cue()
        .args(&["runs", "--active"])
        .passes()
        .stdout_has("No active runs");

    temp.file(".cue/catalog/catalog.toml", "");
    temp.cue()
        .args(&["reload"])
        .passes()
        .stdout_has("0 jobs armed");
    temp.cue().args(&["jobs"]).passes().stdout_has("No jobs");
}
