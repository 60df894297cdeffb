// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle specs
//!
//! Verify daemon start/stop/status lifecycle.

use crate::prelude::*;

#[test]
fn daemon_status_when_not_running() {
    let temp = Project::empty();
    temp.cue()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_stop_when_not_running() {
    let temp = Project::empty();
    temp.cue()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_start_status_stop() {
    require_daemon!();
    let temp = Project::with_catalog(MINIMAL_CATALOG);

    temp.cue()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon started");
    temp.cue()
        .args(&["daemon", "start"])
        .passes()
        .stdout_has("Daemon already running");

    temp.cue()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Status: running")
        .stdout_has("Version:")
        .stdout_has("Uptime:")
        .stdout_has("Jobs: 1");

    temp.cue()
        .args(&["daemon", "stop"])
        .passes()
        .stdout_has("Daemon stopped");
    temp.cue()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}

#[test]
fn daemon_writes_state_files() {
    require_daemon!();
    let temp = Project::empty();
    temp.cue().args(&["daemon", "start"]).passes();

    let ready = wait_for(SPEC_WAIT_MAX_MS, || {
        let dir = temp.daemon_dir();
        dir.join("daemon.version").exists() && dir.join("daemon.pid").exists()
    });
    assert!(ready, "daemon state files not written");

    temp.cue()
        .args(&["daemon", "logs"])
        .passes()
        .stdout_has("--- cued: starting");
}

#[test]
fn daemon_start_shows_catalog_error() {
    require_daemon!();
    let temp = Project::with_catalog("[[schedule]]\nname = \"no id\"\n");

    temp.cue()
        .args(&["daemon", "start"])
        .fails()
        .stderr_has("Failed to start daemon")
        .stderr_has("missing required field");
}
