// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error reporting specs

use crate::prelude::*;

#[test]
fn unknown_command_fails() {
    let temp = Project::empty();
    temp.cue().args(&["frobnicate"]).fails();
}

#[test]
fn malformed_entry_key_is_rejected_by_the_parser() {
    let temp = Project::empty();
    temp.cue()
        .args(&["skip", "no-slash"])
        .fails()
        .stderr_has("expected <schedule>/<entry>");
}

#[test]
fn control_commands_need_a_running_daemon() {
    let temp = Project::with_catalog(MINIMAL_CATALOG);
    temp.cue()
        .args(&["jobs"])
        .fails()
        .stderr_has("Daemon not running")
        .stderr_has("cue daemon start");
    temp.cue()
        .args(&["skip", "daily/morning"])
        .fails()
        .stderr_has("Daemon not running");
}

#[test]
fn control_commands_do_not_start_the_daemon() {
    let temp = Project::with_catalog(MINIMAL_CATALOG);
    temp.cue().args(&["reload"]).fails();
    temp.cue()
        .args(&["daemon", "status"])
        .passes()
        .stdout_has("Daemon not running");
}
