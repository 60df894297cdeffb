// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Help output specs

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    let temp = Project::empty();
    temp.cue()
        .args(&["--help"])
        .passes()
        .stdout_has("daemon")
        .stdout_has("check")
        .stdout_has("jobs")
        .stdout_has("runs")
        .stdout_has("skip")
        .stdout_has("reload");
}

#[test]
fn daemon_help_lists_subcommands() {
    let temp = Project::empty();
    temp.cue()
        .args(&["daemon", "--help"])
        .passes()
        .stdout_has("start")
        .stdout_has("stop")
        .stdout_has("status")
        .stdout_has("logs");
}

#[test]
fn completions_name_the_binary() {
    let temp = Project::empty();
    temp.cue()
        .args(&["completions", "bash"])
        .passes()
        .stdout_has("cue");
}
