// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cue check` specs

use crate::prelude::*;

#[test]
fn check_summarizes_a_valid_catalog() {
    let temp = Project::with_catalog(MINIMAL_CATALOG);
    temp.cue()
        .args(&["check"])
        .passes()
        .stdout_has("Catalog OK: 1 schedules, 1 entries")
        .stdout_has("daily/morning")
        .stdout_has("next:");
}

#[test]
fn check_json_previews_each_entry() {
    let temp = Project::with_catalog(MINIMAL_CATALOG);
    let out = temp.cue().args(&["--output", "json", "check", "-n", "2"]).passes();
    let json = out.json();
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["next"].as_array().unwrap().len(), 2);
}

#[test]
fn check_with_no_catalog_is_empty() {
    let temp = Project::empty();
    temp.cue()
        .args(&["check"])
        .passes()
        .stdout_has("Catalog OK: 0 schedules, 0 entries");
}

#[test]
fn check_rejects_an_invalid_catalog() {
    let temp = Project::with_catalog("[[schedule]]\nname = \"no id\"\n");
    temp.cue()
        .args(&["check"])
        .fails()
        .stderr_has("invalid catalog")
        .stderr_has("missing required field");
}

#[test]
fn check_fails_when_an_entry_cannot_be_armed() {
    let temp = Project::with_catalog(
        r#"
[scenario.farm]
command = "/bin/true"

[character.char-1]

[[schedule]]
id = "daily"

[[schedule.entry]]
id = "broken"
scenario = "farm"
character = "char-1"
cron = "not a cron"
max_duration = "5m"
"#,
    );
    temp.cue()
        .args(&["check"])
        .fails()
        .stdout_has("daily/broken")
        .stdout_has("error:")
        .stderr_has("cannot be armed");
}
