// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cue runs` specs. History reads the ledger directly.

use crate::prelude::*;

#[test]
fn runs_without_a_ledger_is_empty() {
    let temp = Project::empty();
    temp.cue().args(&["runs"]).passes().stdout_has("No runs");
}

#[test]
fn runs_json_without_a_ledger_is_an_empty_list() {
    let temp = Project::empty();
    let out = temp.cue().args(&["-o", "json", "runs"]).passes();
    assert_eq!(out.json(), serde_json::json!([]));
}

#[test]
fn runs_reads_and_filters_the_ledger() {
    let temp = Project::empty();
    let hash_dir = project_state_dir(&temp);
    std::fs::create_dir_all(&hash_dir).unwrap();
    let line = |seq: u64, entry: &str, status: &str| {
        format!(
            r#"{{"seq":{seq},"record":{{"timestamp":"2026-01-05T08:00:00Z","run_id":"run-{seq}","schedule_id":"daily","entry_id":"{entry}","scenario_id":"farm","character_id":"char-1","status":"{status}","duration_ms":1500,"attempt":0}}}}"#
        )
    };
    let ledger = [
        line(1, "morning", "success"),
        line(2, "evening", "error"),
        line(3, "morning", "timeout"),
    ]
    .join("\n");
    std::fs::write(hash_dir.join("runs.jsonl"), ledger + "\n").unwrap();

    temp.cue()
        .args(&["runs"])
        .passes()
        .stdout_has("run-1")
        .stdout_has("run-2")
        .stdout_has("run-3");

    temp.cue()
        .args(&["runs", "--entry", "daily/morning"])
        .passes()
        .stdout_has("run-1")
        .stdout_has("run-3")
        .stdout_lacks("run-2");

    temp.cue()
        .args(&["runs", "--status", "error"])
        .passes()
        .stdout_has("run-2")
        .stdout_lacks("run-1");

    temp.cue()
        .args(&["runs", "-n", "1"])
        .passes()
        .stdout_has("run-3")
        .stdout_lacks("run-2");
}

/// `<state>/cue/projects/<hash>`, where the hash is the first 8 bytes of
/// the SHA-256 of the canonical project root
fn project_state_dir(temp: &Project) -> std::path::PathBuf {
    use sha2::{Digest, Sha256};
    let canonical = temp.path().canonicalize().unwrap();
    let digest = Sha256::digest(canonical.to_string_lossy().as_bytes());
    let hash: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    temp.state_path().join("cue/projects").join(hash)
}
