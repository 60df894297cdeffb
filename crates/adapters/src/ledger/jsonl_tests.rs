// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cue_core::{CharacterId, EntryId, RunId, RunStatus, ScenarioId, ScheduleId};

fn record(run: &str, status: RunStatus) -> RunRecord {
    RunRecord {
        timestamp: chrono::DateTime::from_timestamp(1_767_600_000, 0).unwrap(),
        run_id: RunId::new(run),
        schedule_id: ScheduleId::new("daily"),
        entry_id: EntryId::new("e1"),
        scenario_id: ScenarioId::new("farm"),
        character_id: CharacterId::new("char-1"),
        status,
        exit_code: Some(0),
        signal: None,
        duration_ms: 1200,
        error: None,
        skip_reason: None,
        attempt: 0,
    }
}

#[test]
fn ledger_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");

    {
        let mut ledger = JsonlRunLedger::open(&path).unwrap();
        assert_eq!(ledger.append(&record("run-1", RunStatus::Success)).unwrap(), 1);
        assert_eq!(ledger.append(&record("run-2", RunStatus::Skipped)).unwrap(), 2);
    }

    let entries = JsonlRunLedger::replay(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 1);
    assert_eq!(entries[1].record.status, RunStatus::Skipped);
}

#[test]
fn sequence_continues_across_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");

    {
        let mut ledger = JsonlRunLedger::open(&path).unwrap();
        assert_eq!(ledger.sequence(), 0);
        ledger.append(&record("run-1", RunStatus::Error)).unwrap();
    }

    let mut ledger = JsonlRunLedger::open(&path).unwrap();
    assert_eq!(ledger.sequence(), 1);
    assert_eq!(ledger.append(&record("run-2", RunStatus::Success)).unwrap(), 2);
}

#[test]
fn open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state/runs.jsonl");

    let ledger = JsonlRunLedger::open(&path).unwrap();
    assert_eq!(ledger.path(), path.as_path());
    assert!(path.exists());
}

#[test]
fn replay_of_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let entries = JsonlRunLedger::replay(&dir.path().join("absent.jsonl")).unwrap();
    assert!(entries.is_empty());
}

#[test]
fn replay_ignores_torn_tail_but_not_corruption_in_the_middle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");
    {
        let mut ledger = JsonlRunLedger::open(&path).unwrap();
        ledger.append(&record("run-1", RunStatus::Success)).unwrap();
    }
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{\"seq\":2,\"rec");
    std::fs::write(&path, &content).unwrap();

    assert_eq!(JsonlRunLedger::replay(&path).unwrap().len(), 1);

    content.push_str("\n{\"seq\":3}\n");
    std::fs::write(&path, &content).unwrap();
    assert!(JsonlRunLedger::replay(&path).is_err());
}

#[test]
fn tail_returns_most_recent_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");
    let mut ledger = JsonlRunLedger::open(&path).unwrap();
    for i in 1..=5 {
        ledger
            .append(&record(&format!("run-{}", i), RunStatus::Success))
            .unwrap();
    }

    let tail = JsonlRunLedger::tail(&path, 2).unwrap();
    let ids: Vec<_> = tail.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(ids, vec!["run-4", "run-5"]);
}
