// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::run::RunStatus;

fn record(status: RunStatus) -> RunRecord {
    RunRecord {
        timestamp: DateTime::<Utc>::from_timestamp(1_767_600_000, 0).unwrap(),
        run_id: RunId::new("run-1"),
        schedule_id: ScheduleId::new("daily"),
        entry_id: EntryId::new("e1"),
        scenario_id: ScenarioId::new("farm"),
        character_id: CharacterId::new("char-1"),
        status,
        exit_code: Some(0),
        signal: None,
        duration_ms: 10,
        error: None,
        skip_reason: None,
        attempt: 0,
    }
}

#[test]
fn event_serialization_roundtrip() {
    let events = vec![
        Event::RunQueued {
            schedule_id: ScheduleId::new("daily"),
            entry_id: EntryId::new("e1"),
            character_id: CharacterId::new("char-1"),
            reason: QueueReason::GlobalLimit,
            position: 1,
        },
        Event::RunSkipped {
            reason: SkipReason::ResourceBusy,
            record: record(RunStatus::Skipped),
        },
        Event::RunExit {
            record: record(RunStatus::Success),
            log: vec![LogLine::stdout("done")],
        },
        Event::EntryError {
            schedule_id: ScheduleId::new("daily"),
            entry_id: EntryId::new("e1"),
            kind: EntryErrorKind::Expired,
            message: "in the past".to_string(),
        },
    ];

    for event in events {
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}

#[test]
fn names_follow_category_colon_action() {
    let kill = Event::RunKillRequested {
        run_id: RunId::new("run-1"),
        replaced_by: RunId::new("run-2"),
        character_id: CharacterId::new("char-1"),
    };
    assert_eq!(kill.name(), "run:kill-requested");

    let trigger = Event::Trigger {
        schedule_id: ScheduleId::new("daily"),
        entry_id: EntryId::new("e1"),
        fired_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
    };
    assert_eq!(trigger.name(), "trigger");
    assert!(trigger.run_id().is_none());
}

#[test]
fn run_id_comes_from_record_for_terminal_events() {
    let exit = Event::RunExit {
        record: record(RunStatus::Error),
        log: vec![],
    };
    assert_eq!(exit.run_id(), Some(&RunId::new("run-1")));
}
