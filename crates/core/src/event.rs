// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events published by the scheduler runtime

use crate::id::{CharacterId, EntryId, RunId, ScenarioId, ScheduleId};
use crate::run::{LogLine, RunRecord, SkipReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a trigger was queued instead of started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueReason {
    GlobalLimit,
    ScheduleLimit,
    ResourceBusy,
}

impl fmt::Display for QueueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueReason::GlobalLimit => write!(f, "global-limit"),
            QueueReason::ScheduleLimit => write!(f, "schedule-limit"),
            QueueReason::ResourceBusy => write!(f, "resource-busy"),
        }
    }
}

/// Category of an entry that could not be armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryErrorKind {
    /// Malformed cadence
    Config,
    /// One-shot target already passed
    Expired,
}

/// Everything observable about the scheduler, in publication order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An entry's timer fired
    Trigger {
        schedule_id: ScheduleId,
        entry_id: EntryId,
        fired_at: DateTime<Utc>,
    },

    /// The arbiter admitted a run
    RunRequested {
        run_id: RunId,
        schedule_id: ScheduleId,
        entry_id: EntryId,
        character_id: CharacterId,
        attempt: u32,
    },

    /// A trigger was parked on its character's queue
    RunQueued {
        schedule_id: ScheduleId,
        entry_id: EntryId,
        character_id: CharacterId,
        reason: QueueReason,
        position: usize,
    },

    /// A trigger was dropped
    RunSkipped {
        reason: SkipReason,
        record: RunRecord,
    },

    /// A kill-previous entry displaced the run holding its character
    RunKillRequested {
        run_id: RunId,
        replaced_by: RunId,
        character_id: CharacterId,
    },

    RunStarted {
        run_id: RunId,
        scenario_id: ScenarioId,
        character_id: CharacterId,
        pid: u32,
    },

    RunOutput {
        run_id: RunId,
        line: LogLine,
    },

    /// The soft timer fired and SIGTERM was sent
    RunTimeout {
        run_id: RunId,
        elapsed_ms: u64,
    },

    /// Terminal outcome of an admitted run, with its captured output
    RunExit {
        record: RunRecord,
        log: Vec<LogLine>,
    },

    /// A failed run will be attempted again after a backoff
    RunRetry {
        schedule_id: ScheduleId,
        entry_id: EntryId,
        attempt: u32,
        delay_ms: u64,
    },

    /// Admission failed for a fired trigger
    TriggerError {
        schedule_id: ScheduleId,
        entry_id: EntryId,
        message: String,
    },

    /// An entry could not be armed at registration
    EntryError {
        schedule_id: ScheduleId,
        entry_id: EntryId,
        kind: EntryErrorKind,
        message: String,
    },
}

impl Event {
    /// Colon-separated name used for subscription pattern matching
    pub fn name(&self) -> &'static str {
        match self {
            Event::Trigger { .. } => "trigger",
            Event::RunRequested { .. } => "run:requested",
            Event::RunQueued { .. } => "run:queued",
            Event::RunSkipped { .. } => "run:skipped",
            Event::RunKillRequested { .. } => "run:kill-requested",
            Event::RunStarted { .. } => "run:started",
            Event::RunOutput { .. } => "run:output",
            Event::RunTimeout { .. } => "run:timeout",
            Event::RunExit { .. } => "run:exit",
            Event::RunRetry { .. } => "run:retry",
            Event::TriggerError { .. } => "trigger:error",
            Event::EntryError { .. } => "entry:error",
        }
    }

    /// Run the event is about, if any
    pub fn run_id(&self) -> Option<&RunId> {
        match self {
            Event::RunRequested { run_id, .. }
            | Event::RunKillRequested { run_id, .. }
            | Event::RunStarted { run_id, .. }
            | Event::RunOutput { run_id, .. }
            | Event::RunTimeout { run_id, .. } => Some(run_id),
            Event::RunSkipped { record, .. } | Event::RunExit { record, .. } => {
                Some(&record.run_id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
