// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run outcomes and terminal records

use crate::id::{CharacterId, EntryId, EntryKey, RunId, ScenarioId, ScheduleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    Timeout,
    Killed,
    Skipped,
}

impl RunStatus {
    /// Statuses that an entry's retry policy reacts to
    pub fn is_retryable(self) -> bool {
        matches!(self, RunStatus::Error | RunStatus::Timeout)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
            RunStatus::Timeout => "timeout",
            RunStatus::Killed => "killed",
            RunStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Why a trigger did not produce a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    ManualSkip,
    ResourceBusy,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ManualSkip => write!(f, "manual-skip"),
            SkipReason::ResourceBusy => write!(f, "resource-busy"),
        }
    }
}

/// How an OS process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }
}

/// Map a process exit onto a terminal status.
///
/// A signal death counts as a timeout when the soft timer already fired or
/// the run outlived its budget; any other signal death is a kill.
pub fn classify(
    exit: &ProcessExit,
    elapsed: Duration,
    max_duration: Duration,
    timed_out: bool,
) -> RunStatus {
    if exit.signal.is_some() {
        if timed_out || elapsed >= max_duration {
            RunStatus::Timeout
        } else {
            RunStatus::Killed
        }
    } else if exit.code.unwrap_or(0) != 0 {
        RunStatus::Error
    } else {
        RunStatus::Success
    }
}

/// Immutable record of one terminal outcome, appended to the run ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    pub schedule_id: ScheduleId,
    pub entry_id: EntryId,
    pub scenario_id: ScenarioId,
    pub character_id: CharacterId,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(default)]
    pub attempt: u32,
}

impl RunRecord {
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.schedule_id.clone(), self.entry_id.clone())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Which pipe a captured line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// One captured output line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub stream: LogStream,
    pub line: String,
}

impl LogLine {
    pub fn stdout(line: impl Into<String>) -> Self {
        Self {
            stream: LogStream::Stdout,
            line: line.into(),
        }
    }

    pub fn stderr(line: impl Into<String>) -> Self {
        Self {
            stream: LogStream::Stderr,
            line: line.into(),
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
