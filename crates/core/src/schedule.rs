// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedules, entries and the policies attached to them

use crate::id::{CharacterId, EntryId, EntryKey, ScenarioId, ScheduleId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Unit of an interval cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minutes,
    Hours,
}

impl IntervalUnit {
    pub fn seconds(self) -> u64 {
        match self {
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3600,
        }
    }
}

/// When an entry fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Cadence {
    /// Cron expression evaluated against local wall-clock time
    Cron { expression: String },
    /// Every `n` units, optionally phase-locked to a local anchor time
    Every {
        unit: IntervalUnit,
        n: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor: Option<NaiveDateTime>,
    },
    /// Fire once at a local time
    Once { at: NaiveDateTime },
}

impl Cadence {
    pub fn cron(expression: impl Into<String>) -> Self {
        Cadence::Cron {
            expression: expression.into(),
        }
    }

    pub fn every_minutes(n: u32) -> Self {
        Cadence::Every {
            unit: IntervalUnit::Minutes,
            n,
            anchor: None,
        }
    }

    pub fn every_hours(n: u32) -> Self {
        Cadence::Every {
            unit: IntervalUnit::Hours,
            n,
            anchor: None,
        }
    }

    pub fn once(at: NaiveDateTime) -> Self {
        Cadence::Once { at }
    }

    /// Attach an anchor to an interval cadence; other cadences are unchanged
    pub fn anchored(self, at: NaiveDateTime) -> Self {
        match self {
            Cadence::Every { unit, n, .. } => Cadence::Every {
                unit,
                n,
                anchor: Some(at),
            },
            other => other,
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Cron { expression } => write!(f, "cron '{}'", expression),
            Cadence::Every { unit, n, anchor } => {
                let unit = match unit {
                    IntervalUnit::Minutes => "min",
                    IntervalUnit::Hours => "h",
                };
                write!(f, "every {}{}", n, unit)?;
                if let Some(anchor) = anchor {
                    write!(f, " from {}", anchor)?;
                }
                Ok(())
            }
            Cadence::Once { at } => write!(f, "once at {}", at),
        }
    }
}

/// What to do when a trigger fires while its character is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    #[default]
    Skip,
    Queue,
    KillPrevious,
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlapPolicy::Skip => write!(f, "skip"),
            OverlapPolicy::Queue => write!(f, "queue"),
            OverlapPolicy::KillPrevious => write!(f, "kill-previous"),
        }
    }
}

impl std::str::FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(OverlapPolicy::Skip),
            "queue" => Ok(OverlapPolicy::Queue),
            "kill-previous" => Ok(OverlapPolicy::KillPrevious),
            _ => Err(format!("unknown overlap policy: {}", s)),
        }
    }
}

/// Re-run a failed or timed out attempt after a fixed backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt
    pub max: u32,
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
}

/// One scheduled binding of a scenario to a character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub scenario_id: ScenarioId,
    pub character_id: CharacterId,
    pub cadence: Cadence,
    #[serde(with = "humantime_serde")]
    pub max_duration: Duration,
    #[serde(default)]
    pub overlap: OverlapPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl ScheduleEntry {
    pub fn new(
        id: impl Into<EntryId>,
        scenario_id: impl Into<ScenarioId>,
        character_id: impl Into<CharacterId>,
        cadence: Cadence,
        max_duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            scenario_id: scenario_id.into(),
            character_id: character_id.into(),
            cadence,
            max_duration,
            overlap: OverlapPolicy::default(),
            retry: None,
            enabled: true,
        }
    }

    pub fn with_overlap(mut self, overlap: OverlapPolicy) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_retry(mut self, max: u32, backoff: Duration) -> Self {
        self.retry = Some(RetryPolicy { max, backoff });
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A named group of entries sharing an optional concurrency ceiling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<usize>,
    #[serde(default)]
    pub entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn new(id: impl Into<ScheduleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            concurrency_limit: None,
            entries: Vec::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    pub fn with_entry(mut self, entry: ScheduleEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn key(&self, entry: &ScheduleEntry) -> EntryKey {
        EntryKey::new(self.id.clone(), entry.id.clone())
    }

    pub fn entry(&self, id: &EntryId) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
