// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger engine: turns schedule entries into armed timers
//!
//! The engine only decides *when* an entry fires. Whether the fire turns
//! into a run is the arbiter's business.

use crate::timer::{TimerKey, TimerSet};
use chrono::{DateTime, Local, Utc};
use cue_core::{
    CharacterId, Clock, EntryErrorKind, EntryKey, Event, OverlapPolicy, ScenarioId, Schedule,
    ScheduleEntry, Timetable,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

struct Job {
    entry: ScheduleEntry,
    timetable: Timetable,
    origin: DateTime<Local>,
    next_run_at: Option<DateTime<Local>>,
    last_run_at: Option<DateTime<Local>>,
}

/// Read-only view of a registered entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub key: EntryKey,
    pub scenario_id: ScenarioId,
    pub character_id: CharacterId,
    pub cadence: String,
    pub overlap: OverlapPolicy,
    pub next_run_at: Option<DateTime<Local>>,
    pub last_run_at: Option<DateTime<Local>>,
}

/// An entry whose timer fired
#[derive(Debug, Clone)]
pub struct Fired {
    pub key: EntryKey,
    pub entry: ScheduleEntry,
    pub fired_at: DateTime<Local>,
}

impl Fired {
    pub fn event(&self) -> Event {
        Event::Trigger {
            schedule_id: self.key.schedule_id.clone(),
            entry_id: self.key.entry_id.clone(),
            fired_at: self.fired_at.with_timezone(&Utc),
        }
    }
}

/// Registered entries and their next fire times
#[derive(Default)]
pub struct TriggerEngine {
    jobs: BTreeMap<EntryKey, Job>,
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every registered job with the given schedules.
    ///
    /// Entries that cannot be armed are reported as `entry:error` events;
    /// the rest of their schedule still registers.
    pub fn register(
        &mut self,
        schedules: &[Schedule],
        timers: &mut TimerSet,
        clock: &impl Clock,
    ) -> Vec<Event> {
        self.clear(timers);

        let now = clock.wall();
        let mut errors = Vec::new();

        for schedule in schedules.iter().filter(|s| s.enabled) {
            for entry in schedule.entries.iter().filter(|e| e.enabled) {
                let key = schedule.key(entry);
                match self.arm(&key, entry, &now, timers, clock) {
                    Ok(()) => {}
                    Err((kind, message)) => {
                        tracing::warn!(entry = %key, ?kind, %message, "entry not armed");
                        errors.push(Event::EntryError {
                            schedule_id: key.schedule_id.clone(),
                            entry_id: key.entry_id.clone(),
                            kind,
                            message,
                        });
                    }
                }
            }
        }

        tracing::info!(
            armed = self.jobs.len(),
            failed = errors.len(),
            "schedules registered"
        );
        errors
    }

    fn arm(
        &mut self,
        key: &EntryKey,
        entry: &ScheduleEntry,
        now: &DateTime<Local>,
        timers: &mut TimerSet,
        clock: &impl Clock,
    ) -> Result<(), (EntryErrorKind, String)> {
        let config = |e: cue_core::CadenceError| (EntryErrorKind::Config, e.to_string());

        let timetable = Timetable::compile(&entry.cadence).map_err(config)?;
        let origin = timetable.origin(now).map_err(config)?;
        let next = timetable
            .next_after(&origin, now)
            .map_err(config)?
            .ok_or_else(|| {
                (
                    EntryErrorKind::Expired,
                    format!("{} will never fire again", entry.cadence),
                )
            })?;

        let timer = TimerKey::Entry(key.clone());
        let fire_at = clock.instant_at(&next);
        match timetable.period() {
            Some(period) => timers.arm_repeating(timer, fire_at, period),
            None => timers.arm_once(timer, fire_at),
        }
        tracing::debug!(entry = %key, next = %next, "entry armed");

        self.jobs.insert(
            key.clone(),
            Job {
                entry: entry.clone(),
                timetable,
                origin,
                next_run_at: Some(next),
                last_run_at: None,
            },
        );
        Ok(())
    }

    /// Disarm every job
    pub fn clear(&mut self, timers: &mut TimerSet) {
        for key in self.jobs.keys() {
            timers.cancel(&TimerKey::Entry(key.clone()));
        }
        self.jobs.clear();
    }

    /// Record a fire and arm the next occurrence.
    ///
    /// Returns `None` for keys that are no longer registered.
    pub fn fire(
        &mut self,
        key: &EntryKey,
        timers: &mut TimerSet,
        clock: &impl Clock,
    ) -> Option<Fired> {
        let job = self.jobs.get_mut(key)?;
        let now = clock.wall();
        job.last_run_at = Some(now);

        let timer = TimerKey::Entry(key.clone());
        job.next_run_at = if job.timetable.period().is_some() {
            // Interval timers re-arm themselves on the monotonic grid
            timers
                .deadline(&timer)
                .map(|deadline| now + deadline.saturating_duration_since(clock.now()))
        } else if job.timetable.is_recurring() {
            // A fire observed a hair early must not land on the same slot
            let basis = job.next_run_at.map_or(now, |due| due.max(now));
            match job.timetable.next_after(&job.origin, &basis) {
                Ok(Some(next)) => {
                    timers.arm_once(timer, clock.instant_at(&next));
                    Some(next)
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(entry = %key, error = %e, "cadence stopped");
                    None
                }
            }
        } else {
            None
        };

        Some(Fired {
            key: key.clone(),
            entry: job.entry.clone(),
            fired_at: now,
        })
    }

    pub fn is_registered(&self, key: &EntryKey) -> bool {
        self.jobs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Snapshots of every job, ordered by key
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.jobs
            .iter()
            .map(|(key, job)| JobSnapshot {
                key: key.clone(),
                scenario_id: job.entry.scenario_id.clone(),
                character_id: job.entry.character_id.clone(),
                cadence: job.entry.cadence.to_string(),
                overlap: job.entry.overlap,
                next_run_at: job.next_run_at,
                last_run_at: job.last_run_at,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
