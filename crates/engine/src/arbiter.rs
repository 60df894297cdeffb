// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrency arbiter
//!
//! Every trigger goes through a fixed chain: manual skip flag, global
//! ceiling, per-schedule ceiling, then the character lock and the entry's
//! overlap policy. The arbiter never performs I/O; it returns decisions
//! for the runtime to carry out.

use chrono::{DateTime, Utc};
use cue_core::{
    CharacterId, Clock, EntryKey, Event, IdGen, OverlapPolicy, QueueReason, RunId, RunRecord,
    RunStatus, Schedule, ScheduleEntry, ScheduleId, SkipReason,
};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// A trigger asking to run
#[derive(Debug, Clone)]
pub struct Admission {
    pub key: EntryKey,
    pub entry: ScheduleEntry,
    pub attempt: u32,
    /// Scheduled fires honor skip flags; retries do not
    pub scheduled: bool,
}

impl Admission {
    pub fn scheduled(key: EntryKey, entry: ScheduleEntry) -> Self {
        Self {
            key,
            entry,
            attempt: 0,
            scheduled: true,
        }
    }

    pub fn retry(key: EntryKey, entry: ScheduleEntry, attempt: u32) -> Self {
        Self {
            key,
            entry,
            attempt,
            scheduled: false,
        }
    }
}

/// An admitted run, handed to the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub run_id: RunId,
    pub key: EntryKey,
    pub entry: ScheduleEntry,
    pub attempt: u32,
}

/// What the runtime should do next
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Start(RunRequest),
    /// Stop the run that held a kill-previous entry's character
    Kill { run_id: RunId },
    Emit(Event),
}

/// A trigger waiting on a character queue
#[derive(Debug, Clone)]
pub struct Pending {
    pub admission: Admission,
    pub reason: QueueReason,
    pub enqueued_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct Slot {
    key: EntryKey,
    character_id: CharacterId,
}

/// Admission state for every concurrency domain
pub struct Arbiter {
    global_limit: usize,
    schedule_limits: HashMap<ScheduleId, usize>,
    active: HashMap<RunId, Slot>,
    schedule_active: HashMap<ScheduleId, usize>,
    locks: HashMap<CharacterId, RunId>,
    queues: HashMap<CharacterId, VecDeque<Pending>>,
    skipped: BTreeSet<EntryKey>,
    next_seq: u64,
}

impl Arbiter {
    pub fn new(global_limit: usize) -> Self {
        Self {
            global_limit: global_limit.max(1),
            schedule_limits: HashMap::new(),
            active: HashMap::new(),
            schedule_active: HashMap::new(),
            locks: HashMap::new(),
            queues: HashMap::new(),
            skipped: BTreeSet::new(),
            next_seq: 0,
        }
    }

    /// Adopt a new set of schedules.
    ///
    /// Queued triggers and skip flags for entries that no longer exist are
    /// dropped; queued snapshots are refreshed. A raised ceiling may admit
    /// queued work, so this can return start decisions.
    pub fn register(
        &mut self,
        schedules: &[Schedule],
        global_limit: usize,
        ids: &impl IdGen,
    ) -> Vec<Decision> {
        self.global_limit = global_limit.max(1);
        self.schedule_limits = schedules
            .iter()
            .filter_map(|s| s.concurrency_limit.map(|limit| (s.id.clone(), limit)))
            .collect();

        let current: HashMap<EntryKey, &ScheduleEntry> = schedules
            .iter()
            .filter(|s| s.enabled)
            .flat_map(|s| {
                s.entries
                    .iter()
                    .filter(|e| e.enabled)
                    .map(move |e| (s.key(e), e))
            })
            .collect();

        let mut dropped = 0;
        for (character, queue) in self.queues.iter_mut() {
            queue.retain_mut(|pending| match current.get(&pending.admission.key) {
                Some(entry) if &entry.character_id == character => {
                    pending.admission.entry = (*entry).clone();
                    true
                }
                _ => {
                    dropped += 1;
                    false
                }
            });
        }
        self.queues.retain(|_, queue| !queue.is_empty());
        self.skipped.retain(|key| current.contains_key(key));
        if dropped > 0 {
            tracing::info!(dropped, "dropped queued triggers for removed entries");
        }

        self.drain(None, ids)
    }

    /// Decide what happens to a trigger. Produces exactly one outcome:
    /// skipped, queued, or started (possibly displacing a holder).
    pub fn on_trigger(
        &mut self,
        admission: Admission,
        ids: &impl IdGen,
        clock: &impl Clock,
    ) -> Vec<Decision> {
        if admission.scheduled && self.skipped.remove(&admission.key) {
            tracing::info!(entry = %admission.key, "manual skip consumed");
            return vec![self.skip(admission, SkipReason::ManualSkip, ids, clock)];
        }

        if self.active.len() >= self.global_limit {
            return vec![self.enqueue(admission, QueueReason::GlobalLimit, clock)];
        }
        if self.schedule_full(&admission.key.schedule_id) {
            return vec![self.enqueue(admission, QueueReason::ScheduleLimit, clock)];
        }

        let character = admission.entry.character_id.clone();
        let Some(holder) = self.locks.get(&character).cloned() else {
            return self.start(admission, ids);
        };

        match admission.entry.overlap {
            OverlapPolicy::Skip => vec![self.skip(admission, SkipReason::ResourceBusy, ids, clock)],
            OverlapPolicy::Queue => vec![self.enqueue(admission, QueueReason::ResourceBusy, clock)],
            OverlapPolicy::KillPrevious => {
                let started = self.start(admission, ids);
                let Some(Decision::Start(request)) = started.last() else {
                    return started;
                };
                tracing::info!(
                    holder = %holder,
                    replaced_by = %request.run_id,
                    character = %character,
                    "kill-previous displaces holder"
                );
                let mut decisions = vec![
                    Decision::Emit(Event::RunKillRequested {
                        run_id: holder.clone(),
                        replaced_by: request.run_id.clone(),
                        character_id: character,
                    }),
                    Decision::Kill { run_id: holder },
                ];
                decisions.extend(started);
                decisions
            }
        }
    }

    /// Release everything a finished run held and admit queued work.
    /// Unknown or already-completed runs are ignored.
    pub fn on_run_completed(
        &mut self,
        run_id: &RunId,
        ids: &impl IdGen,
    ) -> Vec<Decision> {
        let Some(slot) = self.active.remove(run_id) else {
            return Vec::new();
        };

        if let Some(count) = self.schedule_active.get_mut(&slot.key.schedule_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.schedule_active.remove(&slot.key.schedule_id);
            }
        }
        if self.locks.get(&slot.character_id) == Some(run_id) {
            self.locks.remove(&slot.character_id);
        }

        self.drain(Some(&slot.character_id), ids)
    }

    /// Admit queue heads while capacity allows: the freed character
    /// first, then the oldest waiting head among unlocked characters.
    fn drain(&mut self, freed: Option<&CharacterId>, ids: &impl IdGen) -> Vec<Decision> {
        let mut decisions = Vec::new();
        let mut blocked = HashSet::new();

        if let Some(character) = freed {
            if self.head_admissible(character) {
                decisions.extend(self.admit_head(character, ids));
            }
        }

        while self.active.len() < self.global_limit {
            let next = self
                .queues
                .iter()
                .filter(|(character, _)| !blocked.contains(*character))
                .filter_map(|(character, queue)| queue.front().map(|p| (character, p.seq)))
                .min_by_key(|(_, seq)| *seq)
                .map(|(character, _)| character.clone());
            let Some(character) = next else {
                break;
            };
            if self.head_admissible(&character) {
                decisions.extend(self.admit_head(&character, ids));
            } else {
                blocked.insert(character);
            }
        }

        let admitted = decisions
            .iter()
            .filter(|d| matches!(d, Decision::Start(_)))
            .count();
        if admitted > 0 {
            tracing::debug!(admitted, remaining = self.queue_len(), "queue drained");
        }
        decisions
    }

    fn head_admissible(&self, character: &CharacterId) -> bool {
        let Some(head) = self.queues.get(character).and_then(|q| q.front()) else {
            return false;
        };
        !self.locks.contains_key(character)
            && self.active.len() < self.global_limit
            && !self.schedule_full(&head.admission.key.schedule_id)
    }

    fn admit_head(&mut self, character: &CharacterId, ids: &impl IdGen) -> Vec<Decision> {
        let Some(queue) = self.queues.get_mut(character) else {
            return Vec::new();
        };
        let Some(pending) = queue.pop_front() else {
            return Vec::new();
        };
        if queue.is_empty() {
            self.queues.remove(character);
        }
        self.start(pending.admission, ids)
    }

    fn schedule_full(&self, schedule_id: &ScheduleId) -> bool {
        match self.schedule_limits.get(schedule_id) {
            Some(limit) => self.schedule_active.get(schedule_id).copied().unwrap_or(0) >= *limit,
            None => false,
        }
    }

    fn start(&mut self, admission: Admission, ids: &impl IdGen) -> Vec<Decision> {
        let run_id = RunId::new(ids.next());
        let character = admission.entry.character_id.clone();

        self.active.insert(
            run_id.clone(),
            Slot {
                key: admission.key.clone(),
                character_id: character.clone(),
            },
        );
        *self
            .schedule_active
            .entry(admission.key.schedule_id.clone())
            .or_insert(0) += 1;
        self.locks.insert(character.clone(), run_id.clone());

        let request = RunRequest {
            run_id: run_id.clone(),
            key: admission.key.clone(),
            entry: admission.entry,
            attempt: admission.attempt,
        };
        vec![
            Decision::Emit(Event::RunRequested {
                run_id,
                schedule_id: admission.key.schedule_id,
                entry_id: admission.key.entry_id,
                character_id: character,
                attempt: admission.attempt,
            }),
            Decision::Start(request),
        ]
    }

    fn enqueue(&mut self, admission: Admission, reason: QueueReason, clock: &impl Clock) -> Decision {
        self.next_seq += 1;
        let character = admission.entry.character_id.clone();
        let queue = self.queues.entry(character.clone()).or_default();
        let event = Event::RunQueued {
            schedule_id: admission.key.schedule_id.clone(),
            entry_id: admission.key.entry_id.clone(),
            character_id: character,
            reason,
            position: queue.len() + 1,
        };
        queue.push_back(Pending {
            admission,
            reason,
            enqueued_at: clock.wall().with_timezone(&Utc),
            seq: self.next_seq,
        });
        Decision::Emit(event)
    }

    fn skip(
        &mut self,
        admission: Admission,
        reason: SkipReason,
        ids: &impl IdGen,
        clock: &impl Clock,
    ) -> Decision {
        let record = RunRecord {
            timestamp: clock.wall().with_timezone(&Utc),
            run_id: RunId::new(ids.next()),
            schedule_id: admission.key.schedule_id,
            entry_id: admission.key.entry_id,
            scenario_id: admission.entry.scenario_id,
            character_id: admission.entry.character_id,
            status: RunStatus::Skipped,
            exit_code: None,
            signal: None,
            duration_ms: 0,
            error: None,
            skip_reason: Some(reason),
            attempt: admission.attempt,
        };
        Decision::Emit(Event::RunSkipped { reason, record })
    }

    /// Drop every queued trigger; returns how many were waiting
    pub fn clear_queues(&mut self) -> usize {
        let dropped = self.queue_len();
        self.queues.clear();
        dropped
    }

    pub fn set_global_limit(&mut self, limit: usize) {
        self.global_limit = limit.max(1);
    }

    /// Flag the entry's next scheduled fire to be skipped; returns false
    /// if it was already flagged
    pub fn set_skipped(&mut self, key: EntryKey) -> bool {
        self.skipped.insert(key)
    }

    /// Remove a skip flag; returns false if none was set
    pub fn clear_skipped(&mut self, key: &EntryKey) -> bool {
        self.skipped.remove(key)
    }

    pub fn list_skipped(&self) -> Vec<EntryKey> {
        self.skipped.iter().cloned().collect()
    }

    pub fn is_skipped(&self, key: &EntryKey) -> bool {
        self.skipped.contains(key)
    }

    pub fn global_limit(&self) -> usize {
        self.global_limit
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn schedule_active_count(&self, schedule_id: &ScheduleId) -> usize {
        self.schedule_active.get(schedule_id).copied().unwrap_or(0)
    }

    pub fn is_active(&self, run_id: &RunId) -> bool {
        self.active.contains_key(run_id)
    }

    /// Run currently holding the character
    pub fn holder(&self, character: &CharacterId) -> Option<&RunId> {
        self.locks.get(character)
    }

    /// Triggers waiting on a character, oldest first
    pub fn queued(&self, character: &CharacterId) -> Vec<&Pending> {
        self.queues
            .get(character)
            .map(|q| q.iter().collect())
            .unwrap_or_default()
    }

    /// Total triggers waiting across all characters
    pub fn queue_len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}

#[cfg(test)]
#[path = "arbiter_tests.rs"]
mod tests;
