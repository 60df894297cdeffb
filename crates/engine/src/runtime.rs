// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the cue scheduler
//!
//! One value owns the timers, trigger engine, arbiter and supervisor and
//! processes one input at a time to completion. Hosts feed it process
//! events and wake it at `next_deadline()`.

use crate::arbiter::{Admission, Arbiter, Decision};
use crate::error::RuntimeError;
use crate::supervisor::{Completion, RunSnapshot, StartOutcome, Supervisor};
use crate::timer::{TimerKey, TimerSet};
use crate::trigger::{JobSnapshot, TriggerEngine};
use chrono::Utc;
use cue_adapters::{CredentialStore, ProcessAdapter, ProcessEvent, ProcessEventSender, RunLedger};
use cue_catalog::Catalog;
use cue_core::{
    Clock, EntryKey, Event, EventBus, IdGen, RunId, RunRecord, ScheduleEntry, SchedulerConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Runtime adapter dependencies
pub struct RuntimeDeps<P, K, L> {
    pub processes: P,
    pub credentials: K,
    pub ledger: L,
    /// Handed to the process adapter on every spawn; the host drains the
    /// matching receiver into [`Runtime::handle`]
    pub process_events: ProcessEventSender,
    pub bus: EventBus,
}

/// Something for the runtime to react to
#[derive(Debug, Clone)]
pub enum RuntimeInput {
    Process(ProcessEvent),
    /// Fire every timer that is due
    Tick,
}

/// Counters for `cue daemon status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub jobs: usize,
    pub active: usize,
    pub queued: usize,
    pub skipped: usize,
    pub pending_retries: usize,
    pub global_limit: usize,
}

/// Runtime that coordinates the system
pub struct Runtime<P, K, L, C: Clock, I: IdGen> {
    timers: TimerSet,
    triggers: TriggerEngine,
    arbiter: Arbiter,
    supervisor: Supervisor<P, K>,
    ledger: L,
    bus: EventBus,
    catalog: Catalog,
    /// Pending retries, keyed by the run that failed
    retries: HashMap<RunId, Admission>,
    shutting_down: bool,
    clock: C,
    ids: I,
}

impl<P, K, L, C, I> Runtime<P, K, L, C, I>
where
    P: ProcessAdapter,
    K: CredentialStore,
    L: RunLedger,
    C: Clock,
    I: IdGen,
{
    /// Create a runtime with nothing registered; call [`Runtime::reload`]
    pub fn new(deps: RuntimeDeps<P, K, L>, clock: C, ids: I) -> Self {
        let config = SchedulerConfig::default();
        Self {
            timers: TimerSet::new(),
            triggers: TriggerEngine::new(),
            arbiter: Arbiter::new(config.global_concurrency),
            supervisor: Supervisor::new(
                deps.processes,
                deps.credentials,
                deps.process_events,
                config,
            ),
            ledger: deps.ledger,
            bus: deps.bus,
            catalog: Catalog::default(),
            retries: HashMap::new(),
            shutting_down: false,
            clock,
            ids,
        }
    }

    /// Register a catalog, replacing the previous one. Active runs are
    /// left alone. Returns the number of armed jobs.
    pub async fn reload(&mut self, catalog: Catalog) -> usize {
        self.supervisor.configure(catalog.scheduler.clone());
        let errors = self
            .triggers
            .register(&catalog.schedules, &mut self.timers, &self.clock);

        let mut dropped = Vec::new();
        self.retries.retain(|run_id, admission| {
            match live_entry(&catalog, &admission.key) {
                Some(entry) => {
                    admission.entry = entry.clone();
                    true
                }
                None => {
                    dropped.push(run_id.clone());
                    false
                }
            }
        });
        for run_id in &dropped {
            self.timers.cancel(&TimerKey::Retry(run_id.clone()));
        }
        if !dropped.is_empty() {
            tracing::info!(dropped = dropped.len(), "dropped retries for removed entries");
        }

        let decisions = self.arbiter.register(
            &catalog.schedules,
            catalog.scheduler.global_concurrency,
            &self.ids,
        );
        self.catalog = catalog;
        self.shutting_down = false;

        for event in errors {
            self.bus.publish(event);
        }
        self.apply(decisions).await;

        let jobs = self.triggers.len();
        tracing::info!(
            jobs,
            schedules = self.catalog.schedules.len(),
            "catalog loaded"
        );
        jobs
    }

    /// Process one input to completion
    pub async fn handle(&mut self, input: RuntimeInput) {
        match input {
            RuntimeInput::Process(event) => self.handle_process_event(event).await,
            RuntimeInput::Tick => self.poll_timers().await,
        }
    }

    /// Fire every due timer, earliest first
    pub async fn poll_timers(&mut self) {
        while let Some(key) = self.timers.pop_due(self.clock.now()) {
            tracing::trace!(timer = %key, "timer fired");
            self.on_timer(key).await;
        }
    }

    /// When the host should next call [`Runtime::poll_timers`]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub async fn handle_process_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Output { run_id, line } => {
                if let Some(event) = self.supervisor.on_output(&run_id, line) {
                    self.bus.publish(event);
                }
            }
            ProcessEvent::Exited { run_id, exit } => {
                let Some(completion) =
                    self.supervisor
                        .on_exit(&run_id, exit, &mut self.timers, &self.clock)
                else {
                    tracing::debug!(run_id = %run_id, "exit for unknown run ignored");
                    return;
                };
                let decisions = self.complete(completion);
                self.apply(decisions).await;
            }
        }
    }

    async fn on_timer(&mut self, key: TimerKey) {
        match key {
            TimerKey::Entry(entry_key) => {
                let Some(fired) = self
                    .triggers
                    .fire(&entry_key, &mut self.timers, &self.clock)
                else {
                    return;
                };
                self.bus.publish(fired.event());
                self.admit(Admission::scheduled(fired.key, fired.entry))
                    .await;
            }
            TimerKey::SoftTimeout(run_id) => {
                if let Some(event) = self
                    .supervisor
                    .on_soft_timeout(&run_id, &mut self.timers, &self.clock)
                    .await
                {
                    self.bus.publish(event);
                }
            }
            TimerKey::HardKill(run_id) => {
                self.supervisor.on_hard_kill(&run_id).await;
            }
            TimerKey::Retry(run_id) => {
                if let Some(admission) = self.retries.remove(&run_id) {
                    tracing::info!(entry = %admission.key, attempt = admission.attempt, "retrying");
                    self.admit(admission).await;
                }
            }
        }
    }

    /// Hand a trigger to the arbiter. Failures here are reported and
    /// never stop the timer loop.
    async fn admit(&mut self, admission: Admission) {
        if let Err(e) = self.check_references(&admission.entry) {
            tracing::warn!(entry = %admission.key, error = %e, "trigger rejected");
            self.bus.publish(Event::TriggerError {
                schedule_id: admission.key.schedule_id.clone(),
                entry_id: admission.key.entry_id.clone(),
                message: e.to_string(),
            });
            return;
        }
        let decisions = self.arbiter.on_trigger(admission, &self.ids, &self.clock);
        self.apply(decisions).await;
    }

    fn check_references(&self, entry: &ScheduleEntry) -> Result<(), RuntimeError> {
        if self.catalog.get_scenario(&entry.scenario_id).is_none() {
            return Err(RuntimeError::ScenarioNotFound(entry.scenario_id.clone()));
        }
        if self.catalog.get_character(&entry.character_id).is_none() {
            return Err(RuntimeError::CharacterNotFound(entry.character_id.clone()));
        }
        Ok(())
    }

    /// Carry out arbiter decisions, including any they cascade into
    async fn apply(&mut self, decisions: Vec<Decision>) {
        let mut work: VecDeque<Decision> = decisions.into();
        while let Some(decision) = work.pop_front() {
            match decision {
                Decision::Emit(event) => {
                    if let Event::RunSkipped { record, reason } = &event {
                        tracing::info!(entry = %record.key(), %reason, "trigger skipped");
                        self.append(record);
                    }
                    self.bus.publish(event);
                }
                Decision::Kill { run_id } => {
                    self.supervisor
                        .stop(&run_id, &mut self.timers, &self.clock)
                        .await;
                }
                Decision::Start(request) => {
                    let scenario = self.catalog.get_scenario(&request.entry.scenario_id).cloned();
                    let character = self
                        .catalog
                        .get_character(&request.entry.character_id)
                        .cloned();
                    let (Some(scenario), Some(character)) = (scenario, character) else {
                        let message = match self.check_references(&request.entry) {
                            Err(e) => e.to_string(),
                            Ok(()) => "catalog lookup failed".to_string(),
                        };
                        let at = self.clock.wall().with_timezone(&Utc);
                        work.extend(self.complete(Completion::failed(request, at, message)));
                        continue;
                    };

                    let run_id = request.run_id.clone();
                    let outcome = self
                        .supervisor
                        .start(request, &scenario, &character, &mut self.timers, &self.clock)
                        .await;
                    match outcome {
                        StartOutcome::Started { pid } => self.bus.publish(Event::RunStarted {
                            run_id,
                            scenario_id: scenario.id,
                            character_id: character.id,
                            pid,
                        }),
                        StartOutcome::Failed(completion) => {
                            work.extend(self.complete(completion));
                        }
                    }
                }
            }
        }
    }

    /// Record a terminal outcome and release what the run held
    fn complete(&mut self, completion: Completion) -> Vec<Decision> {
        self.append(&completion.record);
        self.bus.publish(completion.event());
        self.schedule_retry(&completion);
        self.arbiter
            .on_run_completed(&completion.record.run_id, &self.ids)
    }

    fn append(&mut self, record: &RunRecord) {
        if let Err(e) = self.ledger.append(record) {
            tracing::error!(run_id = %record.run_id, error = %e, "failed to append run record");
        }
    }

    fn schedule_retry(&mut self, completion: &Completion) {
        let record = &completion.record;
        let Some(policy) = completion.request.entry.retry else {
            return;
        };
        if self.shutting_down || !record.status.is_retryable() || record.attempt >= policy.max {
            return;
        }

        let attempt = record.attempt + 1;
        self.timers.arm_once(
            TimerKey::Retry(record.run_id.clone()),
            self.clock.now() + policy.backoff,
        );
        self.retries.insert(
            record.run_id.clone(),
            Admission::retry(
                completion.request.key.clone(),
                completion.request.entry.clone(),
                attempt,
            ),
        );
        tracing::info!(
            entry = %completion.request.key,
            attempt,
            backoff_ms = policy.backoff.as_millis() as u64,
            "retry scheduled"
        );
        self.bus.publish(Event::RunRetry {
            schedule_id: record.schedule_id.clone(),
            entry_id: record.entry_id.clone(),
            attempt,
            delay_ms: policy.backoff.as_millis() as u64,
        });
    }

    /// Skip the entry's next scheduled fire
    pub fn set_skipped(&mut self, key: EntryKey) -> Result<bool, RuntimeError> {
        if live_entry(&self.catalog, &key).is_none() {
            return Err(RuntimeError::UnknownEntry(key));
        }
        Ok(self.arbiter.set_skipped(key))
    }

    pub fn clear_skipped(&mut self, key: &EntryKey) -> bool {
        self.arbiter.clear_skipped(key)
    }

    pub fn list_skipped(&self) -> Vec<EntryKey> {
        self.arbiter.list_skipped()
    }

    /// Gracefully stop a run; unknown or finished runs are an error the
    /// caller may ignore
    pub async fn stop(&mut self, run_id: &RunId) -> Result<(), RuntimeError> {
        if !self.supervisor.is_active(run_id) {
            return Err(RuntimeError::UnknownRun(run_id.clone()));
        }
        self.supervisor
            .stop(run_id, &mut self.timers, &self.clock)
            .await;
        Ok(())
    }

    /// Stop firing, drop queued work and stop every active run. Returns
    /// the number of runs signalled; their exits still arrive as process
    /// events.
    pub async fn shutdown(&mut self) -> usize {
        self.shutting_down = true;
        self.triggers.clear(&mut self.timers);
        for run_id in self.retries.keys() {
            self.timers.cancel(&TimerKey::Retry(run_id.clone()));
        }
        self.retries.clear();
        let dropped = self.arbiter.clear_queues();
        let stopped = self.supervisor.shutdown(&mut self.timers, &self.clock).await;
        tracing::info!(stopped, dropped, "runtime shutting down");
        stopped
    }

    pub fn has_active_runs(&self) -> bool {
        !self.supervisor.is_empty()
    }

    pub fn active_runs(&self) -> Vec<RunSnapshot> {
        self.supervisor.active_runs(&self.clock)
    }

    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.triggers.jobs()
    }

    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            jobs: self.triggers.len(),
            active: self.supervisor.len(),
            queued: self.arbiter.queue_len(),
            skipped: self.arbiter.list_skipped().len(),
            pending_retries: self.retries.len(),
            global_limit: self.arbiter.global_limit(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

/// The entry, if its schedule and the entry itself are enabled
fn live_entry<'a>(catalog: &'a Catalog, key: &EntryKey) -> Option<&'a ScheduleEntry> {
    catalog
        .get_schedule(&key.schedule_id)
        .filter(|s| s.enabled)
        .and_then(|s| s.entry(&key.entry_id))
        .filter(|e| e.enabled)
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
