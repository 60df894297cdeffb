// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process supervisor
//!
//! Owns every admitted run from spawn to exit:
//! `Starting -> Running -> [GracefulStop -> Killing] -> exited`.
//! A run leaves the table exactly once, after its timers are cancelled.

use crate::arbiter::RunRequest;
use crate::error::RuntimeError;
use crate::timer::{TimerKey, TimerSet};
use chrono::{DateTime, Utc};
use cue_adapters::{Credential, CredentialStore, ProcessAdapter, ProcessEventSender, SpawnSpec, StopSignal};
use cue_core::{
    classify, Character, CharacterId, Clock, EntryKey, Event, LogBuffer, LogLine, ProcessExit,
    RunId, RunRecord, RunStatus, Scenario, ScenarioId, SchedulerConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    /// Spawn in flight
    Starting,
    Running,
    /// SIGTERM sent, waiting out the grace window
    GracefulStop,
    /// SIGKILL sent
    Killing,
}

/// Point-in-time view of an active run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub key: EntryKey,
    pub scenario_id: ScenarioId,
    pub character_id: CharacterId,
    pub pid: u32,
    pub state: RunState,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
}

/// Terminal outcome of an admitted run
#[derive(Debug, Clone)]
pub struct Completion {
    pub request: RunRequest,
    pub record: RunRecord,
    pub log: Vec<LogLine>,
}

impl Completion {
    /// A run that ended before any process existed
    pub fn failed(request: RunRequest, at: DateTime<Utc>, message: String) -> Self {
        let record = RunRecord {
            timestamp: at,
            run_id: request.run_id.clone(),
            schedule_id: request.key.schedule_id.clone(),
            entry_id: request.key.entry_id.clone(),
            scenario_id: request.entry.scenario_id.clone(),
            character_id: request.entry.character_id.clone(),
            status: RunStatus::Error,
            exit_code: None,
            signal: None,
            duration_ms: 0,
            error: Some(message),
            skip_reason: None,
            attempt: request.attempt,
        };
        Self {
            request,
            record,
            log: Vec::new(),
        }
    }

    pub fn event(&self) -> Event {
        Event::RunExit {
            record: self.record.clone(),
            log: self.log.clone(),
        }
    }
}

#[derive(Debug)]
pub enum StartOutcome {
    Started { pid: u32 },
    /// Nothing was left running; the run is already terminal
    Failed(Completion),
}

struct ActiveRun {
    request: RunRequest,
    scenario_id: ScenarioId,
    pid: u32,
    state: RunState,
    timed_out: bool,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    log: LogBuffer,
    scratch: Option<PathBuf>,
}

pub struct Supervisor<P, K> {
    processes: P,
    credentials: K,
    events: ProcessEventSender,
    config: SchedulerConfig,
    runs: HashMap<RunId, ActiveRun>,
}

impl<P, K> Supervisor<P, K>
where
    P: ProcessAdapter,
    K: CredentialStore,
{
    pub fn new(
        processes: P,
        credentials: K,
        events: ProcessEventSender,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            processes,
            credentials,
            events,
            config,
            runs: HashMap::new(),
        }
    }

    /// Apply new tuning; runs already active keep their log buffers
    pub fn configure(&mut self, config: SchedulerConfig) {
        self.config = config;
    }

    /// Launch an admitted run and arm its soft timeout
    pub async fn start(
        &mut self,
        request: RunRequest,
        scenario: &Scenario,
        character: &Character,
        timers: &mut TimerSet,
        clock: &impl Clock,
    ) -> StartOutcome {
        let run_id = request.run_id.clone();
        let started_wall = clock.wall().with_timezone(&Utc);
        self.runs.insert(
            run_id.clone(),
            ActiveRun {
                request: request.clone(),
                scenario_id: scenario.id.clone(),
                pid: 0,
                state: RunState::Starting,
                timed_out: false,
                started_at: clock.now(),
                started_wall,
                log: LogBuffer::new(self.config.log_buffer_lines),
                scratch: None,
            },
        );

        let mut scratch = None;
        let launched = self
            .launch(&request, scenario, character, &mut scratch)
            .await;

        match launched {
            Ok(pid) => {
                let now = clock.now();
                if let Some(run) = self.runs.get_mut(&run_id) {
                    run.pid = pid;
                    run.state = RunState::Running;
                    run.started_at = now;
                    run.scratch = scratch;
                }
                timers.arm_once(
                    TimerKey::SoftTimeout(run_id.clone()),
                    now + request.entry.max_duration,
                );
                tracing::info!(
                    run_id = %run_id,
                    entry = %request.key,
                    pid,
                    attempt = request.attempt,
                    "run started"
                );
                StartOutcome::Started { pid }
            }
            Err(e) => {
                self.runs.remove(&run_id);
                if let Some(path) = scratch {
                    remove_scratch(&path);
                }
                tracing::error!(run_id = %run_id, entry = %request.key, error = %e, "run failed to start");
                StartOutcome::Failed(Completion::failed(request, started_wall, e.to_string()))
            }
        }
    }

    async fn launch(
        &self,
        request: &RunRequest,
        scenario: &Scenario,
        character: &Character,
        scratch: &mut Option<PathBuf>,
    ) -> Result<u32, RuntimeError> {
        let credential = self.credentials.resolve_secret(&character.id).await?;

        let mut env: Vec<(String, String)> = scenario
            .env
            .iter()
            .chain(character.env.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.extend(
            [
                ("CUE_RUN_ID", request.run_id.to_string()),
                ("CUE_SCHEDULE_ID", request.key.schedule_id.to_string()),
                ("CUE_ENTRY_ID", request.key.entry_id.to_string()),
                ("CUE_SCENARIO_ID", scenario.id.to_string()),
                ("CUE_CHARACTER_ID", character.id.to_string()),
            ]
            .map(|(k, v)| (k.to_string(), v)),
        );

        if let Some(credential) = credential {
            let path = self
                .config
                .scratch_dir()
                .join(format!("cue-{}.json", request.run_id));
            *scratch = Some(path.clone());
            write_credential_file(&path, &credential)?;
            env.push(("CUE_CHARACTER_USERNAME".to_string(), credential.username));
            env.push((
                "CUE_CREDENTIALS_FILE".to_string(),
                path.display().to_string(),
            ));
        }

        let spec = SpawnSpec {
            run_id: request.run_id.clone(),
            command: scenario.command.clone(),
            args: scenario.args.clone(),
            cwd: scenario.cwd.clone(),
            env,
        };
        Ok(self.processes.spawn(spec, self.events.clone()).await?)
    }

    /// Capture a line of output; returns the event to publish
    pub fn on_output(&mut self, run_id: &RunId, line: LogLine) -> Option<Event> {
        let run = self.runs.get_mut(run_id)?;
        run.log.push(line.clone());
        Some(Event::RunOutput {
            run_id: run_id.clone(),
            line,
        })
    }

    /// Max duration reached: SIGTERM now, SIGKILL after the grace window
    pub async fn on_soft_timeout(
        &mut self,
        run_id: &RunId,
        timers: &mut TimerSet,
        clock: &impl Clock,
    ) -> Option<Event> {
        let grace = self.config.grace_window;
        let run = self.runs.get_mut(run_id)?;
        if run.state != RunState::Running {
            return None;
        }
        let now = clock.now();
        let elapsed = now.saturating_duration_since(run.started_at);
        run.timed_out = true;
        run.state = RunState::GracefulStop;
        timers.arm_once(TimerKey::HardKill(run_id.clone()), now + grace);

        tracing::warn!(
            run_id = %run_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "run exceeded max duration, terminating"
        );
        self.send(run_id, StopSignal::Terminate).await;
        Some(Event::RunTimeout {
            run_id: run_id.clone(),
            elapsed_ms: elapsed.as_millis() as u64,
        })
    }

    /// Grace window ran out: SIGKILL
    pub async fn on_hard_kill(&mut self, run_id: &RunId) -> bool {
        let Some(run) = self.runs.get_mut(run_id) else {
            return false;
        };
        if run.state != RunState::GracefulStop {
            return false;
        }
        run.state = RunState::Killing;
        tracing::warn!(run_id = %run_id, "grace window expired, killing");
        self.send(run_id, StopSignal::Kill).await;
        true
    }

    /// Graceful stop. Returns false for unknown, exited or already
    /// stopping runs.
    pub async fn stop(&mut self, run_id: &RunId, timers: &mut TimerSet, clock: &impl Clock) -> bool {
        let grace = self.config.grace_window;
        let Some(run) = self.runs.get_mut(run_id) else {
            return false;
        };
        if run.state != RunState::Running {
            return false;
        }
        run.state = RunState::GracefulStop;
        timers.cancel(&TimerKey::SoftTimeout(run_id.clone()));
        timers.arm_once(TimerKey::HardKill(run_id.clone()), clock.now() + grace);

        tracing::info!(run_id = %run_id, "stopping run");
        self.send(run_id, StopSignal::Terminate).await;
        true
    }

    /// Stop every running run; returns how many were signalled
    pub async fn shutdown(&mut self, timers: &mut TimerSet, clock: &impl Clock) -> usize {
        let ids: Vec<RunId> = self.runs.keys().cloned().collect();
        let mut stopped = 0;
        for run_id in ids {
            if self.stop(&run_id, timers, clock).await {
                stopped += 1;
            }
        }
        stopped
    }

    async fn send(&self, run_id: &RunId, signal: StopSignal) {
        if let Err(e) = self.processes.signal(run_id, signal).await {
            tracing::debug!(run_id = %run_id, ?signal, error = %e, "signal not delivered");
        }
    }

    /// The process is gone: cancel timers, clean up and classify
    pub fn on_exit(
        &mut self,
        run_id: &RunId,
        exit: ProcessExit,
        timers: &mut TimerSet,
        clock: &impl Clock,
    ) -> Option<Completion> {
        let run = self.runs.remove(run_id)?;
        timers.cancel(&TimerKey::SoftTimeout(run_id.clone()));
        timers.cancel(&TimerKey::HardKill(run_id.clone()));
        if let Some(path) = &run.scratch {
            remove_scratch(path);
        }

        let elapsed = clock.now().saturating_duration_since(run.started_at);
        let max_duration = run.request.entry.max_duration;
        let status = classify(&exit, elapsed, max_duration, run.timed_out);
        let error = match status {
            RunStatus::Error => exit.code.map(|code| format!("exited with code {}", code)),
            RunStatus::Timeout => Some(format!(
                "exceeded max duration of {}ms",
                max_duration.as_millis()
            )),
            RunStatus::Killed => exit.signal.map(|sig| format!("killed by signal {}", sig)),
            _ => None,
        };
        if run.log.dropped() > 0 {
            tracing::debug!(run_id = %run_id, dropped = run.log.dropped(), "output lines evicted");
        }
        tracing::info!(
            run_id = %run_id,
            entry = %run.request.key,
            %status,
            duration_ms = elapsed.as_millis() as u64,
            "run exited"
        );

        let record = RunRecord {
            timestamp: clock.wall().with_timezone(&Utc),
            run_id: run_id.clone(),
            schedule_id: run.request.key.schedule_id.clone(),
            entry_id: run.request.key.entry_id.clone(),
            scenario_id: run.scenario_id,
            character_id: run.request.entry.character_id.clone(),
            status,
            exit_code: exit.code,
            signal: exit.signal,
            duration_ms: elapsed.as_millis() as u64,
            error,
            skip_reason: None,
            attempt: run.request.attempt,
        };
        Some(Completion {
            request: run.request,
            record,
            log: run.log.into_lines(),
        })
    }

    pub fn is_active(&self, run_id: &RunId) -> bool {
        self.runs.contains_key(run_id)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Snapshots of every active run, oldest first
    pub fn active_runs(&self, clock: &impl Clock) -> Vec<RunSnapshot> {
        let now = clock.now();
        let mut runs: Vec<RunSnapshot> = self
            .runs
            .iter()
            .map(|(run_id, run)| {
                let elapsed = now.saturating_duration_since(run.started_at);
                RunSnapshot {
                    run_id: run_id.clone(),
                    key: run.request.key.clone(),
                    scenario_id: run.scenario_id.clone(),
                    character_id: run.request.entry.character_id.clone(),
                    pid: run.pid,
                    state: run.state,
                    attempt: run.request.attempt,
                    started_at: run.started_wall,
                    elapsed_ms: elapsed.as_millis() as u64,
                    remaining_ms: run
                        .request
                        .entry
                        .max_duration
                        .saturating_sub(elapsed)
                        .as_millis() as u64,
                }
            })
            .collect();
        runs.sort_by(|a, b| {
            a.started_at
                .cmp(&b.started_at)
                .then_with(|| a.run_id.cmp(&b.run_id))
        });
        runs
    }
}

fn write_credential_file(path: &Path, credential: &Credential) -> Result<(), RuntimeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(&serde_json::to_vec(credential)?)?;
    file.sync_all()?;
    Ok(())
}

fn remove_scratch(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove credential file");
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
