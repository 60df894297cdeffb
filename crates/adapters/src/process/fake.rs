// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ProcessAdapter, ProcessError, ProcessEvent, ProcessEventSender, SpawnSpec, StopSignal};
use async_trait::async_trait;
use cue_core::{LogLine, ProcessExit, RunId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Recorded process call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessCall {
    Spawn(SpawnSpec),
    Signal { run_id: RunId, signal: StopSignal },
}

#[derive(Default)]
struct FakeState {
    live: HashMap<RunId, ProcessEventSender>,
    next_pid: u32,
    fail_next_spawn: Option<String>,
    ignored: HashSet<StopSignal>,
}

/// Fake process adapter for testing.
///
/// Processes never exit on their own; tests drive them with
/// [`FakeProcessAdapter::emit_output`] and [`FakeProcessAdapter::exit`].
/// Signals end the process immediately unless ignored.
#[derive(Clone, Default)]
pub struct FakeProcessAdapter {
    state: Arc<Mutex<FakeState>>,
    calls: Arc<Mutex<Vec<ProcessCall>>>,
}

impl FakeProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ProcessCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Specs of every spawn attempt, in order
    pub fn spawned(&self) -> Vec<SpawnSpec> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProcessCall::Spawn(spec) => Some(spec),
                ProcessCall::Signal { .. } => None,
            })
            .collect()
    }

    /// Signals delivered, in order
    pub fn signals(&self) -> Vec<(RunId, StopSignal)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ProcessCall::Signal { run_id, signal } => Some((run_id, signal)),
                ProcessCall::Spawn(_) => None,
            })
            .collect()
    }

    /// Make the next spawn fail with the given message
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fail_next_spawn = Some(message.into());
    }

    /// Keep processes alive when they receive this signal
    pub fn ignore(&self, signal: StopSignal) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .ignored
            .insert(signal);
    }

    pub fn is_live(&self, run_id: &RunId) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .live
            .contains_key(run_id)
    }

    /// Emit an output line from a live process
    pub fn emit_output(&self, run_id: &RunId, line: LogLine) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.live.get(run_id) {
            Some(tx) => tx
                .send(ProcessEvent::Output {
                    run_id: run_id.clone(),
                    line,
                })
                .is_ok(),
            None => false,
        }
    }

    /// End a live process; returns false if it was not running
    pub fn exit(&self, run_id: &RunId, exit: ProcessExit) -> bool {
        let tx = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .live
            .remove(run_id);
        match tx {
            Some(tx) => tx
                .send(ProcessEvent::Exited {
                    run_id: run_id.clone(),
                    exit,
                })
                .is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl ProcessAdapter for FakeProcessAdapter {
    async fn spawn(
        &self,
        spec: SpawnSpec,
        events: ProcessEventSender,
    ) -> Result<u32, ProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ProcessCall::Spawn(spec.clone()));

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(message) = state.fail_next_spawn.take() {
            return Err(ProcessError::SpawnFailed(message));
        }
        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        state.live.insert(spec.run_id, events);
        Ok(pid)
    }

    async fn signal(&self, run_id: &RunId, signal: StopSignal) -> Result<(), ProcessError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ProcessCall::Signal {
                run_id: run_id.clone(),
                signal,
            });

        let honored = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.live.contains_key(run_id) {
                return Err(ProcessError::NotFound(run_id.clone()));
            }
            !state.ignored.contains(&signal)
        };
        if honored {
            self.exit(run_id, ProcessExit::signal(signal.number()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
