// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS process adapters
//!
//! A spawned process reports back through a `ProcessEventSender`: one
//! `Output` per captured line, then exactly one `Exited`.

mod os;

pub use os::OsProcessAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProcessAdapter, ProcessCall};

use async_trait::async_trait;
use cue_core::{LogLine, ProcessExit, RunId};
use nix::sys::signal::Signal;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from process operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("no live process for run {0}")]
    NotFound(RunId),
    #[error("signal failed: {0}")]
    SignalFailed(String),
}

/// Everything needed to launch one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub run_id: RunId,
    pub command: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl SpawnSpec {
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Notification from a spawned process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output { run_id: RunId, line: LogLine },
    Exited { run_id: RunId, exit: ProcessExit },
}

impl ProcessEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            ProcessEvent::Output { run_id, .. } | ProcessEvent::Exited { run_id, .. } => run_id,
        }
    }
}

pub type ProcessEventSender = mpsc::UnboundedSender<ProcessEvent>;
pub type ProcessEventReceiver = mpsc::UnboundedReceiver<ProcessEvent>;

/// Create the channel a host hands to its process adapter
pub fn process_channel() -> (ProcessEventSender, ProcessEventReceiver) {
    mpsc::unbounded_channel()
}

/// Signals the supervisor sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopSignal {
    /// Graceful termination (SIGTERM)
    Terminate,
    /// Forced kill (SIGKILL)
    Kill,
}

impl StopSignal {
    pub fn as_nix(self) -> Signal {
        match self {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        }
    }

    pub fn number(self) -> i32 {
        self.as_nix() as i32
    }
}

/// Adapter for running scenario processes
#[async_trait]
pub trait ProcessAdapter: Clone + Send + Sync + 'static {
    /// Launch a process; returns its pid. Output and exit are reported
    /// on `events`.
    async fn spawn(&self, spec: SpawnSpec, events: ProcessEventSender)
        -> Result<u32, ProcessError>;

    /// Deliver a signal to the run's process
    async fn signal(&self, run_id: &RunId, signal: StopSignal) -> Result<(), ProcessError>;
}
