// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::process::{ProcessAdapter, ProcessError, ProcessEventSender, SpawnSpec, StopSignal};
use async_trait::async_trait;
use cue_core::RunId;

/// Wrapper that adds tracing to any ProcessAdapter
#[derive(Clone)]
pub struct TracedProcessAdapter<P> {
    inner: P,
}

impl<P> TracedProcessAdapter<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ProcessAdapter> ProcessAdapter for TracedProcessAdapter<P> {
    async fn spawn(
        &self,
        spec: SpawnSpec,
        events: ProcessEventSender,
    ) -> Result<u32, ProcessError> {
        let span = tracing::info_span!("process.spawn", run_id = %spec.run_id, command = %spec.command);
        let _guard = span.enter();

        tracing::info!(args = ?spec.args, env_count = spec.env.len(), "starting");

        // Precondition: cwd must exist
        if let Some(cwd) = &spec.cwd {
            if !cwd.is_dir() {
                tracing::error!(cwd = %cwd.display(), "working directory does not exist");
                return Err(ProcessError::SpawnFailed(format!(
                    "working directory does not exist: {}",
                    cwd.display()
                )));
            }
        }

        let start = std::time::Instant::now();
        let result = self.inner.spawn(spec, events).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(pid) => tracing::info!(
                pid,
                elapsed_ms = elapsed.as_millis() as u64,
                "process started"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "spawn failed"
            ),
        }

        result
    }

    async fn signal(&self, run_id: &RunId, signal: StopSignal) -> Result<(), ProcessError> {
        let span = tracing::info_span!("process.signal", %run_id, ?signal);
        let _guard = span.enter();

        let result = self.inner.signal(run_id, signal).await;
        // the process may have exited between the decision and the signal
        match &result {
            Ok(()) => tracing::info!("signalled"),
            Err(e) => tracing::warn!(error = %e, "signal failed (may be expected)"),
        }

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
