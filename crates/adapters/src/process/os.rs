// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process adapter backed by real OS processes

use super::{ProcessAdapter, ProcessError, ProcessEvent, ProcessEventSender, SpawnSpec, StopSignal};
use async_trait::async_trait;
use cue_core::{LogLine, LogStream, ProcessExit, RunId};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// How long to keep reading pipes after the group was killed. Only a
/// descendant that moved to its own session can still hold them open.
const OUTPUT_DRAIN: Duration = Duration::from_millis(500);

/// Spawns each run as the leader of its own process group and signals
/// the whole group. When the leader exits, whatever is left of its group
/// is killed before the exit is reported, so nothing from a finished run
/// keeps working its character.
#[derive(Clone, Default)]
pub struct OsProcessAdapter {
    pids: Arc<Mutex<HashMap<RunId, u32>>>,
}

impl OsProcessAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pid of a still-running process
    pub fn pid(&self, run_id: &RunId) -> Option<u32> {
        self.pids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(run_id)
            .copied()
    }
}

#[async_trait]
impl ProcessAdapter for OsProcessAdapter {
    async fn spawn(
        &self,
        spec: SpawnSpec,
        events: ProcessEventSender,
    ) -> Result<u32, ProcessError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::SpawnFailed(format!("{}: {}", spec.command, e)))?;
        let pid = child
            .id()
            .ok_or_else(|| ProcessError::SpawnFailed("process exited before reporting a pid".into()))?;

        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(
                stdout,
                spec.run_id.clone(),
                LogStream::Stdout,
                events.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(
                stderr,
                spec.run_id.clone(),
                LogStream::Stderr,
                events.clone(),
            ));
        }

        self.pids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(spec.run_id.clone(), pid);

        let pids = Arc::clone(&self.pids);
        let run_id = spec.run_id;
        tokio::spawn(async move {
            let status = child.wait().await;
            reap_group(&run_id, pid);
            let drained = tokio::time::timeout(OUTPUT_DRAIN, async {
                for reader in readers {
                    let _ = reader.await;
                }
            })
            .await;
            if drained.is_err() {
                tracing::warn!(%run_id, "output pipes still open after exit, detaching");
            }

            pids.lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&run_id);

            let exit = match status {
                Ok(status) => ProcessExit {
                    code: status.code(),
                    signal: status.signal(),
                },
                Err(e) => {
                    tracing::error!(%run_id, error = %e, "failed to wait for process");
                    ProcessExit::code(-1)
                }
            };
            let _ = events.send(ProcessEvent::Exited { run_id, exit });
        });

        Ok(pid)
    }

    async fn signal(&self, run_id: &RunId, signal: StopSignal) -> Result<(), ProcessError> {
        let pid = self
            .pid(run_id)
            .ok_or_else(|| ProcessError::NotFound(run_id.clone()))?;
        let pgid = i32::try_from(pid)
            .map_err(|_| ProcessError::SignalFailed(format!("pid {} out of range", pid)))?;

        match killpg(Pid::from_raw(pgid), signal.as_nix()) {
            // already gone; the exit event is on its way
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::SignalFailed(e.to_string())),
        }
    }
}

/// SIGKILL the rest of a finished leader's process group
fn reap_group(run_id: &RunId, pgid: u32) {
    let Ok(pgid) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => tracing::debug!(%run_id, pgid, "killed leftover process group members"),
        Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(%run_id, pgid, error = %e, "failed to kill process group"),
    }
}

/// Forward each line of a pipe as a `ProcessEvent::Output`.
/// Invalid UTF-8 is replaced rather than ending the stream.
fn forward_lines<R>(
    reader: R,
    run_id: RunId,
    stream: LogStream,
    events: ProcessEventSender,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = LogLine {
                        stream,
                        line: text.trim_end_matches(['\n', '\r']).to_string(),
                    };
                    let event = ProcessEvent::Output {
                        run_id: run_id.clone(),
                        line,
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(%run_id, error = %e, "output stream closed");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "os_tests.rs"]
mod tests;
