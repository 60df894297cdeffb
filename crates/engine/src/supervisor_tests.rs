// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cue_adapters::{
    process_channel, FakeCredentialStore, FakeProcessAdapter, ProcessEvent, ProcessEventReceiver,
};
use cue_core::{Cadence, FakeClock, ScheduleEntry};
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tempfile::TempDir;

const MAX: Duration = Duration::from_secs(5);
const GRACE: Duration = Duration::from_secs(10);

struct Harness {
    supervisor: Supervisor<FakeProcessAdapter, FakeCredentialStore>,
    processes: FakeProcessAdapter,
    credentials: FakeCredentialStore,
    rx: ProcessEventReceiver,
    timers: TimerSet,
    clock: FakeClock,
    scratch: TempDir,
}

impl Harness {
    fn new() -> Self {
        let scratch = TempDir::new().unwrap();
        let processes = FakeProcessAdapter::new();
        let credentials = FakeCredentialStore::new();
        let (tx, rx) = process_channel();
        let config = SchedulerConfig {
            grace_window: GRACE,
            log_buffer_lines: 3,
            scratch_dir: Some(scratch.path().to_path_buf()),
            ..SchedulerConfig::default()
        };
        Self {
            supervisor: Supervisor::new(processes.clone(), credentials.clone(), tx, config),
            processes,
            credentials,
            rx,
            timers: TimerSet::new(),
            clock: FakeClock::new(),
            scratch,
        }
    }

    async fn start(&mut self, run: &str) -> StartOutcome {
        let scenario = Scenario::new("farm", "/usr/bin/bot")
            .with_args(["--farm"])
            .with_env("MODE", "farm");
        let character = Character::new("char-1").with_env("SERVER", "eu");
        self.supervisor
            .start(request(run), &scenario, &character, &mut self.timers, &self.clock)
            .await
    }

    /// Deliver the next exit the fake adapter reported
    fn next_exit(&mut self) -> Option<Completion> {
        while let Ok(event) = self.rx.try_recv() {
            match event {
                ProcessEvent::Exited { run_id, exit } => {
                    return self
                        .supervisor
                        .on_exit(&run_id, exit, &mut self.timers, &self.clock)
                }
                ProcessEvent::Output { run_id, line } => {
                    self.supervisor.on_output(&run_id, line);
                }
            }
        }
        None
    }
}

fn request(run: &str) -> RunRequest {
    RunRequest {
        run_id: RunId::new(run),
        key: EntryKey::new("daily", "farm"),
        entry: ScheduleEntry::new("farm", "farm", "char-1", Cadence::every_minutes(1), MAX),
        attempt: 0,
    }
}

#[tokio::test]
async fn start_spawns_with_resolved_environment() {
    let mut h = Harness::new();

    let outcome = h.start("run-1").await;

    assert!(matches!(outcome, StartOutcome::Started { pid: 1001 }));
    let spec = &h.processes.spawned()[0];
    assert_eq!(spec.command, "/usr/bin/bot");
    assert_eq!(spec.args, vec!["--farm"]);
    assert_eq!(spec.env_var("MODE"), Some("farm"));
    assert_eq!(spec.env_var("SERVER"), Some("eu"));
    assert_eq!(spec.env_var("CUE_RUN_ID"), Some("run-1"));
    assert_eq!(spec.env_var("CUE_SCHEDULE_ID"), Some("daily"));
    assert_eq!(spec.env_var("CUE_ENTRY_ID"), Some("farm"));
    assert_eq!(spec.env_var("CUE_SCENARIO_ID"), Some("farm"));
    assert_eq!(spec.env_var("CUE_CHARACTER_ID"), Some("char-1"));
    assert_eq!(spec.env_var("CUE_CREDENTIALS_FILE"), None);

    assert_eq!(
        h.timers.deadline(&TimerKey::SoftTimeout(RunId::new("run-1"))),
        Some(h.clock.now() + MAX)
    );
    let runs = h.supervisor.active_runs(&h.clock);
    assert_eq!(runs[0].state, RunState::Running);
    assert_eq!(runs[0].pid, 1001);
}

#[tokio::test]
async fn credential_file_is_private_and_removed_on_exit() {
    let mut h = Harness::new();
    h.credentials
        .insert("char-1", Credential::new("aria", "hunter2"));

    h.start("run-1").await;

    let spec = h.processes.spawned()[0].clone();
    assert_eq!(spec.env_var("CUE_CHARACTER_USERNAME"), Some("aria"));
    let path = PathBuf::from(spec.env_var("CUE_CREDENTIALS_FILE").unwrap());
    assert!(path.starts_with(h.scratch.path()));

    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
    let content: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(content["username"], "aria");
    assert_eq!(content["password"], "hunter2");

    h.processes.exit(&RunId::new("run-1"), ProcessExit::code(0));
    let done = h.next_exit().unwrap();
    assert_eq!(done.record.status, RunStatus::Success);
    assert!(!path.exists());
}

#[tokio::test]
async fn spawn_failure_is_terminal_error_without_pid() {
    let mut h = Harness::new();
    h.credentials
        .insert("char-1", Credential::new("aria", "hunter2"));
    h.processes.fail_next_spawn("no such file");

    let outcome = h.start("run-1").await;

    let StartOutcome::Failed(done) = outcome else {
        panic!("expected spawn failure");
    };
    assert_eq!(done.record.status, RunStatus::Error);
    assert_eq!(done.record.exit_code, None);
    assert!(done.record.error.unwrap().contains("no such file"));
    assert!(!h.supervisor.is_active(&RunId::new("run-1")));
    assert!(h.timers.is_empty());
    assert_eq!(std::fs::read_dir(h.scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn credential_lookup_failure_fails_the_start() {
    let mut h = Harness::new();
    h.credentials.set_failing(true);

    let outcome = h.start("run-1").await;

    assert!(matches!(outcome, StartOutcome::Failed(_)));
    assert!(h.processes.spawned().is_empty());
}

#[tokio::test]
async fn timeout_escalates_from_term_to_kill() {
    let mut h = Harness::new();
    h.processes.ignore(StopSignal::Terminate);
    let run = RunId::new("run-1");
    h.start("run-1").await;

    h.clock.advance(MAX);
    assert_eq!(
        h.timers.poll(h.clock.now()),
        vec![TimerKey::SoftTimeout(run.clone())]
    );
    let event = h
        .supervisor
        .on_soft_timeout(&run, &mut h.timers, &h.clock)
        .await;
    assert!(matches!(event, Some(Event::RunTimeout { elapsed_ms: 5000, .. })));
    assert_eq!(h.processes.signals(), vec![(run.clone(), StopSignal::Terminate)]);
    assert_eq!(
        h.timers.deadline(&TimerKey::HardKill(run.clone())),
        Some(h.clock.now() + GRACE)
    );
    assert!(h.next_exit().is_none());

    h.clock.advance(GRACE);
    assert_eq!(h.timers.poll(h.clock.now()), vec![TimerKey::HardKill(run.clone())]);
    assert!(h.supervisor.on_hard_kill(&run).await);
    assert_eq!(h.processes.signals()[1], (run.clone(), StopSignal::Kill));

    let done = h.next_exit().unwrap();
    assert_eq!(done.record.status, RunStatus::Timeout);
    assert_eq!(done.record.signal, Some(9));
    assert!(h.timers.is_empty());
}

#[tokio::test]
async fn exit_during_grace_cancels_the_hard_kill() {
    let mut h = Harness::new();
    let run = RunId::new("run-1");
    h.start("run-1").await;

    h.clock.advance(MAX);
    h.timers.poll(h.clock.now());
    h.supervisor
        .on_soft_timeout(&run, &mut h.timers, &h.clock)
        .await;

    // Fake honours SIGTERM immediately
    let done = h.next_exit().unwrap();
    assert_eq!(done.record.status, RunStatus::Timeout);
    assert!(!h.timers.is_armed(&TimerKey::HardKill(run)));
}

#[tokio::test]
async fn stop_is_idempotent_and_classifies_as_killed() {
    let mut h = Harness::new();
    h.processes.ignore(StopSignal::Terminate);
    let run = RunId::new("run-1");
    h.start("run-1").await;
    h.clock.advance(Duration::from_secs(1));

    assert!(h.supervisor.stop(&run, &mut h.timers, &h.clock).await);
    assert!(!h.supervisor.stop(&run, &mut h.timers, &h.clock).await);
    assert!(!h.supervisor.stop(&RunId::new("ghost"), &mut h.timers, &h.clock).await);
    assert!(!h.timers.is_armed(&TimerKey::SoftTimeout(run.clone())));
    assert_eq!(h.processes.signals().len(), 1);

    h.processes.exit(&run, ProcessExit::signal(15));
    let done = h.next_exit().unwrap();
    assert_eq!(done.record.status, RunStatus::Killed);
    assert!(!h.supervisor.stop(&run, &mut h.timers, &h.clock).await);
}

#[tokio::test]
async fn nonzero_exit_is_an_error() {
    let mut h = Harness::new();
    h.start("run-1").await;

    h.processes.exit(&RunId::new("run-1"), ProcessExit::code(3));
    let done = h.next_exit().unwrap();

    assert_eq!(done.record.status, RunStatus::Error);
    assert_eq!(done.record.exit_code, Some(3));
    assert!(h.supervisor.is_empty());
}

#[tokio::test]
async fn output_is_kept_in_a_bounded_buffer() {
    let mut h = Harness::new();
    let run = RunId::new("run-1");
    h.start("run-1").await;

    for i in 0..5 {
        h.processes.emit_output(&run, LogLine::stdout(format!("line {}", i)));
    }
    h.processes.exit(&run, ProcessExit::code(0));
    let done = h.next_exit().unwrap();

    let lines: Vec<&str> = done.log.iter().map(|l| l.line.as_str()).collect();
    assert_eq!(lines, vec!["line 2", "line 3", "line 4"]);
    assert!(matches!(done.event(), Event::RunExit { .. }));
}

#[tokio::test]
async fn exit_is_reported_once() {
    let mut h = Harness::new();
    let run = RunId::new("run-1");
    h.start("run-1").await;

    assert!(h
        .supervisor
        .on_exit(&run, ProcessExit::code(0), &mut h.timers, &h.clock)
        .is_some());
    assert!(h
        .supervisor
        .on_exit(&run, ProcessExit::code(0), &mut h.timers, &h.clock)
        .is_none());
}

#[tokio::test]
async fn snapshots_report_elapsed_and_remaining() {
    let mut h = Harness::new();
    h.start("run-1").await;
    h.clock.advance(Duration::from_secs(2));

    let runs = h.supervisor.active_runs(&h.clock);

    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].elapsed_ms, 2000);
    assert_eq!(runs[0].remaining_ms, 3000);
    assert_eq!(runs[0].character_id.as_str(), "char-1");
}

#[tokio::test]
async fn shutdown_stops_every_run() {
    let mut h = Harness::new();
    h.start("run-1").await;
    h.start("run-2").await;

    let stopped = h.supervisor.shutdown(&mut h.timers, &h.clock).await;

    assert_eq!(stopped, 2);
    assert!(h.next_exit().is_some());
    assert!(h.next_exit().is_some());
    assert!(h.supervisor.is_empty());
}
