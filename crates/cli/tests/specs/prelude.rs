// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the cue specs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use tempfile::TempDir;

/// Upper bound for polling helpers
pub const SPEC_WAIT_MAX_MS: u64 = 5_000;

/// A catalog with one hourly entry that never fires during a spec
pub const MINIMAL_CATALOG: &str = r#"
[scenario.farm]
command = "/bin/true"

[character.char-1]

[[schedule]]
id = "daily"

[[schedule.entry]]
id = "morning"
scenario = "farm"
character = "char-1"
every = { minutes = 60 }
max_duration = "5m"
"#;

/// Poll `check` until it holds or `max_ms` elapses
pub fn wait_for(max_ms: u64, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    check()
}

/// The `cued` binary built next to `cue`, if the workspace built it
pub fn cued_binary() -> Option<PathBuf> {
    let cue = PathBuf::from(env!("CARGO_BIN_EXE_cue"));
    let cued = cue.parent()?.join("cued");
    cued.is_file().then_some(cued)
}

/// Temporary project with isolated state and socket directories.
/// Any daemon started against it is stopped on drop.
pub struct Project {
    root: TempDir,
    state: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(".cue")).unwrap();
        Self {
            root,
            state: tempfile::tempdir().unwrap(),
        }
    }

    pub fn with_catalog(content: &str) -> Self {
        let project = Self::empty();
        project.file(".cue/catalog/catalog.toml", content);
        project
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn state_path(&self) -> &Path {
        self.state.path()
    }

    pub fn file(&self, relative: &str, content: &str) {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    /// Directory holding this project's pid, log and ledger
    pub fn daemon_dir(&self) -> PathBuf {
        let projects = self.state.path().join("cue/projects");
        std::fs::read_dir(&projects)
            .ok()
            .and_then(|mut entries| entries.next())
            .and_then(|e| e.ok())
            .map(|e| e.path())
            .unwrap_or(projects)
    }

    pub fn cue(&self) -> CliRun {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_cue"));
        cmd.current_dir(self.root.path())
            .env("XDG_STATE_HOME", self.state.path())
            .env("CUE_SOCKET_DIR", self.state.path().join("sock"))
            .env_remove("CUE_PROJECT_ROOT")
            .env_remove("CUE_LOG");
        if let Some(cued) = cued_binary() {
            cmd.env("CUE_DAEMON_BINARY", cued);
        }
        CliRun { cmd }
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        if cued_binary().is_some() {
            let _ = self.cue().args(&["daemon", "stop"]).cmd.output();
        }
    }
}

pub struct CliRun {
    cmd: Command,
}

impl CliRun {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn passes(mut self) -> Output {
        let output = Output::from(self.cmd.output().unwrap());
        assert!(
            output.success,
            "expected success\nstdout:\n{}\nstderr:\n{}",
            output.stdout, output.stderr
        );
        output
    }

    pub fn fails(mut self) -> Output {
        let output = Output::from(self.cmd.output().unwrap());
        assert!(
            !output.success,
            "expected failure\nstdout:\n{}\nstderr:\n{}",
            output.stdout, output.stderr
        );
        output
    }
}

pub struct Output {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for Output {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl Output {
    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(
            self.stdout.contains(needle),
            "stdout missing {:?}\nstdout:\n{}",
            needle,
            self.stdout
        );
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        assert!(
            !self.stdout.contains(needle),
            "stdout unexpectedly has {:?}\nstdout:\n{}",
            needle,
            self.stdout
        );
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(
            self.stderr.contains(needle),
            "stderr missing {:?}\nstderr:\n{}",
            needle,
            self.stderr
        );
        self
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout).unwrap()
    }
}

/// Skip daemon specs when `cued` was not built alongside `cue`
macro_rules! require_daemon {
    () => {
        if $crate::prelude::cued_binary().is_none() {
            eprintln!("skipping: cued binary not built");
            return;
        }
    };
}
pub(crate) use require_daemon;
