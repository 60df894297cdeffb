// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, reload, shutdown.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use cue_adapters::{
    process_channel, EnvCredentialStore, JsonlRunLedger, LedgerError, OsProcessAdapter,
    ProcessEventReceiver, TracedProcessAdapter,
};
use cue_catalog::{load_catalog, Catalog, ParseError};
use cue_core::{Event, EventBus, EventReceiver, SystemClock, UuidIdGen};
use cue_engine::{Runtime, RuntimeDeps, RuntimeInput};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

/// Daemon runtime with concrete adapter types (wrapped with tracing)
pub type DaemonRuntime = Runtime<
    TracedProcessAdapter<OsProcessAdapter>,
    EnvCredentialStore,
    JsonlRunLedger,
    SystemClock,
    UuidIdGen,
>;

/// Extra time past the grace window to wait for killed runs to be reaped
const DRAIN_SLACK: Duration = Duration::from_secs(5);

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root directory
    pub project_root: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the run ledger
    pub ledger_path: PathBuf,
    /// Where per-run credential files go unless the catalog says otherwise
    pub scratch_path: PathBuf,
}

impl Config {
    /// Create config for a project
    pub fn for_project(project_root: &Path) -> Result<Self, LifecycleError> {
        let canonical = project_root
            .canonicalize()
            .map_err(|e| LifecycleError::ProjectNotFound(project_root.to_path_buf(), e))?;

        let hash = project_hash(&canonical);
        let state_dir = state_dir()?.join("projects").join(&hash);
        let socket_dir = socket_dir();

        Ok(Self {
            project_root: canonical,
            socket_path: socket_dir.join(format!("{}.sock", hash)),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            ledger_path: state_dir.join("runs.jsonl"),
            scratch_path: state_dir.join("scratch"),
        })
    }
}

/// Daemon state during operation
pub struct DaemonState {
    /// Configuration
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    /// Runtime for event processing
    pub runtime: DaemonRuntime,
    /// Output, exit and spawn events from child processes
    pub process_events: ProcessEventReceiver,
    /// When daemon started
    pub start_time: Instant,
    /// Shutdown requested flag
    pub shutdown_requested: bool,
}

impl DaemonState {
    /// Re-read the catalog and re-register every entry.
    ///
    /// A catalog that fails to load leaves the current registration intact.
    pub async fn reload(&mut self) -> Result<usize, LifecycleError> {
        let catalog = load_catalog_for(&self.config)?;
        let jobs = self.runtime.reload(catalog).await;
        info!(jobs, "catalog reloaded");
        Ok(jobs)
    }

    /// Hand one input to the runtime
    pub async fn drive(&mut self, input: RuntimeInput) {
        self.runtime.handle(input).await;
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop triggering and signal every active run
        let stopping = self.runtime.shutdown().await;
        if stopping > 0 {
            info!(runs = stopping, "waiting for active runs to exit");
            self.drain_runs().await;
        }

        // 2. Remove socket file
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 3. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 4. Remove version file
        if self.config.version_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.version_path) {
                warn!("Failed to remove version file: {}", e);
            }
        }

        // 5. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }

    /// Keep handling exits and kill timers until every run is reaped or the
    /// grace window has clearly passed
    async fn drain_runs(&mut self) {
        let grace = self.runtime.catalog().scheduler.grace_window;
        let give_up = tokio::time::Instant::now() + grace + DRAIN_SLACK;

        while self.runtime.has_active_runs() {
            let wake = self
                .runtime
                .next_deadline()
                .map(tokio::time::Instant::from_std)
                .map_or(give_up, |deadline| deadline.min(give_up));

            tokio::select! {
                Some(event) = self.process_events.recv() => {
                    self.drive(RuntimeInput::Process(event)).await;
                }
                _ = tokio::time::sleep_until(wake) => {
                    if tokio::time::Instant::now() >= give_up {
                        warn!(
                            remaining = self.runtime.active_runs().len(),
                            "runs still active after grace window, exiting anyway"
                        );
                        break;
                    }
                    self.drive(RuntimeInput::Tick).await;
                }
            }
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Project not found at {0}: {1}")]
    ProjectNotFound(PathBuf, std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] ParseError),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // Another daemon owns these files
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory (needed for lock, ledger, etc.)
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents races
    // Not truncated until locked: the file may hold a live daemon's pid
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Create directories
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&config.scratch_path)?;

    // Write version file
    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    // 4. Load catalog BEFORE binding socket (fail fast, don't accept connections if invalid)
    let catalog = load_catalog_for(config)?;

    // 5. Open the run ledger
    let ledger = JsonlRunLedger::open(&config.ledger_path)?;
    info!(
        path = %config.ledger_path.display(),
        sequence = ledger.sequence(),
        "opened run ledger"
    );

    // 6. Set up adapters (wrapped with tracing for observability)
    let processes = TracedProcessAdapter::new(OsProcessAdapter::new());
    let credentials = EnvCredentialStore::new();
    let (process_tx, process_events) = process_channel();

    // 7. Every published event goes to the log at debug level
    let bus = EventBus::new();
    tokio::spawn(log_events(bus.set_global_handler()));

    // 8. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 9. Create runtime and arm the catalog
    let mut runtime = Runtime::new(
        RuntimeDeps {
            processes,
            credentials,
            ledger,
            process_events: process_tx,
            bus,
        },
        SystemClock,
        UuidIdGen,
    );
    let jobs = runtime.reload(catalog).await;

    info!(
        jobs,
        "Daemon started for project: {}",
        config.project_root.display()
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        runtime,
        process_events,
        start_time: Instant::now(),
        shutdown_requested: false,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove version file
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Load the project catalog, defaulting the scratch dir to the state dir
fn load_catalog_for(config: &Config) -> Result<Catalog, LifecycleError> {
    let mut catalog = load_catalog(&config.project_root)?;
    if catalog.scheduler.scratch_dir.is_none() {
        catalog.scheduler.scratch_dir = Some(config.scratch_path.clone());
    }
    Ok(catalog)
}

async fn log_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match &event {
            Event::TriggerError { .. } | Event::EntryError { .. } => {
                warn!(event = event.name(), detail = ?event, "scheduler error");
            }
            Event::RunOutput { .. } => {}
            _ => {
                debug!(
                    event = event.name(),
                    run_id = event.run_id().map(|r| r.as_str()),
                    "event"
                );
            }
        }
    }
}

/// Get the state directory for cue
fn state_dir() -> Result<PathBuf, LifecycleError> {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("cue"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/cue"))
}

/// Get the socket directory for cue
///
/// Uses /tmp/cue by default to keep paths short (macOS SUN_LEN = 104).
/// Can be overridden with CUE_SOCKET_DIR for testing.
fn socket_dir() -> PathBuf {
    match std::env::var("CUE_SOCKET_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => PathBuf::from("/tmp/cue"),
    }
}

/// Compute project hash for unique daemon directory
fn project_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // First 16 chars of the hex digest
    result[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
