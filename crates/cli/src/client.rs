// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use cue_core::EntryKey;
use cue_daemon::protocol::{self, ProtocolError};
use cue_daemon::{Request, Response};
use cue_engine::{JobSnapshot, RunSnapshot, RuntimeStatus};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::net::UnixStream;
use tracing::debug;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("CUE_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for daemon to start
pub fn timeout_connect() -> Duration {
    parse_duration_ms("CUE_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for waiting for process to exit.
///
/// Shutdown waits for active runs, so this covers a full grace window.
pub fn timeout_exit() -> Duration {
    parse_duration_ms("CUE_TIMEOUT_EXIT_MS").unwrap_or(Duration::from_secs(20))
}

/// Polling interval for retries
pub fn poll_interval() -> Duration {
    parse_duration_ms("CUE_POLL_INTERVAL_MS").unwrap_or(Duration::from_millis(50))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Failed to start daemon: {0}")]
    DaemonStartFailed(String),

    #[error("Connection timeout waiting for daemon to start")]
    DaemonStartTimeout,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine project root")]
    NoProjectRoot,

    #[error("Could not determine state directory")]
    NoStateDir,
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to daemon, starting it if not running.
    ///
    /// Returns the client and whether this call started the daemon.
    pub async fn connect_or_start(project_root: PathBuf) -> Result<(Self, bool), ClientError> {
        // Restart a daemon left behind by a different CLI version
        if let Ok(daemon_dir) = get_daemon_dir(&project_root) {
            let version_path = daemon_dir.join("daemon.version");
            if let Ok(daemon_version) = std::fs::read_to_string(&version_path) {
                let cli_version = env!("CARGO_PKG_VERSION");
                if daemon_version.trim() != cli_version {
                    debug!(
                        daemon_version = daemon_version.trim(),
                        "version mismatch, restarting daemon"
                    );
                    let _ = daemon_stop(&project_root).await;
                }
            }
        }

        match Self::connect(project_root.clone()) {
            Ok(client) => Ok((client, false)),
            Err(ClientError::DaemonNotRunning) => {
                let child = start_daemon_background(&project_root)?;
                let client =
                    Self::connect_with_retry(project_root, timeout_connect(), child).await?;
                Ok((client, true))
            }
            Err(e) => Err(wrap_with_startup_error(e, &project_root)),
        }
    }

    /// Connect to existing daemon (no auto-start)
    pub fn connect(project_root: PathBuf) -> Result<Self, ClientError> {
        let socket_path = get_socket_path(&project_root)?;

        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }

        Ok(Self { socket_path })
    }

    async fn connect_with_retry(
        project_root: PathBuf,
        timeout: Duration,
        mut child: std::process::Child,
    ) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            // Daemon exited early: startup failed
            if let Ok(Some(status)) = child.try_wait() {
                // Poll for startup error in log (filesystem may need to sync)
                let poll_start = Instant::now();
                while poll_start.elapsed() < poll_interval() * 20 {
                    if let Some(err) = read_startup_error(&project_root) {
                        return Err(ClientError::DaemonStartFailed(err));
                    }
                    tokio::time::sleep(poll_interval()).await;
                }
                return Err(ClientError::DaemonStartFailed(format!(
                    "exited with {}",
                    status
                )));
            }

            match Self::connect(project_root.clone()) {
                // The socket file appears before accept() is polled; make
                // sure the daemon actually answers
                Ok(client) if client.ping().await.is_ok() => return Ok(client),
                Ok(_) | Err(ClientError::DaemonNotRunning) => {
                    tokio::time::sleep(poll_interval()).await;
                }
                Err(e) => return Err(wrap_with_startup_error(e, &project_root)),
            }
        }

        Err(wrap_with_startup_error(
            ClientError::DaemonStartTimeout,
            &project_root,
        ))
    }

    /// Send a request and receive a response with specific timeouts
    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        protocol::write_request(&mut writer, &request, write_timeout).await?;
        let response = protocol::read_response(&mut reader, read_timeout).await?;
        Ok(response)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<(u64, RuntimeStatus), ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                status,
            } => Ok((uptime_secs, status)),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    pub async fn jobs(&self) -> Result<Vec<JobSnapshot>, ClientError> {
        match self.send(Request::ListJobs).await? {
            Response::Jobs { jobs } => Ok(jobs),
            other => Err(unexpected(other)),
        }
    }

    pub async fn active_runs(&self) -> Result<Vec<RunSnapshot>, ClientError> {
        match self.send(Request::ActiveRuns).await? {
            Response::Runs { runs } => Ok(runs),
            other => Err(unexpected(other)),
        }
    }

    pub async fn skipped(&self) -> Result<Vec<EntryKey>, ClientError> {
        match self.send(Request::ListSkipped).await? {
            Response::Skipped { entries } => Ok(entries),
            other => Err(unexpected(other)),
        }
    }

    /// Set a skip flag; false if it was already set
    pub async fn skip(&self, key: EntryKey) -> Result<bool, ClientError> {
        match self.send(Request::Skip { key }).await? {
            Response::Toggled { changed } => Ok(changed),
            other => Err(unexpected(other)),
        }
    }

    /// Clear a skip flag; false if none was set
    pub async fn unskip(&self, key: EntryKey) -> Result<bool, ClientError> {
        match self.send(Request::Unskip { key }).await? {
            Response::Toggled { changed } => Ok(changed),
            other => Err(unexpected(other)),
        }
    }

    pub async fn stop(&self, run_id: &str) -> Result<(), ClientError> {
        match self
            .send(Request::Stop {
                run_id: run_id.to_string(),
            })
            .await?
        {
            Response::Ok => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the daemon to re-read its catalog; returns the armed job count
    pub async fn reload(&self) -> Result<usize, ClientError> {
        match self.send(Request::Reload).await? {
            Response::Reloaded { jobs } => Ok(jobs),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ClientError {
    match response {
        Response::Error { message } => ClientError::Rejected(message),
        _ => ClientError::UnexpectedResponse,
    }
}

/// Start the daemon in the background, returning the child process handle
fn start_daemon_background(project_root: &Path) -> Result<std::process::Child, ClientError> {
    let cued_path = find_cued_binary();
    debug!(binary = %cued_path.display(), "starting daemon");

    Command::new(&cued_path)
        .arg(project_root)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {}", cued_path.display(), e)))
}

/// Run the daemon in the foreground until it exits
pub fn run_daemon_foreground(project_root: &Path) -> Result<std::process::ExitStatus, ClientError> {
    let cued_path = find_cued_binary();
    Command::new(&cued_path)
        .arg(project_root)
        .status()
        .map_err(|e| ClientError::DaemonStartFailed(format!("{}: {}", cued_path.display(), e)))
}

/// Stop the daemon (graceful first, then forceful)
/// Returns true if daemon was stopped, false if it wasn't running
pub async fn daemon_stop(project_root: &Path) -> Result<bool, ClientError> {
    let client = match DaemonClient::connect(project_root.to_path_buf()) {
        Ok(c) => c,
        Err(ClientError::DaemonNotRunning) => {
            if let Ok(daemon_dir) = get_daemon_dir(project_root) {
                cleanup_stale_pid(&daemon_dir);
            }
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    let shutdown_result = client.shutdown().await;

    if let Some(pid) = read_daemon_pid(project_root)? {
        if shutdown_result.is_ok() {
            // Graceful shutdown succeeded, wait for active runs to wind down
            wait_for_exit(pid, timeout_exit()).await;
        }

        // Force kill if still running
        if process_exists(pid) {
            force_kill_daemon(pid);
            wait_for_exit(pid, poll_interval() * 40).await;
        }
    }

    // A daemon killed with -9 leaves its files behind
    let still_running = matches!(read_daemon_pid(project_root)?, Some(pid) if process_exists(pid));
    if !still_running {
        cleanup_stale_pid(&get_daemon_dir(project_root)?);
        let socket = get_socket_path(project_root)?;
        if socket.exists() {
            let _ = std::fs::remove_file(socket);
        }
    }

    Ok(true)
}

/// Wait for a process to exit
async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval()).await;
    }
    false
}

/// Find the cued binary
fn find_cued_binary() -> PathBuf {
    // Explicit override (used by tests to ensure correct binary)
    if let Ok(path) = std::env::var("CUE_DAEMON_BINARY") {
        return PathBuf::from(path);
    }

    // Installed or built next to the CLI
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("cued");
            if sibling.exists() {
                return sibling;
            }
        }
    }

    // Fall back to PATH lookup
    PathBuf::from("cued")
}

/// Get the socket path for a project
///
/// Uses a short path under /tmp to avoid SUN_LEN limit (104 bytes on macOS).
/// The socket is separate from state_dir which can be longer.
fn get_socket_path(project_root: &Path) -> Result<PathBuf, ClientError> {
    let canonical = project_root
        .canonicalize()
        .map_err(|_| ClientError::NoProjectRoot)?;

    let hash = project_hash(&canonical);
    Ok(socket_dir().join(format!("{}.sock", hash)))
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

/// Get the state directory for cue
fn state_dir() -> Result<PathBuf, ClientError> {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("cue"));
    }

    let home = std::env::var("HOME").map_err(|_| ClientError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/cue"))
}

/// Compute project hash for unique daemon directory
fn project_hash(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    // First 16 chars of the hex digest
    result[..8].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Find the project root by walking up from current directory
///
/// Checks CUE_PROJECT_ROOT first, then walks up looking for a .cue
/// directory. Falls back to the current directory.
pub fn find_project_root() -> Result<PathBuf, ClientError> {
    if let Ok(root) = std::env::var("CUE_PROJECT_ROOT") {
        return Ok(PathBuf::from(root));
    }

    let mut current = std::env::current_dir().map_err(|_| ClientError::NoProjectRoot)?;

    loop {
        if current.join(".cue").is_dir() {
            return Ok(current);
        }
        if !current.pop() {
            return std::env::current_dir().map_err(|_| ClientError::NoProjectRoot);
        }
    }
}

/// Clean up orphaned PID file during shutdown.
///
/// Called by daemon_stop when the daemon is not running or after stopping it.
fn cleanup_stale_pid(daemon_dir: &Path) {
    let pid_path = daemon_dir.join("daemon.pid");
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }
}

/// Get the PID from the daemon PID file, if it exists
pub fn read_daemon_pid(project_root: &Path) -> Result<Option<u32>, ClientError> {
    let daemon_dir = get_daemon_dir(project_root)?;
    let pid_path = daemon_dir.join("daemon.pid");

    match std::fs::read_to_string(&pid_path) {
        Ok(content) => Ok(content.trim().parse::<u32>().ok()),
        Err(_) => Ok(None),
    }
}

/// Check if a process with the given PID exists
pub fn process_exists(pid: u32) -> bool {
    // Use kill -0 to check if process exists without sending a signal
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Force kill a daemon process
pub fn force_kill_daemon(pid: u32) -> bool {
    Command::new("kill")
        .args(["-9", &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Get the daemon state directory for a project (logs, pid, version, ledger)
pub fn get_daemon_dir(project_root: &Path) -> Result<PathBuf, ClientError> {
    let canonical = project_root
        .canonicalize()
        .map_err(|_| ClientError::NoProjectRoot)?;

    let hash = project_hash(&canonical);
    Ok(state_dir()?.join("projects").join(&hash))
}

/// Startup marker prefix that daemon writes to log before anything else.
/// Full format: "--- cued: starting (pid: 12345)"
pub const STARTUP_MARKER_PREFIX: &str = "--- cued: starting (pid: ";

/// Read daemon log from startup marker, looking for errors.
/// Returns the error message if found, None otherwise.
pub fn read_startup_error(project_root: &Path) -> Option<String> {
    let daemon_dir = get_daemon_dir(project_root).ok()?;
    let log_path = daemon_dir.join("daemon.log");

    let content = std::fs::read_to_string(&log_path).ok()?;

    // Find the last startup marker
    let start_pos = content.rfind(STARTUP_MARKER_PREFIX)?;
    let startup_log = &content[start_pos..];

    let errors: Vec<&str> = startup_log
        .lines()
        .filter(|line| line.contains(" ERROR ") || line.contains("Failed to start"))
        .collect();

    if errors.is_empty() {
        return None;
    }

    // Strip the timestamp/level prefix from each line
    let error_messages: Vec<String> = errors
        .iter()
        .filter_map(|line| line.split_once(": ").map(|(_, msg)| msg.to_string()))
        .collect();

    if error_messages.is_empty() {
        Some(errors.join("\n"))
    } else {
        Some(error_messages.join("\n"))
    }
}

/// Wrap an error with startup log info if available.
fn wrap_with_startup_error(err: ClientError, project_root: &Path) -> ClientError {
    if matches!(err, ClientError::DaemonStartFailed(_)) {
        return err;
    }

    if let Some(startup_error) = read_startup_error(project_root) {
        ClientError::DaemonStartFailed(startup_error)
    } else {
        err
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
