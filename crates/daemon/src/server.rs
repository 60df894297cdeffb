// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use cue_core::RunId;
use tokio::net::UnixStream;
use tracing::{debug, error, info};

use crate::lifecycle::DaemonState;
use cue_daemon::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Handle a single client connection
pub async fn handle_connection(
    daemon: &mut DaemonState,
    stream: UnixStream,
) -> Result<(), ServerError> {
    // Split stream for reading/writing
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    let response = handle_request(daemon, request).await;

    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
pub async fn handle_request(daemon: &mut DaemonState, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => Response::Status {
            uptime_secs: daemon.start_time.elapsed().as_secs(),
            status: daemon.runtime.status(),
        },

        Request::ListJobs => Response::Jobs {
            jobs: daemon.runtime.jobs(),
        },

        Request::ActiveRuns => Response::Runs {
            runs: daemon.runtime.active_runs(),
        },

        Request::ListSkipped => Response::Skipped {
            entries: daemon.runtime.list_skipped(),
        },

        Request::Skip { key } => match daemon.runtime.set_skipped(key.clone()) {
            Ok(changed) => {
                info!(entry = %key, changed, "skip flag set");
                Response::Toggled { changed }
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Unskip { key } => {
            let changed = daemon.runtime.clear_skipped(&key);
            info!(entry = %key, changed, "skip flag cleared");
            Response::Toggled { changed }
        }

        Request::Stop { run_id } => match daemon.runtime.stop(&RunId::new(run_id)).await {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Reload => match daemon.reload().await {
            Ok(jobs) => Response::Reloaded { jobs },
            Err(e) => {
                error!("Reload failed: {}", e);
                Response::Error {
                    message: e.to_string(),
                }
            }
        },

        Request::Shutdown => {
            daemon.shutdown_requested = true;
            Response::ShuttingDown
        }
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}
