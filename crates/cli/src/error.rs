// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! This module provides enhanced error types that include:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)

use std::fmt;

use crate::client::ClientError;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct CueError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CueError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    /// Add context about why this error might have happened.
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    /// Add a suggestion for how to fix this error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Set the source error that caused this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for CueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for CueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Common error builders for typical failure scenarios.
impl CueError {
    pub fn daemon_not_running() -> Self {
        CueError::new("Daemon not running")
            .with_context("Commands that talk to the scheduler need a running cued")
            .with_suggestion("Start it with: cue daemon start")
    }

    pub fn daemon_start_failed(detail: &str) -> Self {
        CueError::new("Failed to start daemon")
            .with_context(detail.to_string())
            .with_suggestion("Validate the catalog: cue check")
            .with_suggestion("Inspect the daemon log: cue daemon logs")
    }

    pub fn unknown_entry(detail: &str) -> Self {
        CueError::new(detail.to_string())
            .with_context("The entry does not exist or is disabled")
            .with_suggestion("List registered entries: cue jobs")
    }

    pub fn unknown_run(detail: &str) -> Self {
        CueError::new(detail.to_string())
            .with_context("The run may already have finished")
            .with_suggestion("List active runs: cue runs --active")
            .with_suggestion("Check the ledger: cue runs")
    }
}

impl From<ClientError> for CueError {
    fn from(err: ClientError) -> Self {
        let specific = match &err {
            ClientError::DaemonNotRunning => Some(CueError::daemon_not_running()),
            ClientError::DaemonStartFailed(detail) => Some(CueError::daemon_start_failed(detail)),
            ClientError::Rejected(message) if message.starts_with("unknown entry") => {
                Some(CueError::unknown_entry(message))
            }
            ClientError::Rejected(message) if message.starts_with("unknown run") => {
                Some(CueError::unknown_run(message))
            }
            _ => None,
        };
        specific.unwrap_or_else(|| CueError::new(err.to_string()).with_source(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CueError::new("Something went wrong")
            .with_context("First context")
            .with_context("Second context")
            .with_suggestion("Try this")
            .with_suggestion("Or this");

        let output = format!("{}", err);
        assert!(output.contains("error: Something went wrong"));
        assert!(output.contains("-> First context"));
        assert!(output.contains("-> Second context"));
        assert!(output.contains("1. Try this"));
        assert!(output.contains("2. Or this"));
    }

    #[test]
    fn daemon_not_running_suggests_start() {
        let err = CueError::from(ClientError::DaemonNotRunning);
        let output = format!("{}", err);
        assert!(output.contains("Daemon not running"));
        assert!(output.contains("cue daemon start"));
    }

    #[test]
    fn rejected_unknown_entry_points_at_jobs() {
        let err = CueError::from(ClientError::Rejected(
            "unknown entry: daily/nope".to_string(),
        ));
        let output = format!("{}", err);
        assert!(output.contains("unknown entry: daily/nope"));
        assert!(output.contains("cue jobs"));
    }

    #[test]
    fn other_errors_keep_their_message() {
        let err = CueError::from(ClientError::UnexpectedResponse);
        assert_eq!(err.message, "Unexpected response from daemon");
        assert!(err.suggestions.is_empty());
    }
}
