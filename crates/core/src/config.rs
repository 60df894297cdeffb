// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler tuning knobs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GLOBAL_CONCURRENCY: usize = 4;
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(10);
pub const DEFAULT_LOG_BUFFER_LINES: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of runs active at once across all schedules
    pub global_concurrency: usize,
    /// Delay between SIGTERM and SIGKILL
    #[serde(with = "humantime_serde")]
    pub grace_window: Duration,
    /// Output lines kept per run
    pub log_buffer_lines: usize,
    /// Where per-run credential files are written; system temp dir if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            global_concurrency: DEFAULT_GLOBAL_CONCURRENCY,
            grace_window: DEFAULT_GRACE_WINDOW,
            log_buffer_lines: DEFAULT_LOG_BUFFER_LINES,
            scratch_dir: None,
        }
    }
}

impl SchedulerConfig {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
