// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run ledger: append-only sink for terminal run records

mod jsonl;

pub use jsonl::{JsonlRunLedger, LedgerEntry};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRunLedger;

use cue_core::RunRecord;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ledger rejected record: {0}")]
    Rejected(String),
}

/// Durable history of run outcomes
pub trait RunLedger: Send + 'static {
    /// Append one record; returns its sequence number
    fn append(&mut self, record: &RunRecord) -> Result<u64, LedgerError>;
}

/// Ledger that discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpRunLedger;

impl RunLedger for NoOpRunLedger {
    fn append(&mut self, _record: &RunRecord) -> Result<u64, LedgerError> {
        Ok(0)
    }
}
