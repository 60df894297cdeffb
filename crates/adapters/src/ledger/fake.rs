// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory run ledger for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LedgerError, RunLedger};
use cue_core::RunRecord;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeLedgerState {
    records: Vec<RunRecord>,
    failing: bool,
}

/// Shared in-memory ledger; clones see the same records
#[derive(Clone, Default)]
pub struct FakeRunLedger {
    state: Arc<Mutex<FakeLedgerState>>,
}

impl FakeRunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RunRecord> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .records
            .clone()
    }

    /// Make appends fail
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).failing = failing;
    }
}

impl RunLedger for FakeRunLedger {
    fn append(&mut self, record: &RunRecord) -> Result<u64, LedgerError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.failing {
            return Err(LedgerError::Rejected("fake ledger failing".into()));
        }
        state.records.push(record.clone());
        Ok(state.records.len() as u64)
    }
}
