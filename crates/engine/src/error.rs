// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use cue_adapters::{CredentialError, LedgerError, ProcessError};
use cue_core::{CharacterId, EntryKey, RunId, ScenarioId};
use thiserror::Error;

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("process error: {0}")]
    Process(#[from] ProcessError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("scratch file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown run: {0}")]
    UnknownRun(RunId),
    #[error("unknown entry: {0}")]
    UnknownEntry(EntryKey),
    #[error("scenario not found: {0}")]
    ScenarioNotFound(ScenarioId),
    #[error("character not found: {0}")]
    CharacterNotFound(CharacterId),
}
