// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-lines run ledger

use super::{LedgerError, RunLedger};
use cue_core::RunRecord;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One line of the ledger file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub record: RunRecord,
}

/// Append-only ledger, one fsync'd JSON line per record
pub struct JsonlRunLedger {
    path: PathBuf,
    file: File,
    sequence: u64,
}

impl JsonlRunLedger {
    /// Open or create a ledger at the given path
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        // Continue numbering after the existing entries
        let reader = BufReader::new(File::open(path)?);
        let sequence = reader
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count() as u64;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sequence,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Read every entry back. A missing file is an empty ledger; a torn
    /// final line (crash mid-write) is ignored.
    pub fn replay(path: &Path) -> Result<Vec<LedgerEntry>, LedgerError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<String> = BufReader::new(file).lines().collect::<Result<_, _>>()?;
        let last = lines.iter().rposition(|l| !l.trim().is_empty());
        let mut entries = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) if Some(i) == last => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring torn ledger tail");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(entries)
    }

    /// The most recent `limit` records, oldest first
    pub fn tail(path: &Path, limit: usize) -> Result<Vec<RunRecord>, LedgerError> {
        let entries = Self::replay(path)?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).map(|e| e.record).collect())
    }
}

impl RunLedger for JsonlRunLedger {
    fn append(&mut self, record: &RunRecord) -> Result<u64, LedgerError> {
        let entry = LedgerEntry {
            seq: self.sequence + 1,
            record: record.clone(),
        };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        self.sequence = entry.seq;
        Ok(self.sequence)
    }
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
