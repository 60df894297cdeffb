// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: processes, credentials, the run ledger

pub mod credentials;
pub mod ledger;
pub mod process;
pub mod traced;

pub use credentials::{
    Credential, CredentialError, CredentialStore, EnvCredentialStore, NoOpCredentialStore,
};
pub use ledger::{JsonlRunLedger, LedgerEntry, LedgerError, NoOpRunLedger, RunLedger};
pub use process::{
    process_channel, OsProcessAdapter, ProcessAdapter, ProcessError, ProcessEvent,
    ProcessEventReceiver, ProcessEventSender, SpawnSpec, StopSignal,
};
pub use traced::TracedProcessAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use credentials::FakeCredentialStore;
#[cfg(any(test, feature = "test-support"))]
pub use ledger::FakeRunLedger;
#[cfg(any(test, feature = "test-support"))]
pub use process::{FakeProcessAdapter, ProcessCall};
