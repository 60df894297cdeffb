// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cue scheduling engine: triggers, admission and process supervision

mod arbiter;
mod error;
mod runtime;
mod supervisor;
mod timer;
mod trigger;

pub use arbiter::{Admission, Arbiter, Decision, Pending, RunRequest};
pub use error::RuntimeError;
pub use runtime::{Runtime, RuntimeDeps, RuntimeInput, RuntimeStatus};
pub use supervisor::{Completion, RunSnapshot, RunState, StartOutcome, Supervisor};
pub use timer::{TimerKey, TimerSet};
pub use trigger::{Fired, JobSnapshot, TriggerEngine};
