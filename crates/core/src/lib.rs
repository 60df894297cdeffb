// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! cue-core: domain model for the cue scenario scheduler
//!
//! This crate provides:
//! - Schedules, entries, cadences and their next-fire math
//! - Run records and exit classification
//! - The event vocabulary and the event bus
//! - Clock and id abstractions for deterministic tests

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

pub mod cadence;
pub mod clock;
pub mod config;
pub mod event;
pub mod events;
pub mod id;
pub mod log_buffer;
pub mod run;
pub mod scenario;
pub mod schedule;

pub use cadence::{parse_cron, CadenceError, Timetable};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::SchedulerConfig;
pub use event::{EntryErrorKind, Event, QueueReason};
pub use events::{EventBus, EventPattern, EventReceiver, Subscription};
pub use id::{
    CharacterId, EntryId, EntryKey, IdGen, RunId, ScenarioId, ScheduleId, SequentialIdGen,
    UuidIdGen,
};
pub use log_buffer::LogBuffer;
pub use run::{classify, LogLine, LogStream, ProcessExit, RunRecord, RunStatus, SkipReason};
pub use scenario::{Character, Scenario};
pub use schedule::{Cadence, IntervalUnit, OverlapPolicy, RetryPolicy, Schedule, ScheduleEntry};
