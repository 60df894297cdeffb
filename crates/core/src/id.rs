// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions and typed identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// UUID-based ID generator for production use
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential ID generator for testing
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a schedule (a named group of entries)
    ScheduleId
);
string_id!(
    /// Identifier of an entry, unique within its schedule
    EntryId
);
string_id!(
    /// Identifier of a runnable scenario
    ScenarioId
);
string_id!(
    /// Identifier of a character; doubles as the exclusive resource id
    CharacterId
);
string_id!(
    /// Identifier of one run attempt
    RunId
);

/// Fully qualified entry address: entry ids are only unique per schedule
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    pub schedule_id: ScheduleId,
    pub entry_id: EntryId,
}

impl EntryKey {
    pub fn new(schedule_id: impl Into<ScheduleId>, entry_id: impl Into<EntryId>) -> Self {
        Self {
            schedule_id: schedule_id.into(),
            entry_id: entry_id.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.schedule_id, self.entry_id)
    }
}

impl std::str::FromStr for EntryKey {
    type Err = String;

    /// Parses the `schedule/entry` form produced by `Display`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((schedule, entry))
                if !schedule.is_empty() && !entry.is_empty() && !entry.contains('/') =>
            {
                Ok(Self::new(schedule, entry))
            }
            _ => Err(format!("expected <schedule>/<entry>, got '{}'", s)),
        }
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
