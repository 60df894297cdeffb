// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic timers keyed by what they are for
//!
//! A min-heap of deadlines. Cancelling or re-arming a key bumps its
//! generation, so stale heap entries are dropped when they surface, or
//! in bulk once they outnumber the live ones.

use cue_core::{EntryKey, RunId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

/// What a timer is for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Next fire of a schedule entry
    Entry(EntryKey),
    /// A run reached its max duration
    SoftTimeout(RunId),
    /// Grace window after SIGTERM ran out
    HardKill(RunId),
    /// Backoff before a failed run is attempted again
    Retry(RunId),
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKey::Entry(key) => write!(f, "entry:{}", key),
            TimerKey::SoftTimeout(run_id) => write!(f, "soft-timeout:{}", run_id),
            TimerKey::HardKill(run_id) => write!(f, "hard-kill:{}", run_id),
            TimerKey::Retry(run_id) => write!(f, "retry:{}", run_id),
        }
    }
}

#[derive(Debug)]
struct Armed {
    fire_at: Instant,
    seq: u64,
    key: TimerKey,
}

impl PartialEq for Armed {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for Armed {}

impl PartialOrd for Armed {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Armed {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earliest first, then arming order
        Reverse((self.fire_at, self.seq)).cmp(&Reverse((other.fire_at, other.seq)))
    }
}

/// Heap size below which stale entries are left for `pop_due`
const COMPACT_MIN: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Live {
    seq: u64,
    fire_at: Instant,
    repeat: Option<Duration>,
}

/// Set of armed timers
#[derive(Debug, Default)]
pub struct TimerSet {
    heap: BinaryHeap<Armed>,
    live: HashMap<TimerKey, Live>,
    next_seq: u64,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot timer, replacing any timer already armed for `key`
    pub fn arm_once(&mut self, key: TimerKey, fire_at: Instant) {
        self.arm(key, fire_at, None);
    }

    /// Arm a timer that fires at `first` and then every `interval`
    pub fn arm_repeating(&mut self, key: TimerKey, first: Instant, interval: Duration) {
        self.arm(key, first, Some(interval));
    }

    fn arm(&mut self, key: TimerKey, fire_at: Instant, repeat: Option<Duration>) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.live.insert(
            key.clone(),
            Live {
                seq,
                fire_at,
                repeat,
            },
        );
        self.heap.push(Armed { fire_at, seq, key });
        self.compact_if_sparse();
    }

    /// Disarm a timer; returns false if it was not armed
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        let removed = self.live.remove(key).is_some();
        self.compact_if_sparse();
        removed
    }

    /// Disarm every timer whose key fails the predicate
    pub fn retain(&mut self, mut keep: impl FnMut(&TimerKey) -> bool) {
        self.live.retain(|key, _| keep(key));
        self.compact_if_sparse();
    }

    /// Drop superseded heap entries once they are more than half the heap
    fn compact_if_sparse(&mut self) {
        if self.heap.len() < COMPACT_MIN || self.heap.len() <= 2 * self.live.len() {
            return;
        }
        let live = &self.live;
        self.heap
            .retain(|armed| live.get(&armed.key).is_some_and(|l| l.seq == armed.seq));
    }

    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.live.contains_key(key)
    }

    /// When the timer for `key` will next fire
    pub fn deadline(&self, key: &TimerKey) -> Option<Instant> {
        self.live.get(key).map(|live| live.fire_at)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.live.values().map(|live| live.fire_at).min()
    }

    /// Pop the earliest timer due at or before `now`.
    ///
    /// Repeating timers are re-armed at the first period boundary after
    /// `now`; periods missed while the host was busy are not replayed.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKey> {
        while let Some(head) = self.heap.peek() {
            if head.fire_at > now {
                return None;
            }
            let armed = self.heap.pop()?;

            // Skip cancelled or superseded entries
            let Some(live) = self.live.get(&armed.key).copied() else {
                continue;
            };
            if live.seq != armed.seq {
                continue;
            }

            match live.repeat {
                Some(interval) if !interval.is_zero() => {
                    let mut next = armed.fire_at + interval;
                    while next <= now {
                        next += interval;
                    }
                    self.arm(armed.key.clone(), next, Some(interval));
                }
                _ => {
                    self.live.remove(&armed.key);
                }
            }
            return Some(armed.key);
        }
        None
    }

    /// All timers due at or before `now`, in deadline order
    pub fn poll(&mut self, now: Instant) -> Vec<TimerKey> {
        let mut ready = Vec::new();
        while let Some(key) = self.pop_due(now) {
            ready.push(key);
        }
        ready
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    /// Number of armed timers
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
