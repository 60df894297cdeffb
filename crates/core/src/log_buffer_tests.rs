// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[test]
fn keeps_lines_in_arrival_order() {
    let mut buf = LogBuffer::new(3);
    buf.push(LogLine::stdout("a"));
    buf.push(LogLine::stderr("b"));
    assert_eq!(buf.len(), 2);
    assert_eq!(
        buf.into_lines(),
        vec![LogLine::stdout("a"), LogLine::stderr("b")]
    );
}

#[test]
fn evicts_oldest_when_full() {
    let mut buf = LogBuffer::new(2);
    for line in ["one", "two", "three"] {
        buf.push(LogLine::stdout(line));
    }
    assert_eq!(buf.dropped(), 1);
    let lines: Vec<_> = buf.lines().map(|l| l.line.as_str()).collect();
    assert_eq!(lines, vec!["two", "three"]);
}

#[test]
fn zero_capacity_drops_everything() {
    let mut buf = LogBuffer::new(0);
    buf.push(LogLine::stdout("x"));
    assert!(buf.is_empty());
    assert_eq!(buf.dropped(), 1);
}

proptest! {
    #[test]
    fn retains_the_newest_lines(capacity in 1usize..16, count in 0usize..64) {
        let mut buf = LogBuffer::new(capacity);
        for i in 0..count {
            buf.push(LogLine::stdout(i.to_string()));
        }
        let kept: Vec<String> = buf.lines().map(|l| l.line.clone()).collect();
        let expected: Vec<String> = (count.saturating_sub(capacity)..count)
            .map(|i| i.to_string())
            .collect();
        prop_assert_eq!(buf.dropped() as usize, count.saturating_sub(capacity));
        prop_assert_eq!(kept, expected);
    }
}
