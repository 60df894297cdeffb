// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    skip = { "skip", OverlapPolicy::Skip },
    queue = { "queue", OverlapPolicy::Queue },
    kill_previous = { "kill-previous", OverlapPolicy::KillPrevious },
)]
fn overlap_policy_round_trips_through_strings(text: &str, policy: OverlapPolicy) {
    assert_eq!(text.parse::<OverlapPolicy>().unwrap(), policy);
    assert_eq!(policy.to_string(), text);
}

#[test]
fn unknown_overlap_policy_is_rejected() {
    assert!("replace".parse::<OverlapPolicy>().is_err());
}

#[test]
fn entry_defaults_to_enabled_skip_without_retry() {
    let entry = ScheduleEntry::new(
        "e1",
        "farm",
        "char-1",
        Cadence::every_minutes(5),
        Duration::from_secs(60),
    );
    assert!(entry.enabled);
    assert_eq!(entry.overlap, OverlapPolicy::Skip);
    assert!(entry.retry.is_none());
}

#[test]
fn schedule_looks_up_entries_by_id() {
    let schedule = Schedule::new("daily", "Daily").with_entry(ScheduleEntry::new(
        "e1",
        "farm",
        "char-1",
        Cadence::every_hours(1),
        Duration::from_secs(60),
    ));
    let entry = schedule.entry(&EntryId::new("e1")).unwrap();
    assert_eq!(schedule.key(entry), EntryKey::new("daily", "e1"));
    assert!(schedule.entry(&EntryId::new("missing")).is_none());
}

#[test]
fn anchored_only_applies_to_intervals() {
    let at = chrono::NaiveDate::from_ymd_opt(2026, 1, 5)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    assert_eq!(
        Cadence::every_hours(1).anchored(at),
        Cadence::Every {
            unit: IntervalUnit::Hours,
            n: 1,
            anchor: Some(at)
        }
    );
    assert_eq!(Cadence::cron("0 * * * *").anchored(at), Cadence::cron("0 * * * *"));
}

#[test]
fn cadence_display_is_human_readable() {
    assert_eq!(Cadence::every_minutes(15).to_string(), "every 15min");
    assert_eq!(Cadence::cron("0 9 * * *").to_string(), "cron '0 9 * * *'");
}
