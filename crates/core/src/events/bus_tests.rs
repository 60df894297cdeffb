// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event::QueueReason;
use crate::events::EventPattern;
use crate::id::{CharacterId, EntryId, RunId, ScheduleId};

fn timeout(run: &str) -> Event {
    Event::RunTimeout {
        run_id: RunId::new(run),
        elapsed_ms: 5000,
    }
}

fn entry_error() -> Event {
    Event::EntryError {
        schedule_id: ScheduleId::new("daily"),
        entry_id: EntryId::new("e1"),
        kind: crate::event::EntryErrorKind::Config,
        message: "bad cron".to_string(),
    }
}

#[tokio::test]
async fn publish_to_matching_subscribers() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe(Subscription::new(
        "runs",
        vec![EventPattern::new("run:*")],
        "Run events",
    ));

    bus.publish(timeout("run-1"));

    let event = rx.try_recv().unwrap();
    assert_eq!(event, timeout("run-1"));
}

#[tokio::test]
async fn non_matching_events_not_delivered() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe(Subscription::new(
        "runs",
        vec![EventPattern::new("run:*")],
        "Run events",
    ));

    bus.publish(entry_error());

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn global_handler_receives_all_events() {
    let bus = EventBus::new();
    let mut global_rx = bus.set_global_handler();

    bus.publish(timeout("run-1"));
    bus.publish(entry_error());
    bus.publish(Event::RunQueued {
        schedule_id: ScheduleId::new("daily"),
        entry_id: EntryId::new("e1"),
        character_id: CharacterId::new("char-1"),
        reason: QueueReason::ResourceBusy,
        position: 1,
    });

    let mut names = Vec::new();
    while let Ok(event) = global_rx.try_recv() {
        names.push(event.name());
    }
    assert_eq!(names, vec!["run:timeout", "entry:error", "run:queued"]);
}

#[tokio::test]
async fn clones_share_subscribers() {
    let bus = EventBus::new();
    let handle = bus.clone();
    let mut rx = handle.subscribe(Subscription::new(
        "all",
        vec![EventPattern::new("**")],
        "Everything",
    ));

    bus.publish(entry_error());

    assert!(rx.try_recv().is_ok());
    assert_eq!(bus.subscriber_count(), 1);
}

#[tokio::test]
async fn dropped_receivers_are_pruned_on_publish() {
    let bus = EventBus::new();
    let rx = bus.subscribe(Subscription::new(
        "gone",
        vec![EventPattern::new("**")],
        "Dropped",
    ));
    drop(rx);

    bus.publish(entry_error());

    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe(Subscription::new(
        "runs",
        vec![EventPattern::new("run:*")],
        "Run events",
    ));
    bus.unsubscribe(&SubscriberId("runs".to_string()));

    bus.publish(timeout("run-1"));

    assert!(rx.try_recv().is_err());
}
