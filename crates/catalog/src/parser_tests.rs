// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::NaiveDate;
use yare::parameterized;

const SAMPLE_CATALOG: &str = r#"
[scheduler]
global_concurrency = 2
grace_window = "5s"

[scenario.farm]
command = "/usr/bin/bot"
args = ["--farm", "--fast"]
cwd = "/srv/bot"
env = { MODE = "farm", LEVEL = 3 }

[scenario.daily]
command = "bot-daily"

[character.char-1]
name = "Aria"
env = { SERVER = "eu" }

[character.char-2]

[[schedule]]
id = "main"
name = "Main rotation"
concurrency_limit = 1

[[schedule.entry]]
id = "morning"
scenario = "farm"
character = "char-1"
every = { minutes = 60, anchor = "2026-01-05T08:00:00" }
max_duration = "45m"
overlap = "queue"
retry = { max = 2, backoff = "30s" }

[[schedule.entry]]
id = "nightly"
scenario = "daily"
character = "char-2"
cron = "0 3 * * *"
max_duration = 600
overlap = "kill-previous"

[[schedule]]
id = "extra"
enabled = false

[[schedule.entry]]
id = "once"
scenario = "daily"
character = "char-1"
once = 2026-02-01T12:30:00
max_duration = "1m"
enabled = false
"#;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

#[test]
fn parse_full_catalog() {
    let catalog = parse_catalog(SAMPLE_CATALOG).unwrap();

    assert_eq!(catalog.scheduler.global_concurrency, 2);
    assert_eq!(catalog.scheduler.grace_window, Duration::from_secs(5));
    assert_eq!(catalog.scheduler.log_buffer_lines, 500);

    let farm = catalog.get_scenario(&ScenarioId::new("farm")).unwrap();
    assert_eq!(farm.command, "/usr/bin/bot");
    assert_eq!(farm.args, vec!["--farm", "--fast"]);
    assert_eq!(farm.cwd, Some(PathBuf::from("/srv/bot")));
    assert_eq!(farm.env.get("LEVEL").map(String::as_str), Some("3"));

    let aria = catalog.get_character(&CharacterId::new("char-1")).unwrap();
    assert_eq!(aria.display_name(), "Aria");
    let bare = catalog.get_character(&CharacterId::new("char-2")).unwrap();
    assert_eq!(bare.display_name(), "char-2");

    assert_eq!(catalog.schedules.len(), 2);
    assert_eq!(catalog.entry_count(), 3);
    let main = catalog.get_schedule(&ScheduleId::new("main")).unwrap();
    assert_eq!(main.name, "Main rotation");
    assert_eq!(main.concurrency_limit, Some(1));

    let extra = catalog.get_schedule(&ScheduleId::new("extra")).unwrap();
    assert_eq!(extra.name, "extra");
    assert!(!extra.enabled);
}

#[test]
fn parse_entry_fields() {
    let catalog = parse_catalog(SAMPLE_CATALOG).unwrap();

    let morning = catalog
        .get_entry(&EntryKey::new("main", "morning"))
        .unwrap();
    assert_eq!(
        morning.cadence,
        Cadence::every_minutes(60).anchored(at(2026, 1, 5, 8, 0))
    );
    assert_eq!(morning.max_duration, Duration::from_secs(45 * 60));
    assert_eq!(morning.overlap, OverlapPolicy::Queue);
    assert_eq!(
        morning.retry,
        Some(RetryPolicy {
            max: 2,
            backoff: Duration::from_secs(30)
        })
    );

    let nightly = catalog
        .get_entry(&EntryKey::new("main", "nightly"))
        .unwrap();
    assert_eq!(nightly.cadence, Cadence::cron("0 3 * * *"));
    assert_eq!(nightly.max_duration, Duration::from_secs(600));
    assert_eq!(nightly.overlap, OverlapPolicy::KillPrevious);

    let once = catalog.get_entry(&EntryKey::new("extra", "once")).unwrap();
    assert_eq!(once.cadence, Cadence::once(at(2026, 2, 1, 12, 30)));
    assert!(!once.enabled);
    assert_eq!(once.overlap, OverlapPolicy::Skip);
}

#[test]
fn empty_document_is_empty_catalog() {
    let catalog = parse_catalog("").unwrap();
    assert!(catalog.schedules.is_empty());
    assert_eq!(catalog.scheduler, SchedulerConfig::default());
}

#[test]
fn malformed_cron_is_accepted_at_parse_time() {
    let catalog = parse_catalog(
        r#"
[scenario.s]
command = "true"
[character.c]
[[schedule]]
id = "x"
[[schedule.entry]]
id = "bad"
scenario = "s"
character = "c"
cron = "every tuesday"
max_duration = "1m"
"#,
    )
    .unwrap();
    assert_eq!(catalog.entry_count(), 1);
}

const PREAMBLE: &str = r#"
[scenario.s]
command = "true"
[character.c]
[[schedule]]
id = "x"
"#;

#[parameterized(
    no_cadence = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\nmax_duration = \"1m\"", "one of cron, every, once" },
    two_cadences = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\ncron = \"* * * * *\"\nonce = \"2026-01-01T00:00:00\"\nmax_duration = \"1m\"", "only one of" },
    missing_max_duration = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\ncron = \"* * * * *\"", "max_duration" },
    zero_max_duration = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\ncron = \"* * * * *\"\nmax_duration = \"0s\"", "greater than zero" },
    bad_overlap = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\ncron = \"* * * * *\"\nmax_duration = \"1m\"\noverlap = \"replace\"", "unknown overlap policy" },
    both_units = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\nevery = { minutes = 1, hours = 1 }\nmax_duration = \"1m\"", "not both" },
    zero_interval = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\nevery = { minutes = 0 }\nmax_duration = \"1m\"", "positive integer" },
    bad_anchor = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\nevery = { hours = 1, anchor = \"tomorrow\" }\nmax_duration = \"1m\"", "not a date-time" },
    unknown_scenario = { "id = \"e\"\nscenario = \"nope\"\ncharacter = \"c\"\ncron = \"* * * * *\"\nmax_duration = \"1m\"", "unknown scenario 'nope'" },
    unknown_character = { "id = \"e\"\nscenario = \"s\"\ncharacter = \"nope\"\ncron = \"* * * * *\"\nmax_duration = \"1m\"", "unknown character 'nope'" },
)]
fn invalid_entries_are_rejected(entry: &str, message: &str) {
    let content = format!("{}\n[[schedule.entry]]\n{}\n", PREAMBLE, entry);
    let err = parse_catalog(&content).unwrap_err();
    assert!(
        err.to_string().contains(message),
        "expected '{}' in '{}'",
        message,
        err
    );
}

#[test]
fn duplicate_entry_ids_within_schedule_are_rejected() {
    let content = format!(
        "{}\n[[schedule.entry]]\nid = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\ncron = \"* * * * *\"\nmax_duration = \"1m\"\n[[schedule.entry]]\nid = \"e\"\nscenario = \"s\"\ncharacter = \"c\"\ncron = \"* * * * *\"\nmax_duration = \"1m\"\n",
        PREAMBLE
    );
    let err = parse_catalog(&content).unwrap_err();
    assert!(matches!(err, ParseError::Duplicate { kind: "entry", .. }));
}

#[test]
fn duplicate_schedule_ids_are_rejected() {
    let content = format!("{}\n[[schedule]]\nid = \"x\"\n", PREAMBLE);
    let err = parse_catalog(&content).unwrap_err();
    assert!(matches!(err, ParseError::Duplicate { kind: "schedule", .. }));
}

#[test]
fn zero_global_concurrency_is_rejected() {
    let err = parse_catalog("[scheduler]\nglobal_concurrency = 0\n").unwrap_err();
    assert!(err.to_string().contains("global_concurrency"));
}

#[test]
fn scenario_requires_command() {
    let err = parse_catalog("[scenario.s]\nargs = []\n").unwrap_err();
    assert!(matches!(err, ParseError::MissingField(ref f) if f == "scenario.s.command"));
}
