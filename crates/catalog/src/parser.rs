// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Catalog TOML parsing

use chrono::NaiveDateTime;
use cue_core::{
    Cadence, Character, CharacterId, EntryId, EntryKey, IntervalUnit, OverlapPolicy, RetryPolicy,
    Scenario, ScenarioId, Schedule, ScheduleEntry, ScheduleId, SchedulerConfig,
};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during catalog parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("{field} refers to unknown {kind} '{id}'")]
    UnknownReference {
        field: String,
        kind: &'static str,
        id: String,
    },
    #[error("duplicate {kind} id '{id}'")]
    Duplicate { kind: &'static str, id: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A parsed catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub scheduler: SchedulerConfig,
    pub scenarios: HashMap<ScenarioId, Scenario>,
    pub characters: HashMap<CharacterId, Character>,
    pub schedules: Vec<Schedule>,
}

impl Catalog {
    pub fn get_scenario(&self, id: &ScenarioId) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    pub fn get_character(&self, id: &CharacterId) -> Option<&Character> {
        self.characters.get(id)
    }

    pub fn get_schedule(&self, id: &ScheduleId) -> Option<&Schedule> {
        self.schedules.iter().find(|s| &s.id == id)
    }

    pub fn get_entry(&self, key: &EntryKey) -> Option<&ScheduleEntry> {
        self.get_schedule(&key.schedule_id)
            .and_then(|s| s.entry(&key.entry_id))
    }

    pub fn entry_count(&self) -> usize {
        self.schedules.iter().map(|s| s.entries.len()).sum()
    }
}

/// Parse and validate a catalog from TOML content
pub fn parse_catalog(content: &str) -> Result<Catalog, ParseError> {
    let raw: toml::Value = toml::from_str(content)?;
    let table = raw
        .as_table()
        .ok_or_else(|| ParseError::InvalidFormat("root must be a table".to_string()))?;

    let mut catalog = Catalog::default();

    if let Some(scheduler) = table.get("scheduler") {
        catalog.scheduler = scheduler
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| ParseError::InvalidFormat(format!("scheduler: {}", e)))?;
    }

    if let Some(scenarios) = table.get("scenario").and_then(|v| v.as_table()) {
        for (name, value) in scenarios {
            let scenario = parse_scenario(name, value)?;
            catalog.scenarios.insert(scenario.id.clone(), scenario);
        }
    }

    if let Some(characters) = table.get("character").and_then(|v| v.as_table()) {
        for (name, value) in characters {
            let character = parse_character(name, value)?;
            catalog.characters.insert(character.id.clone(), character);
        }
    }

    if let Some(schedules) = table.get("schedule") {
        let schedules = schedules.as_array().ok_or_else(|| {
            ParseError::InvalidFormat("schedule must be an array of tables ([[schedule]])".into())
        })?;
        for value in schedules {
            catalog.schedules.push(parse_schedule(value)?);
        }
    }

    crate::validate(&catalog)?;
    Ok(catalog)
}

fn parse_scenario(name: &str, value: &toml::Value) -> Result<Scenario, ParseError> {
    let ctx = format!("scenario.{}", name);
    let table = as_table(value, &ctx)?;

    let command = required_str(table, "command", &ctx)?;
    let args = match table.get("args") {
        Some(v) => string_array(v, &format!("{}.args", ctx))?,
        None => Vec::new(),
    };
    let cwd = optional_str(table, "cwd", &ctx)?.map(PathBuf::from);
    let env = string_map(table, "env", &ctx)?;

    Ok(Scenario {
        id: ScenarioId::new(name),
        command,
        args,
        cwd,
        env,
    })
}

fn parse_character(name: &str, value: &toml::Value) -> Result<Character, ParseError> {
    let ctx = format!("character.{}", name);
    let table = as_table(value, &ctx)?;

    Ok(Character {
        id: CharacterId::new(name),
        name: optional_str(table, "name", &ctx)?,
        env: string_map(table, "env", &ctx)?,
    })
}

fn parse_schedule(value: &toml::Value) -> Result<Schedule, ParseError> {
    let table = as_table(value, "schedule")?;
    let id = required_str(table, "id", "schedule")?;
    let ctx = format!("schedule.{}", id);

    let name = optional_str(table, "name", &ctx)?.unwrap_or_else(|| id.clone());
    let enabled = optional_bool(table, "enabled", &ctx)?.unwrap_or(true);
    let concurrency_limit = match table.get("concurrency_limit") {
        Some(v) => Some(positive_int(v, &format!("{}.concurrency_limit", ctx))?),
        None => None,
    };

    let entries = match table.get("entry") {
        Some(v) => {
            let arr = v.as_array().ok_or_else(|| {
                ParseError::InvalidFormat(format!("{}.entry must be an array of tables", ctx))
            })?;
            arr.iter()
                .map(|e| parse_entry(&ctx, e))
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    Ok(Schedule {
        id: ScheduleId::new(id),
        name,
        enabled,
        concurrency_limit,
        entries,
    })
}

fn parse_entry(schedule_ctx: &str, value: &toml::Value) -> Result<ScheduleEntry, ParseError> {
    let table = as_table(value, &format!("{}.entry", schedule_ctx))?;
    let id = required_str(table, "id", &format!("{}.entry", schedule_ctx))?;
    let ctx = format!("{}.entry.{}", schedule_ctx, id);

    let scenario = required_str(table, "scenario", &ctx)?;
    let character = required_str(table, "character", &ctx)?;
    let cadence = parse_cadence(table, &ctx)?;

    let max_duration = table
        .get("max_duration")
        .ok_or_else(|| ParseError::MissingField(format!("{}.max_duration", ctx)))
        .and_then(|v| parse_duration(v, &format!("{}.max_duration", ctx)))?;
    if max_duration.is_zero() {
        return Err(ParseError::InvalidFormat(format!(
            "{}.max_duration must be greater than zero",
            ctx
        )));
    }

    let overlap = match optional_str(table, "overlap", &ctx)? {
        Some(s) => s
            .parse::<OverlapPolicy>()
            .map_err(|e| ParseError::InvalidFormat(format!("{}.overlap: {}", ctx, e)))?,
        None => OverlapPolicy::default(),
    };

    let retry = match table.get("retry") {
        Some(v) => Some(parse_retry(v, &format!("{}.retry", ctx))?),
        None => None,
    };

    Ok(ScheduleEntry {
        id: EntryId::new(id),
        scenario_id: ScenarioId::new(scenario),
        character_id: CharacterId::new(character),
        cadence,
        max_duration,
        overlap,
        retry,
        enabled: optional_bool(table, "enabled", &ctx)?.unwrap_or(true),
    })
}

/// Exactly one of `cron`, `every`, `once`
fn parse_cadence(table: &toml::Table, ctx: &str) -> Result<Cadence, ParseError> {
    let present: Vec<&str> = ["cron", "every", "once"]
        .into_iter()
        .filter(|k| table.contains_key(*k))
        .collect();
    match present.as_slice() {
        ["cron"] => Ok(Cadence::Cron {
            expression: required_str(table, "cron", ctx)?,
        }),
        ["every"] => parse_every(&table["every"], &format!("{}.every", ctx)),
        ["once"] => Ok(Cadence::Once {
            at: parse_local_datetime(&table["once"], &format!("{}.once", ctx))?,
        }),
        [] => Err(ParseError::MissingField(format!(
            "{}: one of cron, every, once",
            ctx
        ))),
        _ => Err(ParseError::InvalidFormat(format!(
            "{}: only one of cron, every, once may be set (found {})",
            ctx,
            present.join(", ")
        ))),
    }
}

fn parse_every(value: &toml::Value, ctx: &str) -> Result<Cadence, ParseError> {
    let table = as_table(value, ctx)?;
    let (unit, n) = match (table.get("minutes"), table.get("hours")) {
        (Some(v), None) => (IntervalUnit::Minutes, v),
        (None, Some(v)) => (IntervalUnit::Hours, v),
        (None, None) => {
            return Err(ParseError::MissingField(format!("{}.minutes or {}.hours", ctx, ctx)))
        }
        (Some(_), Some(_)) => {
            return Err(ParseError::InvalidFormat(format!(
                "{}: set minutes or hours, not both",
                ctx
            )))
        }
    };
    let n = positive_int(n, ctx)?;
    let n = u32::try_from(n)
        .map_err(|_| ParseError::InvalidFormat(format!("{}: interval too large", ctx)))?;
    let anchor = match table.get("anchor") {
        Some(v) => Some(parse_local_datetime(v, &format!("{}.anchor", ctx))?),
        None => None,
    };
    Ok(Cadence::Every { unit, n, anchor })
}

fn parse_retry(value: &toml::Value, ctx: &str) -> Result<RetryPolicy, ParseError> {
    let table = as_table(value, ctx)?;
    let max = table
        .get("max")
        .ok_or_else(|| ParseError::MissingField(format!("{}.max", ctx)))?
        .as_integer()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| ParseError::InvalidFormat(format!("{}.max must be a non-negative integer", ctx)))?;
    let backoff = match table.get("backoff") {
        Some(v) => parse_duration(v, &format!("{}.backoff", ctx))?,
        None => Duration::ZERO,
    };
    Ok(RetryPolicy { max, backoff })
}

/// Durations are humantime strings ("45m", "1h 30m") or integer seconds
fn parse_duration(value: &toml::Value, ctx: &str) -> Result<Duration, ParseError> {
    match value {
        toml::Value::String(s) => humantime::parse_duration(s)
            .map_err(|e| ParseError::InvalidFormat(format!("{}: {}", ctx, e))),
        toml::Value::Integer(secs) => u64::try_from(*secs)
            .map(Duration::from_secs)
            .map_err(|_| ParseError::InvalidFormat(format!("{} must not be negative", ctx))),
        _ => Err(ParseError::InvalidFormat(format!(
            "{} must be a duration string or seconds",
            ctx
        ))),
    }
}

/// Local date-times as TOML local datetimes or strings
fn parse_local_datetime(value: &toml::Value, ctx: &str) -> Result<NaiveDateTime, ParseError> {
    let text = match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Datetime(dt) => {
            if dt.offset.is_some() {
                return Err(ParseError::InvalidFormat(format!(
                    "{}: use a local time without an offset",
                    ctx
                )));
            }
            dt.to_string()
        }
        _ => {
            return Err(ParseError::InvalidFormat(format!(
                "{} must be a local date-time",
                ctx
            )))
        }
    };
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
        .ok_or_else(|| {
            ParseError::InvalidFormat(format!(
                "{}: '{}' is not a date-time like 2026-01-05T08:00:00",
                ctx, text
            ))
        })
}

fn as_table<'a>(value: &'a toml::Value, ctx: &str) -> Result<&'a toml::Table, ParseError> {
    value
        .as_table()
        .ok_or_else(|| ParseError::InvalidFormat(format!("{} must be a table", ctx)))
}

fn optional_str(table: &toml::Table, key: &str, ctx: &str) -> Result<Option<String>, ParseError> {
    match table.get(key) {
        Some(toml::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ParseError::InvalidFormat(format!(
            "{}.{} must be a string",
            ctx, key
        ))),
        None => Ok(None),
    }
}

fn required_str(table: &toml::Table, key: &str, ctx: &str) -> Result<String, ParseError> {
    optional_str(table, key, ctx)?
        .ok_or_else(|| ParseError::MissingField(format!("{}.{}", ctx, key)))
}

fn optional_bool(table: &toml::Table, key: &str, ctx: &str) -> Result<Option<bool>, ParseError> {
    match table.get(key) {
        Some(toml::Value::Boolean(b)) => Ok(Some(*b)),
        Some(_) => Err(ParseError::InvalidFormat(format!(
            "{}.{} must be a boolean",
            ctx, key
        ))),
        None => Ok(None),
    }
}

fn positive_int(value: &toml::Value, ctx: &str) -> Result<usize, ParseError> {
    value
        .as_integer()
        .filter(|v| *v >= 1)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ParseError::InvalidFormat(format!("{} must be a positive integer", ctx)))
}

fn string_array(value: &toml::Value, ctx: &str) -> Result<Vec<String>, ParseError> {
    let arr = value
        .as_array()
        .ok_or_else(|| ParseError::InvalidFormat(format!("{} must be an array", ctx)))?;
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(String::from)
                .ok_or_else(|| ParseError::InvalidFormat(format!("{} must contain strings", ctx)))
        })
        .collect()
}

fn string_map(
    table: &toml::Table,
    key: &str,
    ctx: &str,
) -> Result<BTreeMap<String, String>, ParseError> {
    let Some(value) = table.get(key) else {
        return Ok(BTreeMap::new());
    };
    let map = as_table(value, &format!("{}.{}", ctx, key))?;
    map.iter()
        .map(|(k, v)| {
            let v = match v {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                _ => {
                    return Err(ParseError::InvalidFormat(format!(
                        "{}.{}.{} must be a string",
                        ctx, key, k
                    )))
                }
            };
            Ok((k.clone(), v))
        })
        .collect()
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
