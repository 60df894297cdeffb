// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Next-fire computation for cadences
//!
//! A `Timetable` is a cadence compiled once at registration: cron
//! expressions are parsed, intervals turned into a period. All math is
//! generic over the time zone so tests can pin it to UTC.

use crate::schedule::Cadence;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CadenceError {
    #[error("invalid cron expression '{expression}': {message}")]
    InvalidCron { expression: String, message: String },
    #[error("interval must be at least 1")]
    ZeroInterval,
    #[error("local time {0} does not exist in this time zone")]
    NonexistentLocalTime(NaiveDateTime),
}

#[derive(Debug, Clone)]
enum Kind {
    Cron(Box<cron::Schedule>),
    Every {
        period: ChronoDuration,
        anchor: Option<NaiveDateTime>,
    },
    Once {
        at: NaiveDateTime,
    },
}

/// A compiled cadence
#[derive(Debug, Clone)]
pub struct Timetable {
    kind: Kind,
}

impl Timetable {
    pub fn compile(cadence: &Cadence) -> Result<Self, CadenceError> {
        let kind = match cadence {
            Cadence::Cron { expression } => Kind::Cron(Box::new(parse_cron(expression)?)),
            Cadence::Every { unit, n, anchor } => {
                if *n == 0 {
                    return Err(CadenceError::ZeroInterval);
                }
                let secs = unit.seconds() as i64 * i64::from(*n);
                Kind::Every {
                    period: ChronoDuration::seconds(secs),
                    anchor: *anchor,
                }
            }
            Cadence::Once { at } => Kind::Once { at: *at },
        };
        Ok(Self { kind })
    }

    /// Recurring cadences re-arm after each fire; one-shots do not
    pub fn is_recurring(&self) -> bool {
        !matches!(self.kind, Kind::Once { .. })
    }

    /// Fixed period of an interval cadence
    pub fn period(&self) -> Option<std::time::Duration> {
        match &self.kind {
            Kind::Every { period, .. } => period.to_std().ok(),
            _ => None,
        }
    }

    /// Phase origin of an interval cadence: the anchor when one is set,
    /// otherwise the registration time.
    pub fn origin<Tz: TimeZone>(
        &self,
        registered_at: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, CadenceError> {
        match &self.kind {
            Kind::Every {
                anchor: Some(anchor),
                ..
            } => resolve_local(&registered_at.timezone(), anchor),
            _ => Ok(registered_at.clone()),
        }
    }

    /// Next fire strictly after `now`.
    ///
    /// `origin` is the value returned by [`Timetable::origin`] at
    /// registration. Returns `Ok(None)` when the cadence will never fire
    /// again (one-shot in the past, exhausted cron).
    pub fn next_after<Tz: TimeZone>(
        &self,
        origin: &DateTime<Tz>,
        now: &DateTime<Tz>,
    ) -> Result<Option<DateTime<Tz>>, CadenceError> {
        match &self.kind {
            Kind::Cron(schedule) => Ok(schedule.after(now).next()),
            Kind::Every { period, .. } => Ok(Some(phase_locked(origin, *period, now))),
            Kind::Once { at } => {
                let at = resolve_local(&now.timezone(), at)?;
                Ok((at > *now).then_some(at))
            }
        }
    }
}

/// Smallest `origin + k * period` strictly after `now`, with `k >= 0`
/// for origins in the future.
fn phase_locked<Tz: TimeZone>(
    origin: &DateTime<Tz>,
    period: ChronoDuration,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    if origin > now {
        return origin.clone();
    }
    let period_ms = period.num_milliseconds().max(1);
    let elapsed_ms = (now.clone() - origin.clone()).num_milliseconds();
    let k = elapsed_ms / period_ms + 1;
    origin.clone() + ChronoDuration::milliseconds(k * period_ms)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, at: &NaiveDateTime) -> Result<DateTime<Tz>, CadenceError> {
    tz.from_local_datetime(at)
        .earliest()
        .ok_or(CadenceError::NonexistentLocalTime(*at))
}

/// Parse a cron expression. Five fields are crontab form
/// (`min hour dom month dow`, Sunday is 0 or 7); six or seven carry
/// seconds first and an optional year and use the `cron` crate's
/// numbering as-is (Sunday is 1).
pub fn parse_cron(expression: &str) -> Result<cron::Schedule, CadenceError> {
    let invalid = |message: String| CadenceError::InvalidCron {
        expression: expression.to_string(),
        message,
    };
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = match fields[..] {
        [minute, hour, dom, month, dow] => {
            let dow = crontab_weekdays(dow).map_err(invalid)?;
            format!("0 {} {} {} {} {}", minute, hour, dom, month, dow)
        }
        _ => expression.trim().to_string(),
    };
    cron::Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Rewrite a crontab day-of-week field into weekday names.
///
/// Numeric items (`N`, `N-M`, `N-M/S`, `*/S`, `N/S`) are expanded over
/// 0..=7 with 7 folded onto Sunday. A bare `*`, `?` and named items pass
/// through untouched.
fn crontab_weekdays(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut items = Vec::new();
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid day-of-week step '{}'", item))?;
                if step == 0 {
                    return Err(format!("day-of-week step must be positive in '{}'", item));
                }
                (base, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = match base.split_once('-') {
            _ if base == "*" => (0, 6),
            Some((a, b)) => match (weekday_number(a), weekday_number(b)) {
                (Some(a), Some(b)) => (a?, b?),
                // Named ranges such as MON-FRI are already in the crate's terms
                _ => {
                    items.push(item.to_string());
                    continue;
                }
            },
            None => match weekday_number(base) {
                Some(n) => {
                    let n = n?;
                    (n, if step.is_some() { 6 } else { n })
                }
                None => {
                    items.push(item.to_string());
                    continue;
                }
            },
        };
        if start > end {
            return Err(format!("day-of-week range '{}' runs backwards", item));
        }

        let step = step.unwrap_or(1) as usize;
        for day in (start..=end).step_by(step) {
            let name = WEEKDAYS[day as usize % 7];
            if !items.iter().any(|existing| existing == name) {
                items.push(name.to_string());
            }
        }
    }
    Ok(items.join(","))
}

/// `None` for non-numeric text, `Some(Err)` for numbers outside 0..=7
fn weekday_number(text: &str) -> Option<Result<u32, String>> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(match text.parse::<u32>() {
        Ok(n) if n <= 7 => Ok(n),
        _ => Err(format!("day-of-week {} is outside 0-7", text)),
    })
}

#[cfg(test)]
#[path = "cadence_tests.rs"]
mod tests;
