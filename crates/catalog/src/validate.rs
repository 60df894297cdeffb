// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-reference checks run after parsing
//!
//! Cadence syntax is deliberately not checked here: a malformed cron
//! expression only disables its own entry at registration.

use crate::parser::{Catalog, ParseError};
use std::collections::HashSet;

pub fn validate(catalog: &Catalog) -> Result<(), ParseError> {
    if catalog.scheduler.global_concurrency == 0 {
        return Err(ParseError::InvalidFormat(
            "scheduler.global_concurrency must be at least 1".to_string(),
        ));
    }

    let mut schedule_ids = HashSet::new();
    for schedule in &catalog.schedules {
        if !schedule_ids.insert(&schedule.id) {
            return Err(ParseError::Duplicate {
                kind: "schedule",
                id: schedule.id.to_string(),
            });
        }

        let mut entry_ids = HashSet::new();
        for entry in &schedule.entries {
            if !entry_ids.insert(&entry.id) {
                return Err(ParseError::Duplicate {
                    kind: "entry",
                    id: format!("{}/{}", schedule.id, entry.id),
                });
            }
            if !catalog.scenarios.contains_key(&entry.scenario_id) {
                return Err(ParseError::UnknownReference {
                    field: format!("schedule.{}.entry.{}.scenario", schedule.id, entry.id),
                    kind: "scenario",
                    id: entry.scenario_id.to_string(),
                });
            }
            if !catalog.characters.contains_key(&entry.character_id) {
                return Err(ParseError::UnknownReference {
                    field: format!("schedule.{}.entry.{}.character", schedule.id, entry.id),
                    kind: "character",
                    id: entry.character_id.to_string(),
                });
            }
        }
    }

    Ok(())
}
