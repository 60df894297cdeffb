// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-backed credential store

use super::{Credential, CredentialError, CredentialStore};
use async_trait::async_trait;
use cue_core::CharacterId;

pub const DEFAULT_PREFIX: &str = "CUE_CRED";

/// Reads `<PREFIX>_<CHARACTER>_USERNAME` and `<PREFIX>_<CHARACTER>_PASSWORD`.
///
/// The character id is upper-cased and every non-alphanumeric character
/// becomes `_`, so `char-1` reads `CUE_CRED_CHAR_1_USERNAME`.
#[derive(Clone, Debug)]
pub struct EnvCredentialStore {
    prefix: String,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn var_name(&self, character: &CharacterId, field: &str) -> String {
        let key: String = character
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}_{}", self.prefix, key, field)
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn resolve_secret(
        &self,
        character: &CharacterId,
    ) -> Result<Option<Credential>, CredentialError> {
        let username = std::env::var(self.var_name(character, "USERNAME")).ok();
        let password = std::env::var(self.var_name(character, "PASSWORD")).ok();
        match (username, password) {
            (Some(username), Some(password)) => Ok(Some(Credential { username, password })),
            (None, None) => Ok(None),
            _ => Err(CredentialError::Incomplete(character.clone())),
        }
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
