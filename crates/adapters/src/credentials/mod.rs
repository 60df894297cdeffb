// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential lookup for characters

mod env;
mod noop;

pub use env::EnvCredentialStore;
pub use noop::NoOpCredentialStore;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeCredentialStore;

use async_trait::async_trait;
use cue_core::CharacterId;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
    #[error("incomplete credential for {0}: username and password are both required")]
    Incomplete(CharacterId),
}

/// Login material handed to a run through its scratch file
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolves secrets per character. Called once per run start; results
/// are never cached.
#[async_trait]
pub trait CredentialStore: Clone + Send + Sync + 'static {
    async fn resolve_secret(
        &self,
        character: &CharacterId,
    ) -> Result<Option<Credential>, CredentialError>;
}
