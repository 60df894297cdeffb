// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake credential store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Credential, CredentialError, CredentialStore};
use async_trait::async_trait;
use cue_core::CharacterId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeCredentials {
    secrets: HashMap<CharacterId, Credential>,
    failing: bool,
    lookups: Vec<CharacterId>,
}

/// In-memory credential store that records every lookup
#[derive(Clone, Default)]
pub struct FakeCredentialStore {
    inner: Arc<Mutex<FakeCredentials>>,
}

impl FakeCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, character: impl Into<CharacterId>, credential: Credential) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .secrets
            .insert(character.into(), credential);
    }

    /// Make every lookup fail
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).failing = failing;
    }

    /// Characters looked up so far, in order
    pub fn lookups(&self) -> Vec<CharacterId> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .lookups
            .clone()
    }
}

#[async_trait]
impl CredentialStore for FakeCredentialStore {
    async fn resolve_secret(
        &self,
        character: &CharacterId,
    ) -> Result<Option<Credential>, CredentialError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.lookups.push(character.clone());
        if inner.failing {
            return Err(CredentialError::Unavailable("fake store offline".into()));
        }
        Ok(inner.secrets.get(character).cloned())
    }
}
