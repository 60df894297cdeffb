// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store for deployments without secrets

use super::{Credential, CredentialError, CredentialStore};
use async_trait::async_trait;
use cue_core::CharacterId;

/// Never returns a credential
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpCredentialStore;

#[async_trait]
impl CredentialStore for NoOpCredentialStore {
    async fn resolve_secret(
        &self,
        _character: &CharacterId,
    ) -> Result<Option<Credential>, CredentialError> {
        Ok(None)
    }
}
