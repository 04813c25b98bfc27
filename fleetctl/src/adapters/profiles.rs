// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::ProfileStorePort;
use crate::app::types::ConnectionProfile;

/// Profiles declared in the `[[profiles]]` tables of the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigProfileStore {
    profiles: Vec<ConnectionProfile>,
}

impl ConfigProfileStore {
    pub fn new(profiles: Vec<ConnectionProfile>) -> AppResult<Self> {
        for (idx, profile) in profiles.iter().enumerate() {
            if profile.name.trim().is_empty() {
                return Err(AppError::invalid_argument(format!(
                    "profile #{} has no name",
                    idx + 1
                )));
            }
            if profile.username.trim().is_empty() {
                return Err(AppError::invalid_argument(format!(
                    "profile '{}' has no username",
                    profile.name
                )));
            }
            if profiles[..idx].iter().any(|p| p.name == profile.name) {
                return Err(AppError::invalid_argument(format!(
                    "profile '{}' is declared twice",
                    profile.name
                )));
            }
        }
        Ok(Self { profiles })
    }
}

#[async_trait]
impl ProfileStorePort for ConfigProfileStore {
    async fn get_profile(&self, name: &str) -> AppResult<ConnectionProfile> {
        self.profiles
            .iter()
            .find(|profile| profile.name == name)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("connection profile '{name}' not found")))
    }

    async fn list_profiles(&self) -> AppResult<Vec<ConnectionProfile>> {
        Ok(self.profiles.clone())
    }
}
