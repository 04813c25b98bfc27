// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::ConnectionProfile;

#[async_trait]
/// Registry of connection profiles. Missing names are a `NotFound` configuration error.
pub trait ProfileStorePort: Send + Sync {
    async fn get_profile(&self, name: &str) -> AppResult<ConnectionProfile>;
    async fn list_profiles(&self) -> AppResult<Vec<ConnectionProfile>>;
}
