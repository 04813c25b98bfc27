// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::{ClusterAction, ClusterConfigs};

#[async_trait]
/// Lifecycle control of services and components through the cluster manager.
pub trait ClusterManagerPort: Send + Sync {
    async fn set_service_state(&self, service: &str, action: ClusterAction) -> AppResult<()>;
    async fn set_component_state(&self, component: &str, action: ClusterAction) -> AppResult<()>;
    /// Current configuration of every config type, as exported with the cluster blueprint.
    async fn configurations(&self) -> AppResult<ClusterConfigs>;
}
