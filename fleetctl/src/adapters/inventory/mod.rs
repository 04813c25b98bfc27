// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use async_trait::async_trait;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::InventoryPort;
use crate::app::types::Inventory;

/// Inventory read from a JSON snapshot file on every call.
#[derive(Clone, Debug)]
pub struct SnapshotInventory {
    path: PathBuf,
}

impl SnapshotInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn decode_inventory(raw: &str) -> AppResult<Inventory> {
    serde_json::from_str(raw)
        .map_err(|err| AppError::invalid_argument(format!("invalid inventory snapshot: {err}")))
}

#[async_trait]
impl InventoryPort for SnapshotInventory {
    async fn snapshot(&self) -> AppResult<Inventory> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            AppError::not_found(format!(
                "cannot read inventory '{}': {err}",
                self.path.display()
            ))
        })?;
        let inventory = decode_inventory(&raw)
            .map_err(|err| err.with_context(self.path.display().to_string()))?;
        tracing::debug!(
            hosts = inventory.hosts.len(),
            host_components = inventory.host_components.len(),
            "loaded inventory snapshot"
        );
        Ok(inventory)
    }
}
