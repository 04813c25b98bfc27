// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::Inventory;

#[async_trait]
/// Source of already-decoded host and host-component records.
pub trait InventoryPort: Send + Sync {
    async fn snapshot(&self) -> AppResult<Inventory>;
}
