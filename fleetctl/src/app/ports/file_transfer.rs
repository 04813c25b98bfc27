// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::ConnectionProfile;

#[async_trait]
/// Single-file copy between the control node and one remote host.
/// Every call owns its own connection for its whole duration.
pub trait FileTransferPort: Send + Sync {
    async fn copy_to(
        &self,
        profile: &ConnectionProfile,
        address: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> AppResult<()>;

    async fn copy_from(
        &self,
        profile: &ConnectionProfile,
        address: &str,
        remote_path: &str,
        local_dir: &Path,
    ) -> AppResult<()>;
}
