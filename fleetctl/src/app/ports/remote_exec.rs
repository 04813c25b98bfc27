// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::time::Duration;

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::{ConnectionProfile, RemoteResult};

#[async_trait]
/// Remote command execution on one host over a connection owned by the call.
/// A timeout is reported as `RemoteResult::completed == false`, never as `Err`.
pub trait RemoteExecPort: Send + Sync {
    async fn run(
        &self,
        profile: &ConnectionProfile,
        address: &str,
        command: &str,
        timeout: Duration,
    ) -> AppResult<RemoteResult>;
}
