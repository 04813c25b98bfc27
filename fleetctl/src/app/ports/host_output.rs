// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppError;
use crate::app::types::RemoteResult;

#[async_trait]
/// Sink for per-host outcomes as they complete, before the join barrier releases the caller.
pub trait HostOutputPort: Send + Sync {
    async fn host_result(&self, result: &RemoteResult);
    async fn host_failure(&self, address: &str, error: &AppError);
    async fn message(&self, text: &str);
}

#[derive(Clone, Copy, Default)]
pub struct NoopHostOutput;

#[async_trait]
impl HostOutputPort for NoopHostOutput {
    async fn host_result(&self, _result: &RemoteResult) {}
    async fn host_failure(&self, _address: &str, _error: &AppError) {}
    async fn message(&self, _text: &str) {}
}
