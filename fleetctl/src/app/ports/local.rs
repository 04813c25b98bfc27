// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use async_trait::async_trait;

use crate::app::errors::AppResult;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl LocalOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
/// Process execution on the control node itself.
pub trait LocalCommandPort: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> AppResult<LocalOutput>;
}

#[async_trait]
/// Fetches a URL into a local file.
pub trait DownloadPort: Send + Sync {
    async fn download(&self, url: &str, file: &Path) -> AppResult<u64>;
}
