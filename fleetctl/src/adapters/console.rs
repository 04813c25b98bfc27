// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io::Write;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::app::errors::AppError;
use crate::app::ports::HostOutputPort;
use crate::app::types::RemoteResult;

pub fn render_result(result: &RemoteResult) -> String {
    let mut out = format!(
        "{} (done: {}) - output:\n",
        result.address, result.completed
    );
    out.push_str(&result.stdout);
    if !result.stderr.is_empty() {
        out.push_str("std error:\n");
        out.push_str(&result.stderr);
    }
    out
}

pub fn render_failure(address: &str, error: &AppError) -> String {
    format!("{address} - failed: {error}\n")
}

/// Writes per-host blocks to stdout. Each block is written under one lock so
/// concurrent hosts never interleave.
#[derive(Default)]
pub struct ConsoleOutput {
    lock: Mutex<()>,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::default()
    }

    async fn emit(&self, block: &str) {
        let _guard = self.lock.lock().await;
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = stdout.write_all(block.as_bytes()).and_then(|_| stdout.flush()) {
            tracing::warn!("failed to write to stdout: {err}");
        }
    }
}

#[async_trait]
impl HostOutputPort for ConsoleOutput {
    async fn host_result(&self, result: &RemoteResult) {
        self.emit(&render_result(result)).await;
    }

    async fn host_failure(&self, address: &str, error: &AppError) {
        self.emit(&render_failure(address, error)).await;
    }

    async fn message(&self, text: &str) {
        self.emit(&format!("{text}\n")).await;
    }
}
