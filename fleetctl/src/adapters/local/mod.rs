// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{DownloadPort, LocalCommandPort, LocalOutput};

/// Runs local programs with tokio, killing them when the timeout fires.
#[derive(Clone, Debug)]
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_inner(&self, program: &str, args: &[&str]) -> Result<LocalOutput> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stdout_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                    async {
                        let mut buf = Vec::new();
                        if let Some(ref mut h) = stderr_handle {
                            let _ = h.read_to_end(&mut buf).await;
                        }
                        buf
                    },
                );
                let status = status.with_context(|| format!("waiting for {program}"))?;
                Ok(LocalOutput {
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    exit_code: status.code(),
                })
            } => result,
            () = tokio::time::sleep(self.timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", self.timeout.as_secs())
            }
        }
    }
}

#[async_trait]
impl LocalCommandPort for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> AppResult<LocalOutput> {
        tracing::debug!(program, ?args, "running local command");
        self.run_inner(program, args).await.map_err(|err| {
            AppError::with_message(
                AppErrorKind::Aborted,
                codes::LOCAL_ERROR,
                format!("{err:#}"),
            )
        })
    }
}

/// Streams HTTP(S) downloads straight to disk.
#[derive(Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("fleetctl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                AppError::with_message(
                    AppErrorKind::Internal,
                    codes::HTTP_ERROR,
                    format!("failed to create HTTP client: {err}"),
                )
            })?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str, file: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let mut out = tokio::fs::File::create(file)
            .await
            .with_context(|| format!("create {}", file.display()))?;
        let mut written = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.with_context(|| format!("read body of {url}"))?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl DownloadPort for HttpDownloader {
    #[tracing::instrument(name = "download", level = "debug", skip(self, file), fields(file = %file.display()))]
    async fn download(&self, url: &str, file: &Path) -> AppResult<u64> {
        self.fetch(url, file).await.map_err(|err| {
            AppError::with_message(AppErrorKind::Aborted, codes::HTTP_ERROR, format!("{err:#}"))
        })
    }
}
