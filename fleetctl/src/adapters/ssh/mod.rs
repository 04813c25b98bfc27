// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{FileTransferPort, LocalCommandPort, RemoteExecPort};
use crate::app::services::output::StreamLost;
use crate::app::types::{ConnectionProfile, RemoteResult};

mod error;
#[cfg(test)]
mod loopback;
mod session;

pub use error::{AuthenticationFailure, ProxyFailure};
pub use session::{HostKeyPolicy, HostSession, SessionSettings};

/// SSH-backed remote execution and file copy. Every call opens and closes its own session.
#[derive(Clone)]
pub struct SshAdapter {
    settings: SessionSettings,
    local: Arc<dyn LocalCommandPort>,
    scp_program: String,
}

impl SshAdapter {
    pub fn new(settings: SessionSettings, local: Arc<dyn LocalCommandPort>) -> Self {
        Self {
            settings,
            local,
            scp_program: "scp".to_string(),
        }
    }

    async fn connect(&self, profile: &ConnectionProfile, address: &str) -> AppResult<HostSession> {
        HostSession::connect(profile, address, &self.settings)
            .await
            .map_err(map_connect_error)
    }
}

fn ssh_error_code(err: &anyhow::Error) -> &'static str {
    if err.chain().any(|cause| cause.is::<AuthenticationFailure>()) {
        codes::AUTHENTICATION_FAILURE
    } else if err.chain().any(|cause| cause.is::<ProxyFailure>()) {
        codes::PROXY_FAILURE
    } else {
        codes::CONNECTION_FAILURE
    }
}

fn map_connect_error(err: anyhow::Error) -> AppError {
    AppError::with_message(
        AppErrorKind::Aborted,
        ssh_error_code(&err),
        format!("ssh connect failed: {err:#}"),
    )
}

fn map_exec_error(err: anyhow::Error) -> AppError {
    let code = if err.chain().any(|cause| cause.is::<StreamLost>()) {
        codes::CONNECTION_FAILURE
    } else {
        codes::REMOTE_ERROR
    };
    AppError::with_message(
        AppErrorKind::Aborted,
        code,
        format!("ssh exec failed: {err:#}"),
    )
}

fn map_transfer_error(err: anyhow::Error) -> AppError {
    AppError::with_message(
        AppErrorKind::Aborted,
        codes::TRANSFER_ERROR,
        format!("file transfer failed: {err:#}"),
    )
}

#[async_trait]
impl RemoteExecPort for SshAdapter {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, profile, command),
        fields(op = "run", host = %address, user = %profile.username, port = profile.port)
    )]
    async fn run(
        &self,
        profile: &ConnectionProfile,
        address: &str,
        command: &str,
        timeout: Duration,
    ) -> AppResult<RemoteResult> {
        let session = self.connect(profile, address).await?;
        session.run(command, timeout).await.map_err(map_exec_error)
    }
}

#[async_trait]
impl FileTransferPort for SshAdapter {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, profile, local_path),
        fields(op = "copy_to", host = %address, user = %profile.username)
    )]
    async fn copy_to(
        &self,
        profile: &ConnectionProfile,
        address: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> AppResult<()> {
        let session = self.connect(profile, address).await?;
        session
            .copy_to(local_path, remote_path)
            .await
            .map_err(map_transfer_error)
    }

    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, profile, local_dir),
        fields(op = "copy_from", host = %address, user = %profile.username)
    )]
    async fn copy_from(
        &self,
        profile: &ConnectionProfile,
        address: &str,
        remote_path: &str,
        local_dir: &Path,
    ) -> AppResult<()> {
        let strict = matches!(self.settings.host_keys, HostKeyPolicy::KnownHosts(_));
        let args = session::scp::pull_args(profile, address, remote_path, local_dir, strict);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.local.run(&self.scp_program, &args).await?;
        if out.success() {
            return Ok(());
        }
        Err(AppError::with_message(
            AppErrorKind::Aborted,
            codes::TRANSFER_ERROR,
            format!(
                "scp from {address}:{remote_path} failed ({}): {}",
                out.exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "killed".to_string()),
                out.stderr.trim()
            ),
        ))
    }
}
