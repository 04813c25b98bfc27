// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{FileTransferPort, HostOutputPort, RemoteExecPort};
use crate::app::services::shell::sh_escape;
use crate::app::types::{ConnectionProfile, TargetSet, TransferOutcome};

/// Remote scratch location for directory archives.
pub fn archive_path(name: &str) -> String {
    format!("/tmp/{name}.tar.gz")
}

pub fn archive_command(remote_dir: &str, name: &str) -> String {
    format!(
        "cd {} && tar -czf {} *",
        sh_escape(remote_dir),
        sh_escape(&archive_path(name))
    )
}

fn validate_archive_name(name: &str) -> AppResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::missing_parameter("archive name is required"));
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(AppError::invalid_argument(format!(
            "archive name '{name}' must be a plain file name"
        )));
    }
    Ok(())
}

/// Moves files between the control node and every host of a target set.
#[derive(Clone)]
pub struct RemoteTransfer {
    remote_exec: Arc<dyn RemoteExecPort>,
    files: Arc<dyn FileTransferPort>,
    output: Arc<dyn HostOutputPort>,
}

impl RemoteTransfer {
    pub fn new(
        remote_exec: Arc<dyn RemoteExecPort>,
        files: Arc<dyn FileTransferPort>,
        output: Arc<dyn HostOutputPort>,
    ) -> Self {
        Self {
            remote_exec,
            files,
            output,
        }
    }

    /// Copies one local file to `remote_path` on every target.
    pub async fn push(
        &self,
        targets: &TargetSet,
        profile: &ConnectionProfile,
        local_path: &Path,
        remote_path: &str,
    ) -> AppResult<TransferOutcome> {
        let meta = tokio::fs::metadata(local_path).await.map_err(|err| {
            AppError::not_found(format!(
                "local file '{}' not readable: {err}",
                local_path.display()
            ))
        })?;
        if !meta.is_file() {
            return Err(AppError::invalid_argument(format!(
                "'{}' is not a regular file",
                local_path.display()
            )));
        }

        let profile = Arc::new(profile.clone());
        let local_path: Arc<Path> = Arc::from(local_path);
        let remote_path: Arc<str> = Arc::from(remote_path);
        let files = Arc::clone(&self.files);
        Ok(self
            .fan_out(targets, "push", move |host| {
                let files = Arc::clone(&files);
                let profile = Arc::clone(&profile);
                let local_path = Arc::clone(&local_path);
                let remote_path = Arc::clone(&remote_path);
                async move {
                    files
                        .copy_to(&profile, &host, &local_path, &remote_path)
                        .await
                }
            })
            .await)
    }

    /// Pulls one remote file from every target into `<dest>/<host>/`.
    pub async fn pull_file(
        &self,
        targets: &TargetSet,
        profile: &ConnectionProfile,
        remote_path: &str,
        dest: &Path,
    ) -> TransferOutcome {
        let profile = Arc::new(profile.clone());
        let remote_path: Arc<str> = Arc::from(remote_path);
        let dest: Arc<Path> = Arc::from(dest);
        let files = Arc::clone(&self.files);
        self.fan_out(targets, "pull", move |host| {
            let files = Arc::clone(&files);
            let profile = Arc::clone(&profile);
            let remote_path = Arc::clone(&remote_path);
            let dest = Arc::clone(&dest);
            async move {
                let host_dir = host_dir(&dest, &host).await?;
                files
                    .copy_from(&profile, &host, &remote_path, &host_dir)
                    .await
            }
        })
        .await
    }

    /// Archives `remote_dir` on every target and pulls the archive into `<dest>/<host>/`.
    pub async fn pull_archive(
        &self,
        targets: &TargetSet,
        profile: &ConnectionProfile,
        name: &str,
        remote_dir: &str,
        dest: &Path,
        timeout: Duration,
    ) -> AppResult<TransferOutcome> {
        validate_archive_name(name)?;
        if remote_dir.trim().is_empty() {
            return Err(AppError::missing_parameter("remote directory is required"));
        }

        let profile = Arc::new(profile.clone());
        let command: Arc<str> = Arc::from(archive_command(remote_dir, name.trim()));
        let archive: Arc<str> = Arc::from(archive_path(name.trim()));
        let dest: Arc<Path> = Arc::from(dest);
        let files = Arc::clone(&self.files);
        let remote_exec = Arc::clone(&self.remote_exec);
        Ok(self
            .fan_out(targets, "pull_archive", move |host| {
                let files = Arc::clone(&files);
                let remote_exec = Arc::clone(&remote_exec);
                let profile = Arc::clone(&profile);
                let command = Arc::clone(&command);
                let archive = Arc::clone(&archive);
                let dest = Arc::clone(&dest);
                async move {
                    let res = remote_exec.run(&profile, &host, &command, timeout).await?;
                    if !res.completed {
                        return Err(AppError::with_message(
                            AppErrorKind::Timeout,
                            codes::REMOTE_ERROR,
                            format!("archiving on {host} timed out"),
                        ));
                    }
                    match res.exit_code {
                        Some(0) => {}
                        Some(code) => {
                            return Err(AppError::with_message(
                                AppErrorKind::Aborted,
                                codes::REMOTE_ERROR,
                                format!("tar exited with {code}: {}", res.stderr.trim()),
                            ));
                        }
                        None => {
                            return Err(AppError::with_message(
                                AppErrorKind::Aborted,
                                codes::REMOTE_ERROR,
                                format!("tar on {host} ended without an exit status"),
                            ));
                        }
                    }
                    let host_dir = host_dir(&dest, &host).await?;
                    files.copy_from(&profile, &host, &archive, &host_dir).await
                }
            })
            .await)
    }

    async fn fan_out<F, Fut>(&self, targets: &TargetSet, op: &'static str, unit: F) -> TransferOutcome
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        let mut units = JoinSet::new();
        for address in targets.iter() {
            let host = address.to_string();
            let work = unit(host.clone());
            units.spawn(async move { (host, work.await) });
        }

        let mut outcome = TransferOutcome::default();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((host, Ok(()))) => {
                    tracing::debug!(op, host = %host, "transfer finished");
                    outcome.succeeded.insert(host);
                }
                Ok((host, Err(err))) => {
                    tracing::warn!(op, host = %host, code = err.code(), "transfer failed: {err}");
                    self.output.host_failure(&host, &err).await;
                    outcome.failures.insert(host, err);
                }
                Err(join_err) => {
                    tracing::error!(op, "transfer unit aborted: {join_err}");
                }
            }
        }
        outcome
    }
}

async fn host_dir(dest: &Path, host: &str) -> AppResult<PathBuf> {
    let dir = dest.join(host);
    tokio::fs::create_dir_all(&dir).await.map_err(|err| {
        AppError::with_message(
            AppErrorKind::Internal,
            codes::LOCAL_ERROR,
            format!("cannot create '{}': {err}", dir.display()),
        )
    })?;
    Ok(dir)
}
