// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::app::errors::{AppError, AppErrorKind, codes};
use crate::app::ports::{HostOutputPort, RemoteExecPort};
use crate::app::types::{ConnectionProfile, DispatchOutcome, TargetSet};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Fans one command out to every target at once and waits for all of them.
///
/// Each host runs in its own task with its own connection. A failing or slow host
/// never cancels its siblings; transport errors land in `DispatchOutcome::failures`
/// and are reported through the output port as they happen.
#[derive(Clone)]
pub struct RemoteExecutor {
    remote_exec: Arc<dyn RemoteExecPort>,
    output: Arc<dyn HostOutputPort>,
}

impl RemoteExecutor {
    pub fn new(remote_exec: Arc<dyn RemoteExecPort>, output: Arc<dyn HostOutputPort>) -> Self {
        Self {
            remote_exec,
            output,
        }
    }

    #[tracing::instrument(
        name = "dispatch",
        level = "debug",
        skip(self, targets, profile, command),
        fields(hosts = targets.len(), profile = %profile.name, timeout_secs = timeout.as_secs())
    )]
    pub async fn dispatch(
        &self,
        targets: &TargetSet,
        profile: &ConnectionProfile,
        command: &str,
        timeout: Duration,
    ) -> DispatchOutcome {
        let profile = Arc::new(profile.clone());
        let command: Arc<str> = Arc::from(command);
        let mut units = JoinSet::new();
        let mut addresses = HashMap::new();

        for address in targets.iter() {
            let remote_exec = Arc::clone(&self.remote_exec);
            let output = Arc::clone(&self.output);
            let profile = Arc::clone(&profile);
            let command = Arc::clone(&command);
            let host = address.to_string();
            let handle = units.spawn(async move {
                let res = remote_exec.run(&profile, &host, &command, timeout).await;
                match &res {
                    Ok(result) => output.host_result(result).await,
                    Err(err) => {
                        tracing::warn!(host = %host, code = err.code(), "remote command failed: {err}");
                        output.host_failure(&host, err).await;
                    }
                }
                (host, res)
            });
            addresses.insert(handle.id(), address.to_string());
        }

        let mut outcome = DispatchOutcome::default();
        while let Some(joined) = units.join_next_with_id().await {
            match joined {
                Ok((_, (host, Ok(result)))) => {
                    outcome.results.insert(host, result);
                }
                Ok((_, (host, Err(err)))) => {
                    outcome.failures.insert(host, err);
                }
                Err(join_err) => {
                    let host = addresses
                        .remove(&join_err.id())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    tracing::error!(host = %host, "remote unit aborted: {join_err}");
                    outcome.failures.insert(
                        host,
                        AppError::with_message(
                            AppErrorKind::Internal,
                            codes::INTERNAL_ERROR,
                            format!("remote unit aborted: {join_err}"),
                        ),
                    );
                }
            }
        }
        tracing::debug!(
            ok = outcome.results.len(),
            failed = outcome.failures.len(),
            "dispatch finished"
        );
        outcome
    }
}
