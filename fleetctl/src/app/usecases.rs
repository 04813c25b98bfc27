// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{
    ClusterManagerPort, DownloadPort, FileTransferPort, HostOutputPort, InventoryPort,
    LocalCommandPort, ProfileStorePort, RemoteExecPort,
};
use crate::app::services::logs::plan_component_logs;
use crate::app::services::playbook::{self, PlaybookDeps, PlaybookRunner, TaskReport};
use crate::app::services::{
    LogCollector, LogDownload, LogRequest, RemoteExecutor, RemoteTransfer, resolve,
};
use crate::app::types::{
    ClusterConfigs, ClusterSettings, ConnectionProfile, DispatchOutcome, TargetFilter, TargetSet,
    TransferOutcome,
};

/// Collaborators the operations are built from.
pub struct Collaborators {
    pub inventory: Arc<dyn InventoryPort>,
    pub profiles: Arc<dyn ProfileStorePort>,
    pub remote_exec: Arc<dyn RemoteExecPort>,
    pub file_transfer: Arc<dyn FileTransferPort>,
    pub local: Arc<dyn LocalCommandPort>,
    pub downloads: Arc<dyn DownloadPort>,
    pub cluster_manager: Option<Arc<dyn ClusterManagerPort>>,
    pub output: Arc<dyn HostOutputPort>,
}

#[derive(Clone)]
pub struct UseCases {
    pub(crate) inventory: Arc<dyn InventoryPort>,
    pub(crate) profiles: Arc<dyn ProfileStorePort>,
    pub(crate) remote_exec: Arc<dyn RemoteExecPort>,
    pub(crate) local: Arc<dyn LocalCommandPort>,
    pub(crate) downloads: Arc<dyn DownloadPort>,
    pub(crate) cluster_manager: Option<Arc<dyn ClusterManagerPort>>,
    pub(crate) output: Arc<dyn HostOutputPort>,
    pub(crate) executor: RemoteExecutor,
    pub(crate) transfer: RemoteTransfer,
    pub(crate) cluster: ClusterSettings,
    pub(crate) default_profile: Option<String>,
}

impl UseCases {
    pub fn new(
        deps: Collaborators,
        cluster: ClusterSettings,
        default_profile: Option<String>,
    ) -> Self {
        let executor = RemoteExecutor::new(deps.remote_exec.clone(), deps.output.clone());
        let transfer = RemoteTransfer::new(
            deps.remote_exec.clone(),
            deps.file_transfer.clone(),
            deps.output.clone(),
        );
        Self {
            inventory: deps.inventory,
            profiles: deps.profiles,
            remote_exec: deps.remote_exec,
            local: deps.local,
            downloads: deps.downloads,
            cluster_manager: deps.cluster_manager,
            output: deps.output,
            executor,
            transfer,
            cluster,
            default_profile,
        }
    }

    /// Picks the named profile, the configured default, or the only one registered.
    pub async fn profile(&self, name: Option<&str>) -> AppResult<ConnectionProfile> {
        let name = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or(self.default_profile.as_deref());
        if let Some(name) = name {
            return self.profiles.get_profile(name).await;
        }
        let mut all = self.profiles.list_profiles().await?;
        match all.len() {
            1 => Ok(all.remove(0)),
            0 => Err(AppError::not_found(
                "no connection profiles configured; add a [[profiles]] entry",
            )),
            _ => Err(AppError::invalid_argument(
                "several connection profiles configured; pick one with --profile",
            )),
        }
    }

    pub async fn resolve_targets(&self, filter: &TargetFilter) -> AppResult<TargetSet> {
        let inventory = self.inventory.snapshot().await?;
        let targets = resolve(filter, &inventory, &self.cluster.host);
        tracing::debug!(hosts = targets.len(), "resolved target set");
        if targets.is_empty() {
            tracing::warn!("filter matched no hosts; nothing to do");
        }
        Ok(targets)
    }

    pub async fn run_command(
        &self,
        filter: &TargetFilter,
        profile: Option<&str>,
        command: &str,
        timeout: Duration,
    ) -> AppResult<DispatchOutcome> {
        if command.trim().is_empty() {
            return Err(AppError::missing_parameter("command is required"));
        }
        let profile = self.profile(profile).await?;
        let targets = self.resolve_targets(filter).await?;
        Ok(self
            .executor
            .dispatch(&targets, &profile, command, timeout)
            .await)
    }

    pub async fn upload(
        &self,
        filter: &TargetFilter,
        profile: Option<&str>,
        source: &Path,
        target: &str,
    ) -> AppResult<TransferOutcome> {
        let profile = self.profile(profile).await?;
        let targets = self.resolve_targets(filter).await?;
        self.transfer.push(&targets, &profile, source, target).await
    }

    pub async fn download(
        &self,
        filter: &TargetFilter,
        profile: Option<&str>,
        remote_path: &str,
        dest: &Path,
    ) -> AppResult<TransferOutcome> {
        let profile = self.profile(profile).await?;
        let targets = self.resolve_targets(filter).await?;
        Ok(self
            .transfer
            .pull_file(&targets, &profile, remote_path, dest)
            .await)
    }

    pub async fn download_dir(
        &self,
        filter: &TargetFilter,
        profile: Option<&str>,
        name: &str,
        remote_dir: &str,
        dest: &Path,
        timeout: Duration,
    ) -> AppResult<TransferOutcome> {
        let profile = self.profile(profile).await?;
        let targets = self.resolve_targets(filter).await?;
        self.transfer
            .pull_archive(&targets, &profile, name, remote_dir, dest, timeout)
            .await
    }

    /// Server logs when the control host is requested; per-component logs when services or
    /// components are named and their log directories are known; agent logs otherwise.
    pub async fn download_logs(
        &self,
        filter: &TargetFilter,
        profile: Option<&str>,
        dest: &Path,
        timeout: Duration,
    ) -> AppResult<Vec<LogDownload>> {
        let profile = self.profile(profile).await?;
        let at = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let cluster = if self.cluster.name.is_empty() {
            "cluster"
        } else {
            self.cluster.name.as_str()
        };
        let request = LogRequest {
            cluster,
            server: filter.include_control_host,
            dest,
            timeout,
            at,
        };
        let collector = LogCollector::new(self.remote_exec.clone(), self.transfer.clone());

        if !filter.include_control_host
            && (!filter.services.is_empty() || !filter.components.is_empty())
        {
            let configs = match &self.cluster_manager {
                Some(manager) => manager.configurations().await?,
                None => ClusterConfigs::new(),
            };
            let inventory = self.inventory.snapshot().await?;
            let plan = plan_component_logs(filter, &inventory, &configs);
            if !plan.is_empty() {
                return collector.download_components(&plan, &profile, request).await;
            }
            tracing::warn!("no component log directories known for the filter; collecting agent logs");
        }

        let targets = self.resolve_targets(filter).await?;
        Ok(vec![collector.download(&targets, &profile, request).await?])
    }

    pub async fn run_playbook(
        &self,
        path: &Path,
        profile: Option<&str>,
        timeout: Duration,
    ) -> AppResult<Vec<TaskReport>> {
        let doc = playbook::load_playbook(path).await?;
        let profile = self.profile(profile).await?;
        let runner = PlaybookRunner::new(
            PlaybookDeps {
                inventory: self.inventory.clone(),
                executor: self.executor.clone(),
                transfer: self.transfer.clone(),
                local: self.local.clone(),
                downloads: self.downloads.clone(),
                cluster_manager: self.cluster_manager.clone(),
                output: self.output.clone(),
            },
            self.cluster.clone(),
        );
        runner.run(&doc, &profile, timeout).await
    }
}
