// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{
    ClusterManagerPort, DownloadPort, HostOutputPort, InventoryPort, LocalCommandPort, LocalOutput,
};
use crate::app::services::executor::RemoteExecutor;
use crate::app::services::resolver::resolve;
use crate::app::services::shell::{sh_escape, split_command};
use crate::app::services::transfer::RemoteTransfer;
use crate::app::types::{
    ClusterAction, ClusterSettings, ConnectionProfile, DispatchOutcome, PlaybookDocument,
    TargetFilter, TargetSet, TaskDocument, TransferOutcome,
};

const CONFIGS_SCRIPT: &str = "/var/lib/ambari-server/resources/scripts/configs.py";

pub fn parse_playbook(yaml: &str) -> AppResult<PlaybookDocument> {
    serde_yaml::from_str(yaml)
        .map_err(|err| AppError::invalid_argument(format!("invalid playbook: {err}")))
}

pub async fn load_playbook(path: &Path) -> AppResult<PlaybookDocument> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
        AppError::not_found(format!("cannot read playbook '{}': {err}", path.display()))
    })?;
    parse_playbook(&raw)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterScope {
    Components(Vec<String>),
    Services(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    RemoteCommand {
        command: String,
    },
    LocalCommand {
        command: String,
    },
    Download {
        url: String,
        file: PathBuf,
    },
    Upload {
        source: PathBuf,
        target: String,
    },
    ConfigUpdate {
        config_type: String,
        key: String,
        value: String,
    },
    ClusterCommand {
        action: ClusterAction,
        scope: ClusterScope,
    },
}

impl TaskAction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RemoteCommand { .. } => "RemoteCommand",
            Self::LocalCommand { .. } => "LocalCommand",
            Self::Download { .. } => "Download",
            Self::Upload { .. } => "Upload",
            Self::ConfigUpdate { .. } => "ConfigUpdate",
            Self::ClusterCommand { .. } => "ClusterCommand",
        }
    }
}

/// Where a task's hosts come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targeting {
    Filter(TargetFilter),
    /// Every agent in the inventory, bypassing resolution.
    AllAgents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub name: String,
    pub action: TaskAction,
    pub targeting: Targeting,
}

fn label(task: &TaskDocument) -> String {
    if task.name.is_empty() {
        "<unnamed>".to_string()
    } else {
        task.name.clone()
    }
}

fn required(
    params: &BTreeMap<String, String>,
    key: &str,
    kind: &str,
    task: &str,
) -> AppResult<String> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::missing_parameter(format!(
                "'{key}' parameter is required for '{kind}' task '{task}'"
            ))
        })
}

fn csv(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn plan_task(task: &TaskDocument) -> AppResult<PlannedTask> {
    let name = label(task);
    let kind = task.kind.trim();
    let command = task.command.trim();
    let params = &task.parameters;
    let require_command = |kind: &str| {
        if command.is_empty() {
            Err(AppError::missing_parameter(format!(
                "'command' is required for '{kind}' task '{name}'"
            )))
        } else {
            Ok(command.to_string())
        }
    };

    let action = match kind {
        "" => {
            return Err(AppError::missing_parameter(format!(
                "type field for task '{name}' is required"
            )));
        }
        "RemoteCommand" => TaskAction::RemoteCommand {
            command: require_command(kind)?,
        },
        "LocalCommand" => TaskAction::LocalCommand {
            command: require_command(kind)?,
        },
        "Download" => TaskAction::Download {
            url: required(params, "url", kind, &name)?,
            file: PathBuf::from(required(params, "file", kind, &name)?),
        },
        "Upload" => TaskAction::Upload {
            source: PathBuf::from(required(params, "source", kind, &name)?),
            target: required(params, "target", kind, &name)?,
        },
        "Config" | "ConfigUpdate" => TaskAction::ConfigUpdate {
            config_type: required(params, "config_type", kind, &name)?,
            key: required(params, "config_key", kind, &name)?,
            value: required(params, "config_value", kind, &name)?,
        },
        "AmbariCommand" | "ClusterCommand" => {
            let raw = require_command(kind)?;
            let action = ClusterAction::parse(&raw).ok_or_else(|| {
                AppError::invalid_argument(format!(
                    "unsupported cluster command '{raw}' in task '{name}' (expected START, STOP or RESTART)"
                ))
            })?;
            // Components win over services when both are given.
            let components = csv(task.components.as_deref());
            let services = csv(task.services.as_deref());
            let scope = if !components.is_empty() {
                ClusterScope::Components(components)
            } else if !services.is_empty() {
                ClusterScope::Services(services)
            } else {
                return Err(AppError::missing_parameter(format!(
                    "'services' or 'components' is required for '{kind}' task '{name}'"
                )));
            };
            TaskAction::ClusterCommand { action, scope }
        }
        other => {
            return Err(AppError::invalid_argument(format!(
                "unknown task type '{other}' in task '{name}'"
            )));
        }
    };

    let targeting = if task.agent {
        Targeting::AllAgents
    } else {
        Targeting::Filter(TargetFilter::from_csv(
            task.services.as_deref(),
            task.components.as_deref(),
            task.hosts.as_deref(),
            task.server,
        ))
    };
    Ok(PlannedTask {
        name,
        action,
        targeting,
    })
}

/// Validates every task of a playbook. The first invalid task fails the whole plan.
pub fn plan(doc: &PlaybookDocument) -> AppResult<Vec<PlannedTask>> {
    doc.tasks.iter().map(plan_task).collect()
}

/// Remote command that sets one configuration key through the cluster manager's script.
pub fn config_update_command(
    cluster: &ClusterSettings,
    config_type: &str,
    key: &str,
    value: &str,
) -> String {
    let note = format!("AMBARICTL - Update config key: {key}");
    format!(
        "{CONFIGS_SCRIPT} --action set -c {} -k {} -v {} -u {} -p {} --host={} --cluster={} --protocol={} -b {}",
        sh_escape(config_type),
        sh_escape(key),
        sh_escape(value),
        sh_escape(cluster.username.as_deref().unwrap_or("admin")),
        sh_escape(cluster.password.as_deref().unwrap_or("admin")),
        sh_escape(&cluster.host),
        sh_escape(&cluster.name),
        sh_escape(cluster.protocol()),
        sh_escape(&note),
    )
}

#[derive(Debug)]
pub enum TaskOutcome {
    Dispatched(DispatchOutcome),
    Transferred(TransferOutcome),
    Local(LocalOutput),
    Downloaded(u64),
    ClusterUpdated,
}

#[derive(Debug)]
pub struct TaskReport {
    pub name: String,
    pub kind: &'static str,
    pub outcome: TaskOutcome,
}

/// Runs playbook tasks strictly in document order.
pub struct PlaybookRunner {
    inventory: Arc<dyn InventoryPort>,
    executor: RemoteExecutor,
    transfer: RemoteTransfer,
    local: Arc<dyn LocalCommandPort>,
    downloads: Arc<dyn DownloadPort>,
    cluster_manager: Option<Arc<dyn ClusterManagerPort>>,
    output: Arc<dyn HostOutputPort>,
    cluster: ClusterSettings,
}

pub struct PlaybookDeps {
    pub inventory: Arc<dyn InventoryPort>,
    pub executor: RemoteExecutor,
    pub transfer: RemoteTransfer,
    pub local: Arc<dyn LocalCommandPort>,
    pub downloads: Arc<dyn DownloadPort>,
    pub cluster_manager: Option<Arc<dyn ClusterManagerPort>>,
    pub output: Arc<dyn HostOutputPort>,
}

impl PlaybookRunner {
    pub fn new(deps: PlaybookDeps, cluster: ClusterSettings) -> Self {
        Self {
            inventory: deps.inventory,
            executor: deps.executor,
            transfer: deps.transfer,
            local: deps.local,
            downloads: deps.downloads,
            cluster_manager: deps.cluster_manager,
            output: deps.output,
            cluster,
        }
    }

    fn check_collaborators(&self, tasks: &[PlannedTask]) -> AppResult<()> {
        for task in tasks {
            match &task.action {
                TaskAction::ClusterCommand { .. } if self.cluster_manager.is_none() => {
                    return Err(AppError::invalid_argument(format!(
                        "task '{}' needs a cluster manager endpoint; set [cluster] in the config",
                        task.name
                    )));
                }
                TaskAction::ConfigUpdate { .. }
                    if self.cluster.host.trim().is_empty() || self.cluster.name.trim().is_empty() =>
                {
                    return Err(AppError::missing_parameter(format!(
                        "task '{}' needs cluster.host and cluster.name",
                        task.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validates the whole playbook, then executes it.
    ///
    /// Configuration errors are reported before any task runs. Per-host failures stay
    /// inside each task's outcome; a failing local step, download or cluster call stops
    /// the run.
    #[tracing::instrument(name = "playbook", skip_all, fields(playbook = %doc.name))]
    pub async fn run(
        &self,
        doc: &PlaybookDocument,
        profile: &ConnectionProfile,
        timeout: Duration,
    ) -> AppResult<Vec<TaskReport>> {
        let tasks = plan(doc)?;
        self.check_collaborators(&tasks)?;
        self.output
            .message(&format!("[Executing playbook: {}]", doc.name))
            .await;

        let mut reports = Vec::with_capacity(tasks.len());
        for task in &tasks {
            tracing::info!(task = %task.name, kind = task.action.kind(), "running task");
            self.output
                .message(&format!("[Task: {} ({})]", task.name, task.action.kind()))
                .await;
            let outcome = self.run_task(task, profile, timeout).await?;
            reports.push(TaskReport {
                name: task.name.clone(),
                kind: task.action.kind(),
                outcome,
            });
        }
        Ok(reports)
    }

    async fn targets(&self, targeting: &Targeting) -> AppResult<TargetSet> {
        let inventory = self.inventory.snapshot().await?;
        let targets = match targeting {
            Targeting::AllAgents => inventory.hosts.iter().map(|h| h.ip.clone()).collect(),
            Targeting::Filter(filter) => resolve(filter, &inventory, &self.cluster.host),
        };
        if targets.is_empty() {
            tracing::warn!("task resolved to no hosts");
        }
        Ok(targets)
    }

    async fn run_task(
        &self,
        task: &PlannedTask,
        profile: &ConnectionProfile,
        timeout: Duration,
    ) -> AppResult<TaskOutcome> {
        match &task.action {
            TaskAction::RemoteCommand { command } => {
                let targets = self.targets(&task.targeting).await?;
                Ok(TaskOutcome::Dispatched(
                    self.executor
                        .dispatch(&targets, profile, command, timeout)
                        .await,
                ))
            }
            TaskAction::Upload { source, target } => {
                let targets = self.targets(&task.targeting).await?;
                Ok(TaskOutcome::Transferred(
                    self.transfer.push(&targets, profile, source, target).await?,
                ))
            }
            TaskAction::ConfigUpdate {
                config_type,
                key,
                value,
            } => {
                let targets = self
                    .targets(&Targeting::Filter(TargetFilter::control_host()))
                    .await?;
                let command = config_update_command(&self.cluster, config_type, key, value);
                Ok(TaskOutcome::Dispatched(
                    self.executor
                        .dispatch(&targets, profile, &command, timeout)
                        .await,
                ))
            }
            TaskAction::LocalCommand { command } => {
                let (program, args) = split_command(command).ok_or_else(|| {
                    AppError::missing_parameter(format!("task '{}' has an empty command", task.name))
                })?;
                self.output
                    .message(&format!("Execute local command: {command}"))
                    .await;
                let out = self.local.run(program, &args).await?;
                self.output
                    .message(&format!("out:\n{}\nerr:\n{}", out.stdout, out.stderr))
                    .await;
                if !out.success() {
                    return Err(AppError::with_message(
                        AppErrorKind::Aborted,
                        codes::LOCAL_ERROR,
                        format!(
                            "local command '{command}' exited with {}",
                            out.exit_code
                                .map(|code| code.to_string())
                                .unwrap_or_else(|| "a signal".to_string())
                        ),
                    ));
                }
                Ok(TaskOutcome::Local(out))
            }
            TaskAction::Download { url, file } => {
                let bytes = self.downloads.download(url, file).await?;
                tracing::info!(url = %url, file = %file.display(), bytes, "downloaded");
                Ok(TaskOutcome::Downloaded(bytes))
            }
            TaskAction::ClusterCommand { action, scope } => {
                let manager = self.cluster_manager.as_ref().ok_or_else(|| {
                    AppError::invalid_argument("no cluster manager endpoint configured")
                })?;
                match scope {
                    ClusterScope::Components(components) => {
                        for component in components {
                            manager.set_component_state(component, *action).await?;
                        }
                    }
                    ClusterScope::Services(services) => {
                        for service in services {
                            manager.set_service_state(service, *action).await?;
                        }
                    }
                }
                Ok(TaskOutcome::ClusterUpdated)
            }
        }
    }
}
