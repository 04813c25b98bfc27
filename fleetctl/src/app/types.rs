// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::app::errors::AppError;

pub const DEFAULT_SSH_PORT: u16 = 22;

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// SSH identity used to reach every host of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Jump host; the same credentials are used for both hops.
    #[serde(default)]
    pub proxy_address: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ConnectionProfile {
    pub fn proxy(&self) -> Option<&str> {
        self.proxy_address
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Agent host as reported by the cluster manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    #[serde(alias = "public_hostname")]
    pub public_host_name: String,
    pub ip: String,
    #[serde(default, alias = "state")]
    pub host_state: String,
}

/// Placement of one component of one service on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostComponentRecord {
    pub component_name: String,
    pub service_name: String,
    pub host_name: String,
    #[serde(default)]
    pub state: String,
}

/// Decoded inventory snapshot used for one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub hosts: Vec<HostRecord>,
    #[serde(default)]
    pub host_components: Vec<HostComponentRecord>,
}

impl Inventory {
    pub fn components_of_service<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a str> {
        self.host_components
            .iter()
            .filter(move |hc| hc.service_name == service)
            .map(|hc| hc.component_name.as_str())
    }
}

/// Effective cluster configuration: config type to property to value.
pub type ClusterConfigs = BTreeMap<String, BTreeMap<String, String>>;

/// Declarative host selection. An empty filter selects every known host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    pub services: BTreeSet<String>,
    pub components: BTreeSet<String>,
    pub hosts: BTreeSet<String>,
    pub include_control_host: bool,
}

fn split_csv(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl TargetFilter {
    pub fn from_csv(
        services: Option<&str>,
        components: Option<&str>,
        hosts: Option<&str>,
        include_control_host: bool,
    ) -> Self {
        Self {
            services: split_csv(services),
            components: split_csv(components),
            hosts: split_csv(hosts),
            include_control_host,
        }
    }

    pub fn control_host() -> Self {
        Self {
            include_control_host: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
            && self.components.is_empty()
            && self.hosts.is_empty()
            && !self.include_control_host
    }
}

/// Deduplicated host addresses an operation acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet(BTreeSet<String>);

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: impl Into<String>) -> bool {
        self.0.insert(address.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TargetSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for TargetSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Output of one remote command on one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteResult {
    pub address: String,
    pub stdout: String,
    pub stderr: String,
    /// False when the local wait timed out before the command finished.
    pub completed: bool,
    pub exit_code: Option<u32>,
}

/// Aggregated fan-out result: successful hosts keyed by address, transport failures kept apart.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub results: HashMap<String, RemoteResult>,
    pub failures: HashMap<String, AppError>,
}

impl DispatchOutcome {
    pub fn timed_out(&self) -> impl Iterator<Item = &RemoteResult> {
        self.results.values().filter(|result| !result.completed)
    }
}

/// Per-host outcome of a push or pull.
#[derive(Debug, Default)]
pub struct TransferOutcome {
    pub succeeded: BTreeSet<String>,
    pub failures: HashMap<String, AppError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterAction {
    Start,
    Stop,
    Restart,
}

impl ClusterAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "START" => Some(Self::Start),
            "STOP" => Some(Self::Stop),
            "RESTART" => Some(Self::Restart),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Restart => "RESTART",
        }
    }
}

/// Cluster manager endpoint details needed by the config-update task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ClusterSettings {
    pub fn protocol(&self) -> &str {
        self.protocol.as_deref().unwrap_or("http")
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(8080)
    }
}

/// Playbook file as written by operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PlaybookDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<TaskDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub hosts: Option<String>,
    #[serde(default)]
    pub services: Option<String>,
    #[serde(default)]
    pub components: Option<String>,
    #[serde(default, alias = "ambari_server")]
    pub server: bool,
    #[serde(default, alias = "ambari_agent")]
    pub agent: bool,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_csv_trims_and_drops_empty_entries() {
        let filter = TargetFilter::from_csv(Some("HDFS, YARN,,"), None, Some(" c7401 "), true);
        assert_eq!(
            filter.services.iter().collect::<Vec<_>>(),
            vec!["HDFS", "YARN"]
        );
        assert!(filter.components.is_empty());
        assert!(filter.hosts.contains("c7401"));
        assert!(filter.include_control_host);
        assert!(!filter.is_empty());
        assert!(TargetFilter::from_csv(Some(""), None, None, false).is_empty());
    }

    #[test]
    fn blank_proxy_address_means_direct_connection() {
        let mut profile = ConnectionProfile {
            name: "vagrant".into(),
            username: "root".into(),
            key_path: None,
            port: 22,
            proxy_address: Some("  ".into()),
            password: None,
        };
        assert_eq!(profile.proxy(), None);
        profile.proxy_address = Some("jump.example.com".into());
        assert_eq!(profile.proxy(), Some("jump.example.com"));
    }

    #[test]
    fn cluster_action_parses_case_insensitively() {
        assert_eq!(ClusterAction::parse("restart"), Some(ClusterAction::Restart));
        assert_eq!(ClusterAction::parse("START"), Some(ClusterAction::Start));
        assert_eq!(ClusterAction::parse("reboot"), None);
    }

    #[test]
    fn task_document_accepts_legacy_flag_names() {
        let doc: TaskDocument = serde_yaml::from_str(
            "name: t\ntype: RemoteCommand\ncommand: uptime\nambari_server: true\nambari_agent: false\n",
        )
        .unwrap();
        assert!(doc.server);
        assert!(!doc.agent);
        assert_eq!(doc.kind, "RemoteCommand");
    }
}
