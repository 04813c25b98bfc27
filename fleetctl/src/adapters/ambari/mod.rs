// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{ClusterManagerPort, InventoryPort};
use crate::app::types::{
    ClusterAction, ClusterConfigs, ClusterSettings, HostComponentRecord, HostRecord, Inventory,
};

const REQUEST_POLL_INTERVAL: Duration = Duration::from_secs(2);
const REQUEST_WAIT_LIMIT: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HostItem {
    #[serde(rename = "Hosts")]
    hosts: HostFields,
}

#[derive(Debug, Deserialize)]
struct HostFields {
    #[serde(default)]
    host_name: String,
    #[serde(default)]
    public_host_name: Option<String>,
    #[serde(default)]
    ip: String,
    #[serde(default)]
    host_state: String,
}

#[derive(Debug, Deserialize)]
struct HostComponentItem {
    #[serde(rename = "HostRoles")]
    roles: HostRoles,
}

#[derive(Debug, Deserialize)]
struct HostRoles {
    component_name: String,
    #[serde(default)]
    service_name: String,
    host_name: String,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct RequestAccepted {
    #[serde(rename = "Requests")]
    requests: RequestRef,
}

#[derive(Debug, Deserialize)]
struct RequestRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RequestStatus {
    #[serde(rename = "Requests")]
    requests: RequestState,
}

#[derive(Debug, Deserialize)]
struct RequestState {
    request_status: String,
}

fn decode_hosts(raw: &str) -> serde_json::Result<Vec<HostRecord>> {
    let items: Items<HostItem> = serde_json::from_str(raw)?;
    Ok(items
        .items
        .into_iter()
        .map(|item| {
            let fields = item.hosts;
            HostRecord {
                public_host_name: fields
                    .public_host_name
                    .filter(|name| !name.is_empty())
                    .unwrap_or(fields.host_name),
                ip: fields.ip,
                host_state: fields.host_state,
            }
        })
        .collect())
}

fn decode_host_components(raw: &str) -> serde_json::Result<Vec<HostComponentRecord>> {
    let items: Items<HostComponentItem> = serde_json::from_str(raw)?;
    Ok(items
        .items
        .into_iter()
        .map(|item| HostComponentRecord {
            component_name: item.roles.component_name,
            service_name: item.roles.service_name,
            host_name: item.roles.host_name,
            state: item.roles.state,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct Blueprint {
    #[serde(default)]
    configurations: Vec<BTreeMap<String, BlueprintConfig>>,
}

#[derive(Debug, Deserialize)]
struct BlueprintConfig {
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

/// Flattens the blueprint's `configurations` list. Non-string values keep their JSON text.
fn decode_blueprint_configs(raw: &str) -> serde_json::Result<ClusterConfigs> {
    let blueprint: Blueprint = serde_json::from_str(raw)?;
    let mut configs = ClusterConfigs::new();
    for entry in blueprint.configurations {
        for (config_type, config) in entry {
            let props = configs.entry(config_type).or_default();
            for (key, value) in config.properties {
                let value = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                props.insert(key, value);
            }
        }
    }
    Ok(configs)
}

/// Target state the cluster manager understands; stopped components are "INSTALLED".
fn desired_state(action: ClusterAction) -> &'static str {
    match action {
        ClusterAction::Start => "STARTED",
        ClusterAction::Stop | ClusterAction::Restart => "INSTALLED",
    }
}

fn state_body(root: &str, subject: &str, action: ClusterAction) -> serde_json::Value {
    let verb = match action {
        ClusterAction::Start => "Start",
        _ => "Stop",
    };
    json!({
        "RequestInfo": { "context": format!("{verb} {subject} (fleetctl)") },
        "Body": { root: { "state": desired_state(action) } },
    })
}

fn is_finished(status: &str) -> Option<bool> {
    match status {
        "COMPLETED" => Some(true),
        "FAILED" | "ABORTED" | "TIMEDOUT" | "SKIPPED_FAILED" => Some(false),
        _ => None,
    }
}

fn http_error(message: impl Into<String>) -> AppError {
    AppError::with_message(AppErrorKind::Aborted, codes::HTTP_ERROR, message)
}

/// Client for the cluster manager's REST API.
#[derive(Clone)]
pub struct AmbariApi {
    client: reqwest::Client,
    base: String,
    cluster: String,
    username: String,
    password: String,
}

impl AmbariApi {
    pub fn new(settings: &ClusterSettings, timeout: Duration) -> AppResult<Self> {
        if settings.host.trim().is_empty() || settings.name.trim().is_empty() {
            return Err(AppError::missing_parameter(
                "cluster.host and cluster.name are required for the REST API",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| http_error(format!("failed to create HTTP client: {err}")))?;
        Ok(Self {
            client,
            base: format!(
                "{}://{}:{}/api/v1/clusters/{}",
                settings.protocol(),
                settings.host.trim(),
                settings.port(),
                settings.name.trim()
            ),
            cluster: settings.name.trim().to_string(),
            username: settings.username.clone().unwrap_or_else(|| "admin".into()),
            password: settings.password.clone().unwrap_or_else(|| "admin".into()),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('?') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        }
    }

    async fn get_text(&self, path: &str) -> AppResult<String> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("X-Requested-By", "ambari")
            .send()
            .await
            .map_err(|err| http_error(format!("GET {url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(format!("GET {url}: HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|err| http_error(format!("GET {url}: {err}")))
    }

    async fn put_state(&self, path: &str, body: serde_json::Value) -> AppResult<()> {
        let url = self.url(path);
        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("X-Requested-By", "ambari")
            .json(&body)
            .send()
            .await
            .map_err(|err| http_error(format!("PUT {url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(http_error(format!("PUT {url}: HTTP {status} {}", text.trim())));
        }
        // 200 with an empty body means nothing had to change.
        let text = response.text().await.unwrap_or_default();
        if text.trim().is_empty() {
            return Ok(());
        }
        let accepted: RequestAccepted = serde_json::from_str(&text)
            .map_err(|err| http_error(format!("PUT {url}: unexpected response: {err}")))?;
        self.wait_for_request(accepted.requests.id).await
    }

    async fn wait_for_request(&self, id: u64) -> AppResult<()> {
        let path = format!("requests/{id}?fields=Requests/request_status");
        let deadline = tokio::time::Instant::now() + REQUEST_WAIT_LIMIT;
        loop {
            let raw = self.get_text(&path).await?;
            let status: RequestStatus = serde_json::from_str(&raw)
                .map_err(|err| http_error(format!("request {id}: unexpected response: {err}")))?;
            match is_finished(&status.requests.request_status) {
                Some(true) => return Ok(()),
                Some(false) => {
                    return Err(http_error(format!(
                        "request {id} in cluster {} ended with {}",
                        self.cluster, status.requests.request_status
                    )));
                }
                None => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AppError::with_message(
                    AppErrorKind::Timeout,
                    codes::HTTP_ERROR,
                    format!("request {id} did not finish in time"),
                ));
            }
            tokio::time::sleep(REQUEST_POLL_INTERVAL).await;
        }
    }

    async fn apply(&self, path: &str, root: &str, subject: &str, action: ClusterAction) -> AppResult<()> {
        tracing::info!(subject, action = action.as_str(), "changing cluster state");
        self.put_state(path, state_body(root, subject, action)).await?;
        if action == ClusterAction::Restart {
            self.put_state(path, state_body(root, subject, ClusterAction::Start))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryPort for AmbariApi {
    #[tracing::instrument(name = "ambari", level = "debug", skip(self), fields(op = "snapshot", cluster = %self.cluster))]
    async fn snapshot(&self) -> AppResult<Inventory> {
        let hosts = self
            .get_text("hosts?fields=Hosts/host_name,Hosts/public_host_name,Hosts/ip,Hosts/host_state")
            .await?;
        let host_components = self
            .get_text("host_components?fields=HostRoles/component_name,HostRoles/service_name,HostRoles/host_name,HostRoles/state")
            .await?;
        Ok(Inventory {
            hosts: decode_hosts(&hosts)
                .map_err(|err| http_error(format!("cannot decode hosts: {err}")))?,
            host_components: decode_host_components(&host_components)
                .map_err(|err| http_error(format!("cannot decode host components: {err}")))?,
        })
    }
}

#[async_trait]
impl ClusterManagerPort for AmbariApi {
    async fn set_service_state(&self, service: &str, action: ClusterAction) -> AppResult<()> {
        self.apply(&format!("services/{service}"), "ServiceInfo", service, action)
            .await
    }

    async fn set_component_state(&self, component: &str, action: ClusterAction) -> AppResult<()> {
        self.apply(
            &format!("host_components?HostRoles/component_name={component}"),
            "HostRoles",
            component,
            action,
        )
        .await
    }

    #[tracing::instrument(name = "ambari", level = "debug", skip(self), fields(op = "configurations", cluster = %self.cluster))]
    async fn configurations(&self) -> AppResult<ClusterConfigs> {
        let raw = self.get_text("?format=blueprint").await?;
        decode_blueprint_configs(&raw)
            .map_err(|err| http_error(format!("cannot decode blueprint: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hosts_falling_back_to_host_name() {
        let raw = r#"{"href": "x", "items": [
            {"Hosts": {"host_name": "c7401", "public_host_name": "c7401.example", "ip": "10.0.0.1", "host_state": "HEALTHY"}},
            {"Hosts": {"host_name": "c7402", "ip": "10.0.0.2", "host_state": "HEARTBEAT_LOST"}}
        ]}"#;
        let hosts = decode_hosts(raw).unwrap();
        assert_eq!(hosts[0].public_host_name, "c7401.example");
        assert_eq!(hosts[1].public_host_name, "c7402");
        assert_eq!(hosts[1].host_state, "HEARTBEAT_LOST");
    }

    #[test]
    fn decodes_host_components() {
        let raw = r#"{"items": [
            {"HostRoles": {"cluster_name": "hdp", "component_name": "DATANODE", "service_name": "HDFS", "host_name": "c7401", "state": "STARTED"}}
        ]}"#;
        let hcs = decode_host_components(raw).unwrap();
        assert_eq!(hcs.len(), 1);
        assert_eq!(hcs[0].service_name, "HDFS");
        assert!(decode_host_components(r#"{"items": [{}]}"#).is_err());
    }

    #[test]
    fn blueprint_configurations_are_flattened_by_type() {
        let raw = r#"{
            "Blueprints": {"stack_name": "HDP", "stack_version": "2.6"},
            "configurations": [
                {"hadoop-env": {"properties": {"hdfs_log_dir_prefix": "/var/log/hadoop", "namenode_heapsize": 1024}}},
                {"yarn-env": {"properties_attributes": {}, "properties": {"yarn_log_dir_prefix": "/var/log/hadoop-yarn"}}},
                {"cluster-env": {}}
            ],
            "host_groups": []
        }"#;
        let configs = decode_blueprint_configs(raw).unwrap();
        assert_eq!(configs["hadoop-env"]["hdfs_log_dir_prefix"], "/var/log/hadoop");
        assert_eq!(configs["hadoop-env"]["namenode_heapsize"], "1024");
        assert_eq!(configs["yarn-env"]["yarn_log_dir_prefix"], "/var/log/hadoop-yarn");
        assert!(configs["cluster-env"].is_empty());
        assert!(decode_blueprint_configs(r#"{"host_groups": []}"#).unwrap().is_empty());
    }

    #[test]
    fn state_body_maps_actions_to_target_states() {
        let body = state_body("ServiceInfo", "HDFS", ClusterAction::Stop);
        assert_eq!(body["Body"]["ServiceInfo"]["state"], "INSTALLED");
        assert_eq!(body["RequestInfo"]["context"], "Stop HDFS (fleetctl)");
        let body = state_body("HostRoles", "DATANODE", ClusterAction::Start);
        assert_eq!(body["Body"]["HostRoles"]["state"], "STARTED");
    }

    #[test]
    fn request_status_terminal_states() {
        assert_eq!(is_finished("COMPLETED"), Some(true));
        assert_eq!(is_finished("FAILED"), Some(false));
        assert_eq!(is_finished("IN_PROGRESS"), None);
    }

    #[test]
    fn base_url_uses_protocol_port_and_cluster() {
        let api = AmbariApi::new(
            &ClusterSettings {
                name: "hdp".into(),
                host: "c7401.example".into(),
                port: None,
                protocol: Some("https".into()),
                username: None,
                password: None,
            },
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            api.url("hosts"),
            "https://c7401.example:8080/api/v1/clusters/hdp/hosts"
        );
        assert_eq!(
            api.url("?format=blueprint"),
            "https://c7401.example:8080/api/v1/clusters/hdp?format=blueprint"
        );
        assert!(AmbariApi::new(&ClusterSettings::default(), Duration::from_secs(5)).is_err());
    }
}
