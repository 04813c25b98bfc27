// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use time::macros::format_description;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::RemoteExecPort;
use crate::app::services::properties::parse_properties;
use crate::app::services::resolver::resolve;
use crate::app::services::transfer::RemoteTransfer;
use crate::app::types::{
    ClusterConfigs, ConnectionProfile, Inventory, TargetFilter, TargetSet, TransferOutcome,
};

pub const SERVER_COMPONENT: &str = "ambari-server";
pub const AGENT_COMPONENT: &str = "ambari-agent";
pub const DEFAULT_SERVER_LOG_DIR: &str = "/var/log/ambari-server";
pub const DEFAULT_AGENT_LOG_DIR: &str = "/var/log/ambari-agent";

const SERVER_LOG_PROBE: &str =
    "cat /etc/ambari-server/conf/log4j.properties | grep ambari.root.dir";
const AGENT_LOG_PROBE: &str = "cat /etc/ambari-agent/conf/ambari-agent.ini | grep logdir";

/// (service, component, config type, property holding the component's log directory)
const COMPONENT_LOG_DIRS: &[(&str, &str, &str, &str)] = &[
    ("ZOOKEEPER", "ZOOKEEPER_SERVER", "zookeeper-env", "zk_log_dir"),
    ("ZOOKEEPER", "ZOOKEEPER_CLIENT", "zookeeper-env", "zk_log_dir"),
    ("AMBARI_INFRA_SOLR", "INFRA_SOLR", "infra-solr-env", "infra_solr_log_dir"),
    ("AMBARI_INFRA_SOLR", "INFRA_SOLR_CLIENT", "infra-solr-client-log4j", "infra_solr_client_log_dir"),
    ("LOGSEARCH", "LOGSEARCH_SERVER", "logsearch-env", "logsearch_log_dir"),
    ("LOGSEARCH", "LOGSEARCH_LOGFEEDER", "logfeeder-env", "logfeeder_log_dir"),
    ("ACCUMULO", "ACCUMULO_MASTER", "accumulo-env", "accumulo_log_dir"),
    ("AMBARI_METRICS", "METRICS_COLLECTOR", "ams-env", "metrics_collector_log_dir"),
    ("AMBARI_METRICS", "METRICS_MONITOR", "ams-env", "metrics_monitor_log_dir"),
    ("AMBARI_METRICS", "METRICS_GRAFANA", "ams-grafana-env", "metrics_grafana_log_dir"),
    ("ATLAS", "ATLAS_MASTER", "atlas-env", "metadata_log_dir"),
    ("DRUID", "DRUID_BROKER", "druid-env", "druid_log_dir"),
    ("HBASE", "HBASE_MASTER", "hbase-env", "hbase_log_dir"),
    ("HBASE", "HBASE_REGIONSERVER", "hbase-env", "hbase_log_dir"),
    ("HDFS", "NAMENODE", "hadoop-env", "hdfs_log_dir_prefix"),
    ("HDFS", "DATANODE", "hadoop-env", "hdfs_log_dir_prefix"),
    ("HIVE", "HIVE_METASTORE", "hive-env", "hive_log_dir"),
    ("HIVE", "HIVE_SERVER", "hive-env", "hive_log_dir"),
    ("HIVE", "HIVE_SERVER_INTERACTIVE", "hive-env", "hive_log_dir"),
    ("KAFKA", "KAFKA_BROKER", "kafka-env", "kafka_log_dir"),
    ("OOZIE", "OOZIE_SERVER", "oozie-env", "oozie_log_dir"),
    ("RANGER", "RANGER_ADMIN", "ranger-env", "ranger_admin_log_dir"),
    ("RANGER", "RANGER_USERSYNC", "ranger-env", "ranger_usersync_log_dir"),
    ("RANGER_KMS", "RANGER_KMS_SERVER", "kms-env", "kms_log_dir"),
    ("SPARK2", "SPARK2_JOBHISTORYSERVER", "spark2-env", "spark_log_dir"),
    ("SPARK2", "SPARK2_THRIFTSERVER", "spark2-env", "spark_log_dir"),
    ("SPARK2", "LIVY2_SERVER", "livy2-env", "livy2_log_dir"),
    ("SUPERSET", "SUPERSET", "superset-env", "superset_log_dir"),
    ("STORM", "NIMBUS", "storm-env", "storm_log_dir"),
    ("STORM", "STORM_UI_SERVER", "storm-env", "storm_log_dir"),
    ("STORM", "SUPERVISOR", "storm-env", "storm_log_dir"),
    ("MAPREDUCE2", "HISTORYSERVER", "mapred-env", "mapred_log_dir_prefix"),
    ("YARN", "APP_TIMELINE_SERVER", "yarn-env", "yarn_log_dir_prefix"),
    ("YARN", "RESOURCEMANAGER", "yarn-env", "yarn_log_dir_prefix"),
    ("ZEPPELIN", "ZEPPELIN_MASTER", "zeppelin-env", "zeppelin_log_dir"),
    ("SMARTSENSE", "HST_SERVER", "hst-log4j", "hst.log.dir"),
    ("SMARTSENSE", "HST_AGENT", "hst-log4j", "hst.log.dir"),
    ("NIFI", "NIFI_CA", "nifi-env", "nifi_node_log_dir"),
    ("STREAMLINE", "STREAMLINE_SERVER", "streamline-env", "streamline_log_dir"),
];

/// Log directory of every known component the filter's services and components allow,
/// read from the cluster configuration. Components whose property is unset are left out.
pub fn component_log_dirs(filter: &TargetFilter, configs: &ClusterConfigs) -> BTreeMap<String, String> {
    COMPONENT_LOG_DIRS
        .iter()
        .filter(|(service, ..)| filter.services.is_empty() || filter.services.contains(*service))
        .filter(|(_, component, ..)| {
            filter.components.is_empty() || filter.components.contains(*component)
        })
        .filter_map(|(_, component, config_type, property)| {
            let dir = configs.get(*config_type)?.get(*property)?.trim();
            (!dir.is_empty()).then(|| (component.to_string(), dir.to_string()))
        })
        .collect()
}

/// One component's log directory and the hosts it runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentLogs {
    pub component: String,
    pub log_dir: String,
    pub targets: TargetSet,
}

/// Expands the filter's services into their components, adds the named components, and
/// pairs each with its log directory and hosts. The host list narrows every component.
pub fn plan_component_logs(
    filter: &TargetFilter,
    inventory: &Inventory,
    configs: &ClusterConfigs,
) -> Vec<ComponentLogs> {
    let dirs = component_log_dirs(filter, configs);
    let mut wanted: BTreeSet<String> = filter.components.iter().cloned().collect();
    for service in &filter.services {
        wanted.extend(inventory.components_of_service(service).map(str::to_string));
    }

    let mut plan = Vec::new();
    for component in wanted {
        let Some(log_dir) = dirs.get(&component) else {
            tracing::debug!(component = %component, "no log directory configured, skipping");
            continue;
        };
        // An unplaced component would resolve to every host.
        if !inventory
            .host_components
            .iter()
            .any(|hc| hc.component_name == component)
        {
            tracing::debug!(component = %component, "component is not placed on any host");
            continue;
        }
        let only = TargetFilter {
            components: BTreeSet::from([component.clone()]),
            hosts: filter.hosts.clone(),
            ..TargetFilter::default()
        };
        let targets = resolve(&only, inventory, "");
        plan.push(ComponentLogs {
            component,
            log_dir: log_dir.clone(),
            targets,
        });
    }
    plan
}

/// `ambari.log.dir` with `${ambari.root.dir}` substituted and doubled slashes collapsed.
pub fn server_log_dir(probe_output: &str) -> Option<String> {
    let props = parse_properties(probe_output.lines());
    let root = props.get("ambari.root.dir").map(String::as_str).unwrap_or("");
    let raw = props.get("ambari.log.dir")?;
    let dir = raw
        .replacen("${ambari.root.dir}", root, 1)
        .replace("//", "/");
    let dir = dir.trim();
    (!dir.is_empty()).then(|| dir.to_string())
}

pub fn agent_log_dir(probe_output: &str) -> Option<String> {
    let props = parse_properties(probe_output.lines());
    props
        .get("logdir")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `<dest>/download-<cluster>-<YYYYmmddHHMMSS>`
pub fn download_root(dest: &Path, cluster: &str, at: OffsetDateTime) -> AppResult<PathBuf> {
    let stamp = at
        .format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))
        .map_err(|err| {
            AppError::with_message(
                AppErrorKind::Internal,
                codes::INTERNAL_ERROR,
                format!("cannot format timestamp: {err}"),
            )
        })?;
    Ok(dest.join(format!("download-{cluster}-{stamp}")))
}

#[derive(Debug)]
pub struct LogDownload {
    pub component: String,
    pub folder: PathBuf,
    pub log_dir: String,
    pub outcome: TransferOutcome,
}

#[derive(Clone, Copy)]
pub struct LogRequest<'a> {
    pub cluster: &'a str,
    pub server: bool,
    pub dest: &'a Path,
    pub timeout: Duration,
    pub at: OffsetDateTime,
}

async fn create_folder(folder: &Path) -> AppResult<()> {
    tokio::fs::create_dir_all(folder).await.map_err(|err| {
        AppError::with_message(
            AppErrorKind::Internal,
            codes::LOCAL_ERROR,
            format!("cannot create '{}': {err}", folder.display()),
        )
    })
}

/// Downloads cluster manager server, agent or per-component logs.
#[derive(Clone)]
pub struct LogCollector {
    remote_exec: Arc<dyn RemoteExecPort>,
    transfer: RemoteTransfer,
}

impl LogCollector {
    pub fn new(remote_exec: Arc<dyn RemoteExecPort>, transfer: RemoteTransfer) -> Self {
        Self {
            remote_exec,
            transfer,
        }
    }

    pub async fn download(
        &self,
        targets: &TargetSet,
        profile: &ConnectionProfile,
        request: LogRequest<'_>,
    ) -> AppResult<LogDownload> {
        let (component, probe, default_dir, parse): (_, _, _, fn(&str) -> Option<String>) =
            if request.server {
                (
                    SERVER_COMPONENT,
                    SERVER_LOG_PROBE,
                    DEFAULT_SERVER_LOG_DIR,
                    server_log_dir,
                )
            } else {
                (
                    AGENT_COMPONENT,
                    AGENT_LOG_PROBE,
                    DEFAULT_AGENT_LOG_DIR,
                    agent_log_dir,
                )
            };

        let mut log_dir = default_dir.to_string();
        if let Some(first) = targets.iter().next() {
            match self
                .remote_exec
                .run(profile, first, probe, request.timeout)
                .await
            {
                Ok(res) => {
                    if let Some(dir) = parse(&res.stdout) {
                        log_dir = dir;
                    }
                }
                Err(err) => {
                    tracing::warn!(host = first, "log dir probe failed, using {default_dir}: {err}");
                }
            }
        }
        tracing::info!(component, log_dir = %log_dir, hosts = targets.len(), "downloading logs");

        let folder = download_root(request.dest, request.cluster, request.at)?.join(component);
        create_folder(&folder).await?;
        let outcome = self
            .transfer
            .pull_archive(
                targets,
                profile,
                component,
                &log_dir,
                &folder,
                request.timeout,
            )
            .await?;
        Ok(LogDownload {
            component: component.to_string(),
            folder,
            log_dir,
            outcome,
        })
    }

    /// Pulls each planned component's log directory into `<root>/<COMPONENT>/<host>/`,
    /// one component after another.
    pub async fn download_components(
        &self,
        plan: &[ComponentLogs],
        profile: &ConnectionProfile,
        request: LogRequest<'_>,
    ) -> AppResult<Vec<LogDownload>> {
        let root = download_root(request.dest, request.cluster, request.at)?;
        let mut downloads = Vec::with_capacity(plan.len());
        for entry in plan {
            tracing::info!(
                component = %entry.component,
                log_dir = %entry.log_dir,
                hosts = entry.targets.len(),
                "downloading component logs"
            );
            let folder = root.join(&entry.component);
            create_folder(&folder).await?;
            let outcome = self
                .transfer
                .pull_archive(
                    &entry.targets,
                    profile,
                    &entry.component,
                    &entry.log_dir,
                    &folder,
                    request.timeout,
                )
                .await?;
            downloads.push(LogDownload {
                component: entry.component.clone(),
                folder,
                log_dir: entry.log_dir.clone(),
                outcome,
            });
        }
        Ok(downloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::NoopHostOutput;
    use crate::app::services::executor::tests::{Script, ScriptedRemoteExec, profile};
    use crate::app::services::transfer::archive_path;
    use crate::app::services::transfer::tests::MemoryFiles;
    use crate::app::types::{HostComponentRecord, HostRecord};
    use time::macros::datetime;

    fn placed(component: &str, service: &str, host: &str) -> HostComponentRecord {
        HostComponentRecord {
            component_name: component.into(),
            service_name: service.into(),
            host_name: host.into(),
            state: "STARTED".into(),
        }
    }

    // a runs NAMENODE and DATANODE, b runs DATANODE and HDFS_CLIENT, both run ZOOKEEPER_SERVER.
    fn cluster() -> (Inventory, ClusterConfigs) {
        let host = |name: &str, ip: &str| HostRecord {
            public_host_name: name.into(),
            ip: ip.into(),
            host_state: "HEALTHY".into(),
        };
        let inventory = Inventory {
            hosts: vec![host("a", "10.0.0.1"), host("b", "10.0.0.2")],
            host_components: vec![
                placed("NAMENODE", "HDFS", "a"),
                placed("DATANODE", "HDFS", "a"),
                placed("DATANODE", "HDFS", "b"),
                placed("HDFS_CLIENT", "HDFS", "b"),
                placed("ZOOKEEPER_SERVER", "ZOOKEEPER", "a"),
                placed("ZOOKEEPER_SERVER", "ZOOKEEPER", "b"),
            ],
        };
        let mut configs = ClusterConfigs::new();
        configs
            .entry("hadoop-env".into())
            .or_default()
            .insert("hdfs_log_dir_prefix".into(), "/var/log/hadoop".into());
        configs
            .entry("zookeeper-env".into())
            .or_default()
            .insert("zk_log_dir".into(), " /var/log/zookeeper ".into());
        (inventory, configs)
    }

    #[test]
    fn log_dirs_follow_service_and_component_filters() {
        let (_, configs) = cluster();
        let dirs = component_log_dirs(&TargetFilter::from_csv(Some("HDFS"), None, None, false), &configs);
        assert_eq!(dirs.keys().collect::<Vec<_>>(), vec!["DATANODE", "NAMENODE"]);

        let dirs = component_log_dirs(
            &TargetFilter::from_csv(None, Some("ZOOKEEPER_SERVER"), None, false),
            &configs,
        );
        assert_eq!(dirs["ZOOKEEPER_SERVER"], "/var/log/zookeeper");
        assert_eq!(dirs.len(), 1);

        // Unset properties are not guessed.
        let dirs = component_log_dirs(&TargetFilter::from_csv(Some("YARN"), None, None, false), &configs);
        assert!(dirs.is_empty());
    }

    #[test]
    fn plan_expands_services_and_narrows_by_host() {
        let (inventory, configs) = cluster();
        let filter = TargetFilter::from_csv(Some("HDFS"), None, None, false);
        let plan = plan_component_logs(&filter, &inventory, &configs);
        let components: Vec<_> = plan.iter().map(|p| p.component.as_str()).collect();
        // HDFS_CLIENT has no log directory entry.
        assert_eq!(components, vec!["DATANODE", "NAMENODE"]);
        assert_eq!(plan[0].targets.len(), 2);
        assert_eq!(plan[1].targets.iter().collect::<Vec<_>>(), vec!["10.0.0.1"]);
        assert_eq!(plan[1].log_dir, "/var/log/hadoop");

        let filter = TargetFilter::from_csv(None, Some("DATANODE"), Some("b"), false);
        let plan = plan_component_logs(&filter, &inventory, &configs);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].targets.iter().collect::<Vec<_>>(), vec!["10.0.0.2"]);
    }

    #[test]
    fn unplaced_component_is_not_spread_to_every_host() {
        let (inventory, mut configs) = cluster();
        configs
            .entry("kafka-env".into())
            .or_default()
            .insert("kafka_log_dir".into(), "/var/log/kafka".into());
        let filter = TargetFilter::from_csv(None, Some("KAFKA_BROKER"), None, false);
        assert!(plan_component_logs(&filter, &inventory, &configs).is_empty());
    }

    #[tokio::test]
    async fn component_logs_land_under_component_and_host_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let (inventory, configs) = cluster();
        let files = Arc::new(MemoryFiles::default());
        for (host, component) in [
            ("10.0.0.1", "NAMENODE"),
            ("10.0.0.1", "DATANODE"),
            ("10.0.0.2", "DATANODE"),
        ] {
            files.remote.lock().unwrap().insert(
                (host.to_string(), archive_path(component)),
                format!("{component}@{host}").into_bytes(),
            );
        }
        let remote = Arc::new(ScriptedRemoteExec::new(&[]));
        let transfer = RemoteTransfer::new(remote.clone(), files, Arc::new(NoopHostOutput));
        let collector = LogCollector::new(remote.clone(), transfer);
        let plan = plan_component_logs(
            &TargetFilter::from_csv(Some("HDFS"), None, None, false),
            &inventory,
            &configs,
        );

        let downloads = collector
            .download_components(
                &plan,
                &profile(),
                LogRequest {
                    cluster: "hdp",
                    server: false,
                    dest: tmp.path(),
                    timeout: Duration::from_secs(30),
                    at: datetime!(2024-01-02 03:04:05 UTC),
                },
            )
            .await
            .unwrap();

        assert_eq!(downloads.len(), 2);
        assert!(downloads.iter().all(|d| d.outcome.failures.is_empty()));
        let root = tmp.path().join("download-hdp-20240102030405");
        let got = std::fs::read(root.join("DATANODE").join("10.0.0.2").join("DATANODE.tar.gz")).unwrap();
        assert_eq!(got, b"DATANODE@10.0.0.2");
        let got = std::fs::read(root.join("NAMENODE").join("10.0.0.1").join("NAMENODE.tar.gz")).unwrap();
        assert_eq!(got, b"NAMENODE@10.0.0.1");
        assert_eq!(
            remote.commands_for("10.0.0.2"),
            vec!["cd '/var/log/hadoop' && tar -czf '/tmp/DATANODE.tar.gz' *".to_string()]
        );
    }

    #[test]
    fn server_log_dir_substitutes_root_dir() {
        let out = "ambari.root.dir=/\nambari.log.dir=${ambari.root.dir}/var/log/ambari-server\n";
        assert_eq!(server_log_dir(out).as_deref(), Some("/var/log/ambari-server"));
        let out = "ambari.root.dir=/opt/ambari\nambari.log.dir=${ambari.root.dir}/logs\n";
        assert_eq!(server_log_dir(out).as_deref(), Some("/opt/ambari/logs"));
        assert_eq!(server_log_dir("ambari.root.dir=/\n"), None);
    }

    #[test]
    fn agent_log_dir_is_trimmed() {
        assert_eq!(
            agent_log_dir("logdir = /data/log/agent  \n").as_deref(),
            Some("/data/log/agent")
        );
        assert_eq!(agent_log_dir("cat: no such file\n"), None);
    }

    #[test]
    fn download_root_carries_cluster_and_timestamp() {
        let root = download_root(Path::new("/tmp/out"), "hdp", datetime!(2024-03-05 07:08:09 UTC))
            .unwrap();
        assert_eq!(root, Path::new("/tmp/out/download-hdp-20240305070809"));
    }

    #[tokio::test]
    async fn agent_logs_land_under_component_and_host_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let files = Arc::new(MemoryFiles::default());
        files.remote.lock().unwrap().insert(
            ("10.0.0.1".to_string(), archive_path(AGENT_COMPONENT)),
            b"tgz".to_vec(),
        );
        let remote = Arc::new(ScriptedRemoteExec::new(&[(
            "10.0.0.1",
            Script::Output("logdir=/data/agent-logs\n"),
        )]));
        let transfer = RemoteTransfer::new(remote.clone(), files, Arc::new(NoopHostOutput));
        let collector = LogCollector::new(remote.clone(), transfer);
        let targets: TargetSet = ["10.0.0.1"].into_iter().collect();

        let download = collector
            .download(
                &targets,
                &profile(),
                LogRequest {
                    cluster: "hdp",
                    server: false,
                    dest: tmp.path(),
                    timeout: Duration::from_secs(30),
                    at: datetime!(2024-01-02 03:04:05 UTC),
                },
            )
            .await
            .unwrap();

        assert_eq!(download.log_dir, "/data/agent-logs");
        assert!(download.outcome.failures.is_empty());
        let archive = tmp
            .path()
            .join("download-hdp-20240102030405")
            .join(AGENT_COMPONENT)
            .join("10.0.0.1")
            .join("ambari-agent.tar.gz");
        assert_eq!(std::fs::read(archive).unwrap(), b"tgz");
        let commands = remote.commands_for("10.0.0.1");
        assert_eq!(commands[0], AGENT_LOG_PROBE);
        assert!(commands[1].starts_with("cd '/data/agent-logs' && tar"));
    }

    #[tokio::test]
    async fn server_probe_failure_falls_back_to_default_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let remote = Arc::new(ScriptedRemoteExec::new(&[("s", Script::Refuse)]));
        let transfer = RemoteTransfer::new(
            remote.clone(),
            Arc::new(MemoryFiles::default()),
            Arc::new(NoopHostOutput),
        );
        let collector = LogCollector::new(remote, transfer);
        let targets: TargetSet = ["s"].into_iter().collect();
        let download = collector
            .download(
                &targets,
                &profile(),
                LogRequest {
                    cluster: "hdp",
                    server: true,
                    dest: tmp.path(),
                    timeout: Duration::from_secs(30),
                    at: datetime!(2024-01-02 03:04:05 UTC),
                },
            )
            .await
            .unwrap();
        assert_eq!(download.log_dir, DEFAULT_SERVER_LOG_DIR);
        assert!(download.folder.ends_with(SERVER_COMPONENT));
        assert!(download.outcome.failures.contains_key("s"));
    }
}
