// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use fleetctl::adapters::ambari::AmbariApi;
use fleetctl::adapters::cli::{self, Cmd};
use fleetctl::adapters::console::ConsoleOutput;
use fleetctl::adapters::inventory::SnapshotInventory;
use fleetctl::adapters::local::{HttpDownloader, TokioCommandRunner};
use fleetctl::adapters::profiles::ConfigProfileStore;
use fleetctl::adapters::ssh::{HostKeyPolicy, SessionSettings, SshAdapter};
use fleetctl::app::ports::{ClusterManagerPort, InventoryPort};
use fleetctl::app::services::TaskOutcome;
use fleetctl::app::types::{DispatchOutcome, TransferOutcome};
use fleetctl::app::usecases::{Collaborators, UseCases};
use fleetctl::config::{self, Config, ConfigReport};
use fleetctl::logging;

fn log_config_report(report: &ConfigReport) {
    match (&report.config_path, report.config_path_source) {
        (Some(path), Some(source)) => tracing::debug!(
            "config path: {} (source={}, present={})",
            path.display(),
            source.as_str(),
            report.config_file_present
        ),
        (Some(path), None) => tracing::debug!(
            "config path: {} (present={})",
            path.display(),
            report.config_file_present
        ),
        (None, _) => tracing::debug!("config path: (none)"),
    }
    tracing::debug!(
        "config command_timeout_secs: {} (source={})",
        report.command_timeout_secs.value,
        report.command_timeout_secs.source.as_str()
    );
    tracing::debug!(
        "config connect_timeout_secs: {} (source={})",
        report.connect_timeout_secs.value,
        report.connect_timeout_secs.source.as_str()
    );
    tracing::debug!(
        "config transfer_timeout_secs: {} (source={})",
        report.transfer_timeout_secs.value,
        report.transfer_timeout_secs.source.as_str()
    );
    tracing::debug!(
        "config inventory_path: {} (source={})",
        report
            .inventory_path
            .value
            .as_deref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "(cluster api)".to_string()),
        report.inventory_path.source.as_str()
    );
    tracing::debug!(
        "config profile: {} (source={})",
        report.profile.value.as_deref().unwrap_or("(auto)"),
        report.profile.source.as_str()
    );
    tracing::debug!(
        "config verify_host_keys: {} (source={})",
        report.verify_host_keys.value,
        report.verify_host_keys.source.as_str()
    );
    tracing::debug!(
        "config verbose: {} (source={}), {} profile(s)",
        report.verbose.value,
        report.verbose.source.as_str(),
        report.profiles
    );
}

fn build_usecases(config: Config) -> anyhow::Result<UseCases> {
    let local = Arc::new(TokioCommandRunner::new(config.command_timeout));
    let downloads = Arc::new(HttpDownloader::new(config.connect_timeout)?);
    let host_keys = if config.verify_host_keys {
        HostKeyPolicy::KnownHosts(config.known_hosts_path.clone())
    } else {
        HostKeyPolicy::AcceptAny
    };
    let ssh = Arc::new(SshAdapter::new(
        SessionSettings {
            connect_timeout: config.connect_timeout,
            host_keys,
        },
        // scp pulls run for as long as the transfer needs, not the command timeout.
        Arc::new(TokioCommandRunner::new(config.transfer_timeout)),
    ));

    let api = if config.cluster.host.trim().is_empty() || config.cluster.name.trim().is_empty() {
        None
    } else {
        Some(Arc::new(AmbariApi::new(&config.cluster, config.connect_timeout)?))
    };
    let inventory: Arc<dyn InventoryPort> = match (&config.inventory_path, &api) {
        (Some(path), _) => Arc::new(SnapshotInventory::new(path)),
        (None, Some(api)) => api.clone(),
        (None, None) => anyhow::bail!(
            "no inventory source: set inventory_path (or --inventory) or the [cluster] name and host"
        ),
    };
    let cluster_manager = api.map(|api| api as Arc<dyn ClusterManagerPort>);

    Ok(UseCases::new(
        Collaborators {
            inventory,
            profiles: Arc::new(ConfigProfileStore::new(config.profiles)?),
            remote_exec: ssh.clone(),
            file_transfer: ssh,
            local,
            downloads,
            cluster_manager,
            output: Arc::new(ConsoleOutput::new()),
        },
        config.cluster,
        config.profile,
    ))
}

fn dispatch_ok(outcome: &DispatchOutcome) -> bool {
    let timed_out = outcome.timed_out().count();
    if timed_out > 0 {
        tracing::warn!(hosts = timed_out, "command timed out on some hosts");
    }
    outcome.failures.is_empty() && timed_out == 0
}

fn transfer_ok(what: &str, outcome: &TransferOutcome) -> bool {
    println!(
        "{what}: {} succeeded, {} failed",
        outcome.succeeded.len(),
        outcome.failures.len()
    );
    outcome.failures.is_empty()
}

async fn execute(cmd: Cmd, usecases: &UseCases, timeout: Duration) -> anyhow::Result<bool> {
    let ok = match cmd {
        Cmd::Hosts(filter) => {
            for address in usecases.resolve_targets(&filter.to_filter()).await?.iter() {
                println!("{address}");
            }
            true
        }
        Cmd::Run(args) => {
            let outcome = usecases
                .run_command(&args.filter.to_filter(), None, &args.command, timeout)
                .await?;
            dispatch_ok(&outcome)
        }
        Cmd::Upload(args) => {
            let outcome = usecases
                .upload(&args.filter.to_filter(), None, &args.source, &args.target)
                .await?;
            transfer_ok("upload", &outcome)
        }
        Cmd::Download(args) => {
            let outcome = usecases
                .download(&args.filter.to_filter(), None, &args.remote, &args.dest)
                .await?;
            transfer_ok("download", &outcome)
        }
        Cmd::DownloadDir(args) => {
            let outcome = usecases
                .download_dir(
                    &args.filter.to_filter(),
                    None,
                    &args.name,
                    &args.remote_dir,
                    &args.dest,
                    timeout,
                )
                .await?;
            transfer_ok("download-dir", &outcome)
        }
        Cmd::Logs(args) => {
            let downloads = usecases
                .download_logs(&args.filter.to_filter(), None, &args.dest, timeout)
                .await?;
            let mut ok = true;
            for logs in &downloads {
                println!(
                    "{} logs from {} saved under {}",
                    logs.component,
                    logs.log_dir,
                    logs.folder.display()
                );
                ok &= transfer_ok(&logs.component, &logs.outcome);
            }
            ok
        }
        Cmd::Playbook(args) => {
            let reports = usecases.run_playbook(&args.file, None, timeout).await?;
            let mut ok = true;
            for report in &reports {
                let task_ok = match &report.outcome {
                    TaskOutcome::Dispatched(outcome) => dispatch_ok(outcome),
                    TaskOutcome::Transferred(outcome) => outcome.failures.is_empty(),
                    TaskOutcome::Local(output) => output.success(),
                    TaskOutcome::Downloaded(_) | TaskOutcome::ClusterUpdated => true,
                };
                println!(
                    "task '{}' ({}): {}",
                    report.name,
                    report.kind,
                    if task_ok { "ok" } else { "had failures" }
                );
                ok &= task_ok;
            }
            ok
        }
    };
    Ok(ok)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let parsed = cli::parse_opts();
    let opts = parsed.opts;
    let config::LoadResult { config, report } = config::load_with_report(
        opts.config,
        config::Overrides {
            command_timeout_secs: opts.timeout,
            inventory_path: opts.inventory,
            profile: opts.profile,
            verbose: parsed.verbose_override,
        },
    )?;
    logging::init(config.verbose);
    log_config_report(&report);

    let timeout = config.command_timeout;
    let usecases = build_usecases(config).context("failed to set up collaborators")?;
    // Configuration errors propagate as Err and end the run.
    let ok = execute(opts.cmd, &usecases, timeout).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(2) })
}
