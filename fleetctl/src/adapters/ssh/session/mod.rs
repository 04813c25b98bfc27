// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result, anyhow};
use russh::client::Config;
use russh::keys::known_hosts::{learn_known_hosts, learn_known_hosts_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::ssh::ProxyFailure;
use crate::app::types::ConnectionProfile;

mod auth;
mod exec;
pub mod scp;

/// Host key policy shared by both hops of a connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept whatever key the server presents.
    #[default]
    AcceptAny,
    /// Check against known_hosts, learning keys not seen before.
    KnownHosts(Option<PathBuf>),
}

/// Minimal russh client handler; only host key checking is customised.
#[derive(Clone, Debug)]
pub(crate) struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    fn new(host: &str, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.to_string(),
            port,
            policy,
        }
    }
}

impl russh::client::Handler for ClientHandler {
    type Error = anyhow::Error;
    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAny => Ok(true),
            HostKeyPolicy::KnownHosts(path) => {
                verify_server_key(&self.host, self.port, server_public_key, path.as_deref())
            }
        }
    }
}

fn check_known_hosts_for(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> std::result::Result<bool, russh::keys::Error> {
    match known_hosts_path {
        Some(path) => russh::keys::check_known_hosts_path(host, port, key, path),
        None => russh::keys::check_known_hosts(host, port, key),
    }
}

fn learn_known_hosts_for(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> std::result::Result<(), russh::keys::Error> {
    match known_hosts_path {
        Some(path) => learn_known_hosts_path(host, port, key, path),
        None => learn_known_hosts(host, port, key),
    }
}

fn verify_server_key(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> std::result::Result<bool, anyhow::Error> {
    match check_known_hosts_for(host, port, key, known_hosts_path) {
        Ok(true) => return Ok(true),
        Ok(false) => {}
        Err(err) => {
            // A changed key shows up here as KeyChanged.
            log::warn!("server key validation failed for {host}:{port}: {err}");
            return Err(anyhow!(
                "server key validation failed for {host}:{port}: {err}"
            ));
        }
    }
    log::info!("server key for {host}:{port} is not present in known_hosts; learning");
    learn_known_hosts_for(host, port, key, known_hosts_path).map_err(|err| {
        log::warn!("failed to learn server key for {host}:{port}: {err}");
        anyhow!("failed to learn server key for {host}:{port}: {err}")
    })?;
    Ok(true)
}

/// Connection settings that are not part of a profile.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub host_keys: HostKeyPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            host_keys: HostKeyPolicy::AcceptAny,
        }
    }
}

pub(crate) const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Liveness comes from keepalives; a command may stay silent for as long as its own timeout.
fn client_config() -> Arc<Config> {
    Arc::new(Config {
        inactivity_timeout: None,
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        keepalive_max: 3,
        channel_buffer_size: 64,
        window_size: 1024 * 1024,
        ..Default::default()
    })
}

/// One authenticated connection to one host, owned by a single unit of work.
pub struct HostSession {
    pub(crate) handle: russh::client::Handle<ClientHandler>,
    address: String,
    // Keeps the tunnel alive for as long as the target session lives.
    jump: Option<russh::client::Handle<ClientHandler>>,
}

impl HostSession {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Connects directly, or through the profile's jump host when one is set.
    ///
    /// Both hops authenticate with the same profile credentials.
    pub async fn connect(
        profile: &ConnectionProfile,
        address: &str,
        settings: &SessionSettings,
    ) -> Result<Self> {
        tokio::time::timeout(
            settings.connect_timeout,
            Self::connect_inner(profile, address, settings),
        )
        .await
        .map_err(|_| {
            anyhow!(
                "timed out after {}s connecting to {address}",
                settings.connect_timeout.as_secs()
            )
        })?
    }

    async fn connect_inner(
        profile: &ConnectionProfile,
        address: &str,
        settings: &SessionSettings,
    ) -> Result<Self> {
        let config = client_config();
        let port = profile.port;
        let handler = ClientHandler::new(address, port, settings.host_keys.clone());

        let Some(proxy) = profile.proxy() else {
            log::debug!("connecting to {}@{}:{}", profile.username, address, port);
            let mut handle = russh::client::connect(config, (address, port), handler)
                .await
                .with_context(|| format!("SSH connect to {address}:{port} failed"))?;
            auth::authenticate(&mut handle, profile).await?;
            return Ok(Self {
                handle,
                address: address.to_string(),
                jump: None,
            });
        };

        log::debug!(
            "connecting to {}@{}:{} via {}",
            profile.username,
            address,
            port,
            proxy
        );
        let proxy_failure = |reason: String| {
            anyhow::Error::new(ProxyFailure {
                host: proxy.to_string(),
                reason,
            })
        };
        let jump_handler = ClientHandler::new(proxy, port, settings.host_keys.clone());
        let mut jump = russh::client::connect(config.clone(), (proxy, port), jump_handler)
            .await
            .map_err(|err| proxy_failure(format!("connect failed: {err}")))?;
        auth::authenticate(&mut jump, profile).await?;
        let channel = jump
            .channel_open_direct_tcpip(address, u32::from(port), "127.0.0.1", 0)
            .await
            .map_err(|err| proxy_failure(format!("cannot tunnel to {address}:{port}: {err}")))?;
        let mut handle = russh::client::connect_stream(config, channel.into_stream(), handler)
            .await
            .with_context(|| format!("SSH handshake with {address}:{port} via {proxy} failed"))?;
        auth::authenticate(&mut handle, profile).await?;
        Ok(Self {
            handle,
            address: address.to_string(),
            jump: Some(jump),
        })
    }

    pub async fn close(self) {
        let _ = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await;
        if let Some(jump) = self.jump {
            let _ = jump
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await;
        }
    }
}
