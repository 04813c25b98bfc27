// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::app::services::DEFAULT_COMMAND_TIMEOUT;
use crate::app::types::{ClusterSettings, ConnectionProfile};

const APP_DIR_NAME: &str = "fleetctl";
const CONFIG_FILE_NAME: &str = "fleetctl.toml";
const CONFIG_ENV_VAR: &str = "FLEETCTL_CONFIG_PATH";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    command_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    transfer_timeout_secs: Option<u64>,
    inventory_path: Option<String>,
    profile: Option<String>,
    verify_host_keys: Option<bool>,
    known_hosts_path: Option<String>,
    verbose: Option<bool>,
    #[serde(default)]
    cluster: ClusterSettings,
    #[serde(default)]
    profiles: Vec<ConnectionProfile>,
}

#[derive(Debug)]
pub struct Config {
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
    /// Upper bound for one external file copy; kept apart from the command timeout.
    pub transfer_timeout: Duration,
    pub inventory_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub verify_host_keys: bool,
    pub known_hosts_path: Option<PathBuf>,
    pub verbose: bool,
    pub cluster: ClusterSettings,
    pub profiles: Vec<ConnectionProfile>,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub command_timeout_secs: ConfigValue<u64>,
    pub connect_timeout_secs: ConfigValue<u64>,
    pub transfer_timeout_secs: ConfigValue<u64>,
    pub inventory_path: ConfigValue<Option<PathBuf>>,
    pub profile: ConfigValue<Option<String>>,
    pub verify_host_keys: ConfigValue<bool>,
    pub verbose: ConfigValue<bool>,
    pub profiles: usize,
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub command_timeout_secs: Option<u64>,
    pub inventory_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub verbose: Option<bool>,
}

fn layered<T>(flag: Option<T>, file: Option<T>, default: T) -> (T, ConfigSource) {
    match (flag, file) {
        (Some(value), _) => (value, ConfigSource::Override),
        (None, Some(value)) => (value, ConfigSource::ConfigFile),
        (None, None) => (default, ConfigSource::Default),
    }
}

pub fn load(config_path_override: Option<PathBuf>, overrides: Overrides) -> Result<Config> {
    Ok(load_with_report(config_path_override, overrides)?.config)
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source, required) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override), true),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env), true),
            None => match default_config_path().ok() {
                Some(path) => (Some(path), Some(ConfigSource::Default), false),
                None => (None, None, false),
            },
        },
    };
    let config_file_present = config_path
        .as_deref()
        .map(|path| path.exists())
        .unwrap_or(false);

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };
    let base_dir = config_path.as_deref().and_then(|path| path.parent());

    let (command_timeout_secs, command_timeout_source) = layered(
        overrides.command_timeout_secs,
        file_config.command_timeout_secs,
        DEFAULT_COMMAND_TIMEOUT.as_secs(),
    );
    if command_timeout_secs == 0 {
        anyhow::bail!("command_timeout_secs must be at least 1");
    }
    let (connect_timeout_secs, connect_timeout_source) = layered(
        None,
        file_config.connect_timeout_secs,
        DEFAULT_CONNECT_TIMEOUT_SECS,
    );
    if connect_timeout_secs == 0 {
        anyhow::bail!("connect_timeout_secs must be at least 1");
    }
    let (transfer_timeout_secs, transfer_timeout_source) = layered(
        None,
        file_config.transfer_timeout_secs,
        DEFAULT_TRANSFER_TIMEOUT_SECS,
    );
    if transfer_timeout_secs == 0 {
        anyhow::bail!("transfer_timeout_secs must be at least 1");
    }

    let (inventory_path, inventory_source) = match overrides.inventory_path {
        Some(path) => (Some(expand_path(path)), ConfigSource::Override),
        None => match file_config.inventory_path.as_deref() {
            Some(raw) => (Some(resolve_path(raw, base_dir)), ConfigSource::ConfigFile),
            None => (None, ConfigSource::Default),
        },
    };
    let (profile, profile_source) = layered(
        overrides.profile.map(Some),
        file_config.profile.map(Some),
        None,
    );
    let (verify_host_keys, verify_source) =
        layered(None, file_config.verify_host_keys, false);
    let (verbose, verbose_source) = layered(overrides.verbose, file_config.verbose, false);

    let known_hosts_path = file_config
        .known_hosts_path
        .as_deref()
        .map(|raw| resolve_path(raw, base_dir));
    let profiles = file_config
        .profiles
        .into_iter()
        .map(|mut profile| {
            profile.key_path = profile
                .key_path
                .map(|key| resolve_path(&key.to_string_lossy(), base_dir));
            profile
        })
        .collect::<Vec<_>>();

    let config = Config {
        command_timeout: Duration::from_secs(command_timeout_secs),
        connect_timeout: Duration::from_secs(connect_timeout_secs),
        transfer_timeout: Duration::from_secs(transfer_timeout_secs),
        inventory_path: inventory_path.clone(),
        profile: profile.clone(),
        verify_host_keys,
        known_hosts_path,
        verbose,
        cluster: file_config.cluster,
        profiles,
        config_path: config_path.clone(),
    };

    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        command_timeout_secs: ConfigValue {
            value: command_timeout_secs,
            source: command_timeout_source,
        },
        connect_timeout_secs: ConfigValue {
            value: connect_timeout_secs,
            source: connect_timeout_source,
        },
        transfer_timeout_secs: ConfigValue {
            value: transfer_timeout_secs,
            source: transfer_timeout_source,
        },
        inventory_path: ConfigValue {
            value: inventory_path,
            source: inventory_source,
        },
        profile: ConfigValue {
            value: profile,
            source: profile_source,
        },
        verify_host_keys: ConfigValue {
            value: verify_host_keys,
            source: verify_source,
        },
        verbose: ConfigValue {
            value: verbose,
            source: verbose_source,
        },
        profiles: config.profiles.len(),
    };

    Ok(LoadResult { config, report })
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                anyhow::bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
