// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};

use crate::app::types::TargetFilter;

#[derive(Parser, Debug)]
#[command(
    name = "fleetctl",
    version,
    about = "Run commands, move files and replay playbooks across the hosts of a cluster",
    long_about = None,
    after_help = "Hosts are selected by service, component and host name from the cluster inventory.\n\
\n\
Configuration precedence: defaults < config file < command-line flags.\n\
Config path precedence: defaults < FLEETCTL_CONFIG_PATH < command-line flags.\n\
If --config is omitted, fleetctl tries FLEETCTL_CONFIG_PATH, then the default config file location; missing default config is OK.\n\
Paths in the config file are resolved relative to the config file directory; paths passed as flags are resolved relative to the current working directory."
)]
pub struct Opts {
    #[arg(
        short,
        long,
        global = true,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, fleetctl uses FLEETCTL_CONFIG_PATH if set, otherwise the default config file location if available."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::SetTrue,
        help = "Enable debug logging. Overrides `verbose` from the config file."
    )]
    pub verbose: bool,
    #[arg(
        short,
        long,
        global = true,
        value_name = "NAME",
        help = "Connection profile to use. Overrides `profile` from the config file."
    )]
    pub profile: Option<String>,
    #[arg(
        short,
        long,
        global = true,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds to wait for remote commands. Overrides `command_timeout_secs` from the config file."
    )]
    pub timeout: Option<u64>,
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "JSON inventory snapshot. Overrides `inventory_path`; without one the cluster REST API is queried."
    )]
    pub inventory: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Print the addresses a filter resolves to.
    Hosts(FilterArgs),
    /// Run a shell command on every selected host.
    Run(RunArgs),
    /// Copy a local file to every selected host.
    Upload(UploadArgs),
    /// Copy a remote file from every selected host into <dest>/<host>/.
    Download(DownloadArgs),
    /// Archive a remote directory on every selected host and pull the archives.
    DownloadDir(DownloadDirArgs),
    /// Collect agent logs, per-component logs with --services/--components, or server logs with --server.
    Logs(LogsArgs),
    /// Execute a YAML playbook.
    Playbook(PlaybookArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    #[arg(long, value_name = "LIST", help = "Comma-separated service names, e.g. HDFS,YARN")]
    pub services: Option<String>,
    #[arg(long, value_name = "LIST", help = "Comma-separated component names, e.g. DATANODE")]
    pub components: Option<String>,
    #[arg(long, value_name = "LIST", help = "Comma-separated host names; narrows every other selection")]
    pub hosts: Option<String>,
    #[arg(long, help = "Include the control host")]
    pub server: bool,
}

impl FilterArgs {
    pub fn to_filter(&self) -> TargetFilter {
        TargetFilter::from_csv(
            self.services.as_deref(),
            self.components.as_deref(),
            self.hosts.as_deref(),
            self.server,
        )
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command line passed to the remote shell.
    pub command: String,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    pub source: PathBuf,
    /// Remote path, a file name or a directory ending in '/'.
    pub target: String,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    pub remote: String,
    pub dest: PathBuf,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct DownloadDirArgs {
    /// Archive name; the remote archive is /tmp/<name>.tar.gz.
    pub name: String,
    pub remote_dir: String,
    pub dest: PathBuf,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    pub dest: PathBuf,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct PlaybookArgs {
    pub file: PathBuf,
}

pub struct ParsedOpts {
    pub opts: Opts,
    pub verbose_override: Option<bool>,
}

const HELP_TEMPLATE: &str = r#"{before-help}{name} {version}
{about-with-newline}{usage-heading} {usage}
{after-help}

{all-args}
"#;

fn apply_help_template_recursively(cmd: &mut clap::Command) {
    let mut owned = std::mem::take(cmd);
    owned = owned.help_template(HELP_TEMPLATE);
    for sub in owned.get_subcommands_mut() {
        apply_help_template_recursively(sub);
    }
    *cmd = owned;
}

pub fn cli_command() -> clap::Command {
    let mut cmd = Opts::command();
    apply_help_template_recursively(&mut cmd);
    cmd
}

fn from_matches(matches: &clap::ArgMatches) -> Result<ParsedOpts, clap::Error> {
    let verbose_override = matches.get_flag("verbose").then_some(true);
    let opts = Opts::from_arg_matches(matches)?;
    Ok(ParsedOpts {
        opts,
        verbose_override,
    })
}

pub fn parse_opts() -> ParsedOpts {
    let matches = cli_command().get_matches();
    from_matches(&matches).unwrap_or_else(|err| err.exit())
}
