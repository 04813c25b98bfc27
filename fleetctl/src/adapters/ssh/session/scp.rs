// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result, anyhow, bail};
use russh::ChannelMsg;
use std::path::Path;

use crate::app::services::shell::sh_escape;
use crate::app::types::{ConnectionProfile, DEFAULT_SSH_PORT};

use super::HostSession;

/// `C<mode> <size> <name>\n`, the single-file header of the scp sink protocol.
pub fn scp_header(mode: u32, size: u64, name: &str) -> String {
    format!("C{mode:04o} {size} {name}\n")
}

/// File name announced to the sink: the remote basename, or the local one for a directory target.
pub fn target_name(local_path: &Path, remote_path: &str) -> Option<String> {
    let remote_base = remote_path.rsplit('/').next().unwrap_or("");
    if !remote_base.is_empty() {
        return Some(remote_base.to_string());
    }
    local_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Checks the acknowledgement bytes a sink sent back. `0` is ok, `1`/`2` carry a message.
pub fn check_acks(bytes: &[u8]) -> Result<()> {
    let mut rest = bytes;
    while let Some((&first, tail)) = rest.split_first() {
        match first {
            0 => rest = tail,
            1 | 2 => {
                let end = tail.iter().position(|b| *b == b'\n').unwrap_or(tail.len());
                let message = String::from_utf8_lossy(&tail[..end]).trim().to_string();
                bail!("scp: {message}");
            }
            other => bail!("scp: unexpected response byte {other:#04x}"),
        }
    }
    Ok(())
}

impl HostSession {
    /// Pushes one local file with `scp -t`, then closes the session.
    pub async fn copy_to(self, local_path: &Path, remote_path: &str) -> Result<()> {
        let name = target_name(local_path, remote_path)
            .ok_or_else(|| anyhow!("cannot derive a file name for {remote_path}"))?;
        let file = tokio::fs::File::open(local_path)
            .await
            .with_context(|| format!("open {}", local_path.display()))?;
        let size = file.metadata().await?.len();

        let mut chan = self
            .handle
            .channel_open_session()
            .await
            .context("open session")?;
        chan.exec(true, format!("scp -t {}", sh_escape(remote_path)))
            .await
            .context("exec scp sink")?;
        chan.data(scp_header(0o644, size, &name).as_bytes())
            .await
            .context("send scp header")?;
        chan.data(file).await.context("send file body")?;
        chan.data(&[0u8][..]).await.context("send scp trailer")?;
        chan.eof().await?;

        let mut acks = Vec::new();
        let mut exit_code = None;
        while let Some(msg) = chan.wait().await {
            match msg {
                ChannelMsg::Data { data } => acks.extend_from_slice(&data),
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                ChannelMsg::Close => break,
                _ => {}
            }
        }
        let _ = chan.close().await;
        let address = self.address().to_string();
        self.close().await;

        check_acks(&acks).with_context(|| format!("push to {address}:{remote_path}"))?;
        match exit_code {
            Some(0) | None => Ok(()),
            Some(code) => bail!("scp sink on {address} exited with {code}"),
        }
    }
}

fn host_for_target(address: &str) -> String {
    if address.contains(':') && !address.starts_with('[') {
        format!("[{address}]")
    } else {
        address.to_string()
    }
}

/// Arguments for the local `scp` client that pulls `remote_path` from `address` into `local_dir`.
pub fn pull_args(
    profile: &ConnectionProfile,
    address: &str,
    remote_path: &str,
    local_dir: &Path,
    strict_host_keys: bool,
) -> Vec<String> {
    let mut args = vec!["-P".to_string(), profile.port.to_string()];
    if let Some(key) = &profile.key_path {
        args.push("-i".to_string());
        args.push(key.display().to_string());
    }
    if !strict_host_keys {
        args.push("-o".to_string());
        args.push("StrictHostKeyChecking=no".to_string());
    }
    if let Some(proxy) = profile.proxy() {
        let jump = if profile.port == DEFAULT_SSH_PORT {
            format!("{}@{}", profile.username, proxy)
        } else {
            format!("{}@{}:{}", profile.username, proxy, profile.port)
        };
        args.push("-o".to_string());
        args.push(format!("ProxyJump={jump}"));
    }
    args.push(format!(
        "{}@{}:{}",
        profile.username,
        host_for_target(address),
        remote_path
    ));
    args.push(local_dir.display().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn profile() -> ConnectionProfile {
        ConnectionProfile {
            name: "vagrant".into(),
            username: "vagrant".into(),
            key_path: Some(PathBuf::from("/home/u/.vagrant.d/insecure_private_key")),
            port: 22,
            proxy_address: None,
            password: None,
        }
    }

    #[test]
    fn header_matches_sink_protocol() {
        assert_eq!(scp_header(0o644, 12, "a.txt"), "C0644 12 a.txt\n");
        assert_eq!(scp_header(0o600, 0, "k"), "C0600 0 k\n");
    }

    #[test]
    fn target_name_prefers_remote_basename() {
        let local = Path::new("/tmp/local.conf");
        assert_eq!(target_name(local, "/etc/app/app.conf").as_deref(), Some("app.conf"));
        assert_eq!(target_name(local, "/etc/app/").as_deref(), Some("local.conf"));
        assert_eq!(target_name(local, "plain").as_deref(), Some("plain"));
    }

    #[test]
    fn acks_report_sink_errors() {
        assert!(check_acks(&[0, 0, 0]).is_ok());
        assert!(check_acks(&[]).is_ok());
        let err = check_acks(b"\0\x01scp: /etc/x: Permission denied\n").unwrap_err();
        assert!(err.to_string().contains("Permission denied"));
        assert!(check_acks(b"?").is_err());
    }

    #[test]
    fn pull_args_direct() {
        let args = pull_args(
            &profile(),
            "10.0.0.1",
            "/tmp/ambari-agent.tar.gz",
            Path::new("/out/10.0.0.1"),
            false,
        );
        assert_eq!(
            args,
            vec![
                "-P",
                "22",
                "-i",
                "/home/u/.vagrant.d/insecure_private_key",
                "-o",
                "StrictHostKeyChecking=no",
                "vagrant@10.0.0.1:/tmp/ambari-agent.tar.gz",
                "/out/10.0.0.1",
            ]
        );
    }

    #[test]
    fn pull_args_insert_proxy_jump() {
        let mut p = profile();
        p.key_path = None;
        p.port = 2222;
        p.proxy_address = Some("bastion.example.com".into());
        let args = pull_args(&p, "fe80::1", "/var/log/x", Path::new("/out"), true);
        assert_eq!(
            args,
            vec![
                "-P",
                "2222",
                "-o",
                "ProxyJump=vagrant@bastion.example.com:2222",
                "vagrant@[fe80::1]:/var/log/x",
                "/out",
            ]
        );
    }
}
