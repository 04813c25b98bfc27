// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use russh::client::{AuthResult, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use std::sync::Arc;

use crate::adapters::ssh::AuthenticationFailure;
use crate::app::types::ConnectionProfile;

use super::ClientHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthStep {
    PublicKey,
    Agent,
    Password,
}

/// Methods to try, in order, for a profile.
fn auth_plan(profile: &ConnectionProfile, agent_available: bool) -> Vec<AuthStep> {
    let mut steps = Vec::with_capacity(3);
    if profile.key_path.is_some() {
        steps.push(AuthStep::PublicKey);
    }
    if agent_available {
        steps.push(AuthStep::Agent);
    }
    if profile
        .password
        .as_deref()
        .is_some_and(|password| !password.is_empty())
    {
        steps.push(AuthStep::Password);
    }
    steps
}

fn agent_available() -> bool {
    cfg!(unix) && std::env::var_os("SSH_AUTH_SOCK").is_some_and(|sock| !sock.is_empty())
}

/// Authenticates with the profile's key, then an ssh-agent, then the password.
pub(super) async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    profile: &ConnectionProfile,
) -> Result<()> {
    for step in auth_plan(profile, agent_available()) {
        let accepted = match step {
            AuthStep::PublicKey => try_key(handle, profile).await?,
            AuthStep::Agent => match try_agent(handle, profile).await {
                Ok(accepted) => accepted,
                Err(err) => {
                    log::debug!("ssh-agent authentication unavailable: {err:#}");
                    false
                }
            },
            AuthStep::Password => try_password(handle, profile).await?,
        };
        if accepted {
            log::debug!("authenticated {} with {:?}", profile.username, step);
            return Ok(());
        }
        log::debug!("{:?} rejected for {}", step, profile.username);
    }
    Err(AuthenticationFailure.into())
}

async fn try_key(handle: &mut Handle<ClientHandler>, profile: &ConnectionProfile) -> Result<bool> {
    let Some(path) = &profile.key_path else {
        return Ok(false);
    };
    let key = russh::keys::load_secret_key(path, None)
        .with_context(|| format!("failed to load secret key at {}", path.display()))?;
    // Prefer SHA-256 for RSA if applicable (ignored for non-RSA keys)
    let pk = PrivateKeyWithHashAlg::new(
        Arc::new(key),
        handle.best_supported_rsa_hash().await?.flatten(),
    );
    let result = handle
        .authenticate_publickey(profile.username.clone(), pk)
        .await?;
    Ok(matches!(result, AuthResult::Success))
}

#[cfg(unix)]
async fn try_agent(handle: &mut Handle<ClientHandler>, profile: &ConnectionProfile) -> Result<bool> {
    let mut agent = russh::keys::agent::client::AgentClient::connect_env()
        .await
        .context("connect to ssh-agent")?;
    let identities = agent
        .request_identities()
        .await
        .context("list ssh-agent identities")?;
    let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
    for key in identities {
        let result = handle
            .authenticate_publickey_with(profile.username.clone(), key, hash_alg, &mut agent)
            .await
            .context("ssh-agent signing failed")?;
        if matches!(result, AuthResult::Success) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(not(unix))]
async fn try_agent(
    _handle: &mut Handle<ClientHandler>,
    _profile: &ConnectionProfile,
) -> Result<bool> {
    Ok(false)
}

async fn try_password(
    handle: &mut Handle<ClientHandler>,
    profile: &ConnectionProfile,
) -> Result<bool> {
    let Some(password) = profile.password.as_deref() else {
        return Ok(false);
    };
    let result = handle
        .authenticate_password(profile.username.clone(), password)
        .await?;
    Ok(matches!(result, AuthResult::Success))
}

#[cfg(test)]
mod tests {
    use super::{AuthStep, auth_plan};
    use crate::app::types::ConnectionProfile;
    use std::path::PathBuf;

    fn profile(key: bool, password: Option<&str>) -> ConnectionProfile {
        ConnectionProfile {
            name: "p".into(),
            username: "root".into(),
            key_path: key.then(|| PathBuf::from("/root/.ssh/id_ed25519")),
            port: 22,
            proxy_address: None,
            password: password.map(str::to_string),
        }
    }

    #[test]
    fn key_then_agent_then_password() {
        assert_eq!(
            auth_plan(&profile(true, Some("vagrant")), true),
            vec![AuthStep::PublicKey, AuthStep::Agent, AuthStep::Password]
        );
    }

    #[test]
    fn agent_only_when_nothing_else_is_configured() {
        assert_eq!(auth_plan(&profile(false, None), true), vec![AuthStep::Agent]);
        assert!(auth_plan(&profile(false, Some("")), false).is_empty());
    }

    #[test]
    fn password_is_the_last_resort() {
        assert_eq!(
            auth_plan(&profile(false, Some("vagrant")), false),
            vec![AuthStep::Password]
        );
    }
}
