// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
#[error("authentication_failure")]
pub struct AuthenticationFailure;

/// The jump host could not be reached or refused to open the tunnel.
#[derive(Debug, ThisError)]
#[error("proxy {host} failed: {reason}")]
pub struct ProxyFailure {
    pub host: String,
    pub reason: String,
}
