// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod executor;
pub mod logs;
pub mod output;
pub mod playbook;
pub mod properties;
pub mod resolver;
pub mod shell;
pub mod transfer;

pub use executor::{DEFAULT_COMMAND_TIMEOUT, RemoteExecutor};
pub use logs::{LogCollector, LogDownload, LogRequest};
pub use playbook::{PlaybookDeps, PlaybookRunner, TaskOutcome, TaskReport};
pub use resolver::resolve;
pub use transfer::RemoteTransfer;
