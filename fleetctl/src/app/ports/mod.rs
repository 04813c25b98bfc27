// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod cluster_manager;
pub mod file_transfer;
pub mod host_output;
pub mod inventory;
pub mod local;
pub mod profile_store;
pub mod remote_exec;

pub use cluster_manager::ClusterManagerPort;
pub use file_transfer::FileTransferPort;
pub use host_output::{HostOutputPort, NoopHostOutput};
pub use inventory::InventoryPort;
pub use local::{DownloadPort, LocalCommandPort, LocalOutput};
pub use profile_store::ProfileStorePort;
pub use remote_exec::RemoteExecPort;
