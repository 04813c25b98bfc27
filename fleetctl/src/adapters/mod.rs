// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod ambari;
pub mod cli;
pub mod console;
pub mod inventory;
pub mod local;
pub mod profiles;
pub mod ssh;
