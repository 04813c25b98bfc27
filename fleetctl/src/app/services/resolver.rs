// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::HashSet;

use crate::app::types::{HostRecord, Inventory, TargetFilter, TargetSet};

/// Turns a filter into the concrete address set of one operation.
///
/// Services and components are unioned into a candidate name set; the explicit host
/// list is an AND constraint applied to every agent on top of that union. When the
/// control host is requested it is always part of the result, as its agent IP when
/// the inventory knows it and as the given address otherwise.
pub fn resolve(filter: &TargetFilter, inventory: &Inventory, control_host: &str) -> TargetSet {
    let mut names: HashSet<&str> = HashSet::new();
    for hc in &inventory.host_components {
        if filter.services.contains(&hc.service_name)
            || filter.components.contains(&hc.component_name)
        {
            names.insert(hc.host_name.as_str());
        }
    }
    let control_host = control_host.trim();
    let wants_control = filter.include_control_host && !control_host.is_empty();
    if wants_control {
        names.insert(control_host);
    }

    let mut targets = TargetSet::new();
    for agent in &inventory.hosts {
        if !filter.hosts.is_empty() && !filter.hosts.contains(&agent.public_host_name) {
            continue;
        }
        if names.is_empty() || is_named(agent, &names) {
            targets.insert(agent.ip.clone());
        }
    }

    if wants_control {
        let address = inventory
            .hosts
            .iter()
            .find(|agent| agent.public_host_name == control_host || agent.ip == control_host)
            .map(|agent| agent.ip.as_str())
            .unwrap_or(control_host);
        targets.insert(address);
    }
    targets
}

fn is_named(agent: &HostRecord, names: &HashSet<&str>) -> bool {
    names.contains(agent.public_host_name.as_str()) || names.contains(agent.ip.as_str())
}
