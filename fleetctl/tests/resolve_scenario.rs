// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use fleetctl::adapters::inventory::decode_inventory;
use fleetctl::app::services::resolve;
use fleetctl::app::types::{Inventory, TargetFilter};

// A runs X/C1, B runs Y/C2; S is the control host and has no agent.
fn inventory() -> Inventory {
    decode_inventory(
        r#"{
            "hosts": [
                {"public_host_name": "a.example", "ip": "10.0.0.1", "host_state": "HEALTHY"},
                {"public_host_name": "b.example", "ip": "10.0.0.2", "host_state": "HEALTHY"}
            ],
            "host_components": [
                {"component_name": "C1", "service_name": "X", "host_name": "a.example", "state": "STARTED"},
                {"component_name": "C2", "service_name": "Y", "host_name": "b.example", "state": "STARTED"}
            ]
        }"#,
    )
    .unwrap()
}

fn addresses(filter: &TargetFilter) -> Vec<String> {
    resolve(filter, &inventory(), "s.example")
        .into_iter()
        .collect()
}

#[test]
fn service_filter_selects_its_hosts() {
    let filter = TargetFilter::from_csv(Some("X"), None, None, false);
    assert_eq!(addresses(&filter), vec!["10.0.0.1"]);
}

#[test]
fn component_filters_union() {
    let filter = TargetFilter::from_csv(None, Some("C1,C2"), None, false);
    assert_eq!(addresses(&filter), vec!["10.0.0.1", "10.0.0.2"]);
}

#[test]
fn explicit_hosts_narrow_the_candidate_set() {
    let filter = TargetFilter::from_csv(Some("X"), None, Some("b.example"), false);
    assert!(addresses(&filter).is_empty());
}

#[test]
fn explicit_hosts_alone_select_exactly_those_agents() {
    let filter = TargetFilter::from_csv(None, None, Some("b.example,unknown.example"), false);
    assert_eq!(addresses(&filter), vec!["10.0.0.2"]);
}

#[test]
fn empty_filter_selects_every_agent() {
    assert_eq!(
        addresses(&TargetFilter::default()),
        vec!["10.0.0.1", "10.0.0.2"]
    );
}

#[test]
fn unknown_service_selects_nothing() {
    let filter = TargetFilter::from_csv(Some("Z"), None, None, false);
    assert!(addresses(&filter).is_empty());
}

#[test]
fn control_host_is_added_even_without_an_agent() {
    let filter = TargetFilter::from_csv(Some("Y"), None, None, true);
    assert_eq!(addresses(&filter), vec!["10.0.0.2", "s.example"]);
}
