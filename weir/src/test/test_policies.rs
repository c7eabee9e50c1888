// Weir: Policy-Enforcing OpenFlow Controller
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use crate::policy::{compile::compile_all, PolicyCache};

use policy_engine::{ActionVerb, Policy, PortMatch, PortSpec};

fn policy(json: serde_json::Value) -> Policy {
    serde_json::from_value(json).unwrap()
}

#[test]
fn document_fields_deserialize_with_defaults() {
    let p = policy(serde_json::json!({
        "id": "p1", "name": "minimal"
    }));
    assert!(p.enabled);
    assert_eq!(p.priority, 0);
    assert!(p.rules.is_empty());
    assert!(p.conditions.is_empty());
    assert!(p.actions.is_empty());
    assert_eq!(p.scenario, "");
}

#[test]
fn scenario_tag_comes_from_the_type_field() {
    let p = policy(serde_json::json!({
        "id": "p1", "name": "tagged", "type": "congestion",
        "enabled": false, "priority": 7
    }));
    assert_eq!(p.scenario, "congestion");
    assert!(!p.enabled);
}

#[test]
fn action_verbs_are_a_closed_vocabulary_with_unknown_fallback() {
    assert_eq!(ActionVerb::from(String::from("deny")), ActionVerb::Deny);
    assert_eq!(ActionVerb::from(String::from("block")), ActionVerb::Deny);
    assert_eq!(ActionVerb::from(String::from("set_priority")), ActionVerb::SetPriority);
    assert_eq!(ActionVerb::from(String::from("qos")), ActionVerb::SetPriority);
    match ActionVerb::from(String::from("teleport")) {
        ActionVerb::Unknown(s) => assert_eq!(s, "teleport"),
        v => panic!("expected the unknown fallback, got {:?}", v),
    }
}

#[test]
fn port_match_notations() {
    assert_eq!(PortMatch::Number(80).spec(), Some(PortSpec::Exact(80)));
    assert_eq!(PortMatch::Text("80".into()).spec(), Some(PortSpec::Exact(80)));
    assert_eq!(PortMatch::Text("80-443".into()).spec(), Some(PortSpec::Range(80, 443)));
    assert_eq!(PortMatch::Text("any".into()).spec(), Some(PortSpec::Any));
    assert_eq!(PortMatch::Text("443-80".into()).spec(), None);
    assert_eq!(PortMatch::Text("http".into()).spec(), None);
    assert!(PortSpec::Range(80, 443).contains(443));
    assert!(!PortSpec::Range(80, 443).contains(444));
}

#[test]
fn unreachable_engine_leaves_the_cache_untouched() {
    // scenario: three consecutive failed poll cycles after one good sync
    let mut cache = PolicyCache::new();
    cache.replace(
        vec![policy(serde_json::json!({
            "id": "p1", "name": "keep me", "priority": 10,
            "rules": [{"match": {"src_ip": "10.0.0.5"}, "action": "deny"}]
        }))],
        1000,
    );
    assert!(cache.is_available());
    let flows_before = compile_all(cache.ordered());

    for _ in 0..3 {
        cache.mark_unavailable(&"connection refused");
        assert!(!cache.is_available());
        assert_eq!(cache.len(), 1);
        assert_eq!(compile_all(cache.ordered()), flows_before);
    }
    assert_eq!(cache.last_sync(), Some(1000));

    // a later successful sync flips the flag back and replaces wholesale
    cache.replace(vec![], 2000);
    assert!(cache.is_available());
    assert!(cache.is_empty());
}

#[test]
fn cache_orders_by_priority_then_id() {
    let mut cache = PolicyCache::new();
    cache.replace(
        vec![
            policy(serde_json::json!({"id": "b", "name": "b", "priority": 5})),
            policy(serde_json::json!({"id": "a", "name": "a", "priority": 5})),
            policy(serde_json::json!({"id": "z", "name": "z", "priority": 90})),
        ],
        0,
    );
    let ids: Vec<&str> = cache.ordered().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["z", "a", "b"]);
    assert_eq!(cache.enabled_count(), 3);
}

#[test]
fn wrapped_and_bare_listings_parse_alike() {
    let bare: Vec<Policy> = serde_json::from_value(serde_json::json!([
        {"id": "p1", "name": "one"}
    ]))
    .unwrap();
    assert_eq!(bare.len(), 1);

    // the wrapped form used by some Policy Engine deployments
    #[derive(serde::Deserialize)]
    struct Wrapped {
        policies: Vec<Policy>,
    }
    let wrapped: Wrapped = serde_json::from_value(serde_json::json!({
        "policies": [{"id": "p1", "name": "one"}]
    }))
    .unwrap();
    assert_eq!(wrapped.policies[0].id, bare[0].id);
}
