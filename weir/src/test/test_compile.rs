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

use crate::policy::compile::{compile_all, compile_policy};
use crate::policy::PolicyCache;
use crate::types::{IDLE_POLICY, TABLE_POLICY};

use openflow::{Action, Instruction, PseudoPort, Timeout, FLOW_MOD_SEND_FLOW_REM};
use policy_engine::Policy;
use std::net::Ipv4Addr;

fn policy(json: serde_json::Value) -> Policy {
    serde_json::from_value(json).unwrap()
}

/// Every output action reachable from the instruction list.
fn output_actions(instructions: &[Instruction]) -> Vec<Action> {
    instructions
        .iter()
        .flat_map(|i| match i {
            Instruction::ApplyActions(a) | Instruction::WriteActions(a) => a.clone(),
            _ => vec![],
        })
        .filter(|a| matches!(a, Action::Output(_)))
        .collect()
}

#[test]
fn deny_policy_compiles_to_one_drop_flow() {
    // priority 10 deny on a source address: one flow-mod, ipv4_src set, no output actions,
    // installed priority 1010
    let p = policy(serde_json::json!({
        "id": "p1", "name": "deny host", "priority": 10,
        "rules": [{"match": {"src_ip": "10.0.0.5"}, "action": "deny"}]
    }));
    let flows = compile_all(&[p]);
    assert_eq!(flows.len(), 1);
    let fm = &flows[0];
    assert_eq!(fm.table_id, TABLE_POLICY);
    assert_eq!(fm.priority, 1010);
    assert_eq!(fm.pattern.ipv4_src, Some(Ipv4Addr::new(10, 0, 0, 5)));
    assert_eq!(fm.pattern.eth_type, Some(0x0800));
    assert!(output_actions(&fm.instructions).is_empty());
    assert_eq!(fm.instructions, vec![Instruction::ClearActions]);
    assert_eq!(fm.idle_timeout, Timeout::ExpiresAfter(IDLE_POLICY));
    assert_eq!(fm.hard_timeout, Timeout::Permanent);
    assert_eq!(fm.flags & FLOW_MOD_SEND_FLOW_REM, FLOW_MOD_SEND_FLOW_REM);
}

#[test]
fn disabled_policy_produces_no_flows() {
    let p = policy(serde_json::json!({
        "id": "p1", "name": "off", "priority": 10, "enabled": false,
        "rules": [{"match": {"src_ip": "10.0.0.5"}, "action": "deny"}]
    }));
    assert!(compile_all(&[p]).is_empty());
}

#[test]
fn tcp_port_condition_pulls_in_protocol_and_ethertype() {
    let p = policy(serde_json::json!({
        "id": "p1", "name": "web", "priority": 1,
        "conditions": [{"field": "dst_port", "operator": "eq", "value": 443}],
        "actions": [{"action": "drop", "domain": "sdn"}]
    }));
    let fm = compile_policy(&p).unwrap();
    assert_eq!(fm.pattern.tcp_dst, Some(443));
    assert_eq!(fm.pattern.ip_proto, Some(6));
    assert_eq!(fm.pattern.eth_type, Some(0x0800));
    assert_eq!(fm.instructions, vec![Instruction::ClearActions]);
}

#[test]
fn runtime_metric_conditions_are_skipped() {
    let p = policy(serde_json::json!({
        "id": "p1", "name": "qos", "priority": 1,
        "conditions": [
            {"field": "latency", "operator": "gt", "value": 50},
            {"field": "src_ip", "operator": "eq", "value": "10.0.0.1"}
        ],
        "actions": [{"action": "drop", "domain": "sdn"}]
    }));
    let fm = compile_policy(&p).unwrap();
    // the metric condition leaves no trace; the address condition still folds
    assert_eq!(fm.pattern.ipv4_src, Some(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(fm.pattern.tcp_src, None);
    assert_eq!(fm.pattern.ip_proto, None);
}

#[test]
fn reroute_targets_a_port_or_normal() {
    let with_port = policy(serde_json::json!({
        "id": "p1", "name": "steer", "priority": 2,
        "conditions": [{"field": "dst_ip", "value": "10.0.0.9"}],
        "actions": [{"action": "reroute", "domain": "sdn", "target": 7}]
    }));
    let fm = compile_policy(&with_port).unwrap();
    assert_eq!(
        fm.instructions,
        vec![
            Instruction::ClearActions,
            Instruction::WriteActions(vec![Action::Output(PseudoPort::Physical(7))]),
        ]
    );

    let without_port = policy(serde_json::json!({
        "id": "p2", "name": "steer", "priority": 2,
        "conditions": [{"field": "dst_ip", "value": "10.0.0.9"}],
        "actions": [{"action": "reroute", "domain": "sdn"}]
    }));
    let fm = compile_policy(&without_port).unwrap();
    assert_eq!(
        fm.instructions,
        vec![
            Instruction::ClearActions,
            Instruction::WriteActions(vec![Action::Output(PseudoPort::Normal)]),
        ]
    );
}

#[test]
fn prioritize_sets_dscp_then_normal_output() {
    let p = policy(serde_json::json!({
        "id": "p1", "name": "voip", "priority": 3,
        "conditions": [{"field": "protocol", "value": "udp"}],
        "actions": [{"action": "prioritize", "domain": "qos", "target": 40}]
    }));
    let fm = compile_policy(&p).unwrap();
    assert_eq!(fm.pattern.ip_proto, Some(17));
    assert_eq!(
        fm.instructions,
        vec![
            Instruction::ApplyActions(vec![Action::SetDscp(40)]),
            Instruction::ClearActions,
            Instruction::WriteActions(vec![Action::Output(PseudoPort::Normal)]),
        ]
    );
}

#[test]
fn mirror_adds_an_output_and_keeps_the_carried_decision() {
    let p = policy(serde_json::json!({
        "id": "p1", "name": "tap", "priority": 4,
        "conditions": [{"field": "src_ip", "value": "10.0.0.3"}],
        "actions": [{"action": "mirror", "domain": "sdn", "parameters": {"port": 9}}]
    }));
    let fm = compile_policy(&p).unwrap();
    // only an apply-action copy; no clear, no write: the table-0 decision stands
    assert_eq!(
        fm.instructions,
        vec![Instruction::ApplyActions(vec![Action::Output(PseudoPort::Physical(9))])]
    );
}

#[test]
fn unknown_action_verb_degrades_to_no_flow() {
    let p = policy(serde_json::json!({
        "id": "p1", "name": "mystery", "priority": 5,
        "conditions": [{"field": "src_ip", "value": "10.0.0.3"}],
        "actions": [{"action": "teleport", "domain": "sdn"}]
    }));
    assert!(compile_policy(&p).is_none());
}

#[test]
fn compilation_follows_cache_order() {
    let mut cache = PolicyCache::new();
    cache.replace(
        vec![
            policy(serde_json::json!({
                "id": "low", "name": "low", "priority": 1,
                "rules": [{"match": {"src_ip": "10.0.1.1"}, "action": "deny"}]
            })),
            policy(serde_json::json!({
                "id": "high", "name": "high", "priority": 70,
                "rules": [{"match": {"src_ip": "10.0.1.2"}, "action": "deny"}]
            })),
        ],
        0,
    );
    let flows = compile_all(cache.ordered());
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0].priority, 1070);
    assert_eq!(flows[1].priority, 1001);
}
