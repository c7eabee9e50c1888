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

//! # Policy Compiler
//!
//! Translates cached policy documents into proactive flow-table entries for the dedicated policy
//! table, independent of any single packet. Compilation runs whenever the cached set changes and
//! whenever a switch (re)connects: the policy table is cleared and every enabled policy is
//! synthesized into one flow-mod, in descending priority order.
//!
//! Table semantics: default-table entries carry the forwarding decision in the packet's action
//! set and continue into the policy table. A matching policy entry may clear that decision
//! (drop), replace it (reroute), decorate the packet first (prioritize, set_priority), or copy
//! it out (mirror). A packet no policy matches keeps the carried decision, which executes at the
//! end of the pipeline.

use crate::policy::evaluate::proto_number;
use crate::types::{IDLE_POLICY, POLICY_PRIORITY_OFFSET, TABLE_POLICY};

use log::*;
use openflow::{
    Action, FlowMod, Instruction, Match, PseudoPort, Timeout, FLOW_MOD_SEND_FLOW_REM,
};
use policy_engine::{ActionVerb, Condition, MatchBlock, Policy, PolicyAction, PortSpec};

/// Fields a condition can constrain that exist only at runtime; they cannot be expressed as a
/// static match and are skipped during compilation.
const RUNTIME_METRICS: [&str; 4] = ["latency", "bandwidth", "jitter", "packet_loss"];

/// Compile every enabled policy into its flow-mod, in the cache's order (descending priority).
/// Disabled policies and policies without an expressible action produce nothing.
pub fn compile_all(policies: &[Policy]) -> Vec<FlowMod> {
    policies.iter().filter_map(compile_policy).collect()
}

/// Compile one policy document into a single flow-mod for the policy table, or `None` when the
/// policy is disabled or nothing of it is enforceable.
pub fn compile_policy(policy: &Policy) -> Option<FlowMod> {
    if !policy.enabled {
        return None;
    }

    let mut pattern = Match::any();
    for cond in &policy.conditions {
        fold_condition(&mut pattern, cond, &policy.name);
    }
    // the first rule contributes its match block and conditions as well
    if let Some(rule) = policy.rules.first() {
        if let Some(block) = &rule.match_block {
            fold_match_block(&mut pattern, block, &policy.name);
        }
        for cond in &rule.conditions {
            fold_condition(&mut pattern, cond, &policy.name);
        }
    }

    let instructions = match synthesize_instructions(policy) {
        Some(instructions) => instructions,
        None => {
            warn!("Policy '{}' has no enforceable action, not compiled", policy.name);
            return None;
        }
    };

    let priority = (policy.priority + POLICY_PRIORITY_OFFSET).max(1).min(u16::MAX as i64) as u16;
    let mut fm = FlowMod::add_flow(TABLE_POLICY, priority, pattern, instructions);
    fm.idle_timeout = Timeout::ExpiresAfter(IDLE_POLICY);
    fm.hard_timeout = Timeout::Permanent;
    fm.flags = FLOW_MOD_SEND_FLOW_REM;
    Some(fm)
}

/// Fold an equality condition into the match. Non-equality operators, runtime metrics, CIDR
/// blocks and port ranges cannot be expressed as a static exact match and are skipped.
fn fold_condition(pattern: &mut Match, cond: &Condition, policy: &str) {
    if RUNTIME_METRICS.contains(&cond.field.as_str()) {
        debug!(
            "Policy '{}': condition on runtime metric '{}' cannot be compiled, skipped",
            policy, cond.field
        );
        return;
    }
    if !cond.is_equality() {
        debug!(
            "Policy '{}': condition operator '{}' cannot be compiled, skipped",
            policy, cond.operator
        );
        return;
    }
    let value = cond.value_str();
    match cond.field.as_str() {
        "src_ip" | "source_ip" => {
            if let Some(ip) = exact_ip(&value) {
                pattern.ipv4_src = Some(ip);
                pattern.eth_type = Some(0x0800);
            }
        }
        "dst_ip" | "destination_ip" => {
            if let Some(ip) = exact_ip(&value) {
                pattern.ipv4_dst = Some(ip);
                pattern.eth_type = Some(0x0800);
            }
        }
        // ports compile for TCP only; the protocol follows automatically
        "src_port" | "source_port" => {
            if let Ok(port) = value.parse::<u16>() {
                pattern.tcp_src = Some(port);
                pattern.ip_proto = Some(6);
                pattern.eth_type = Some(0x0800);
            }
        }
        "dst_port" | "destination_port" => {
            if let Ok(port) = value.parse::<u16>() {
                pattern.tcp_dst = Some(port);
                pattern.ip_proto = Some(6);
                pattern.eth_type = Some(0x0800);
            }
        }
        "protocol" => {
            if let Some(proto) = proto_number(&value) {
                pattern.ip_proto = Some(proto);
                pattern.eth_type = Some(0x0800);
            }
        }
        field => {
            debug!("Policy '{}': condition field '{}' cannot be compiled, skipped", policy, field);
        }
    }
}

fn fold_match_block(pattern: &mut Match, block: &MatchBlock, policy: &str) {
    if let Some(spec) = &block.src_ip {
        if let Some(ip) = exact_ip(spec) {
            pattern.ipv4_src = Some(ip);
            pattern.eth_type = Some(0x0800);
        } else {
            debug!("Policy '{}': source IP '{}' is not an exact address, skipped", policy, spec);
        }
    }
    if let Some(spec) = &block.dst_ip {
        if let Some(ip) = exact_ip(spec) {
            pattern.ipv4_dst = Some(ip);
            pattern.eth_type = Some(0x0800);
        } else {
            debug!(
                "Policy '{}': destination IP '{}' is not an exact address, skipped",
                policy, spec
            );
        }
    }
    if let Some(proto) = &block.protocol {
        if let Some(n) = proto.number() {
            pattern.ip_proto = Some(n);
            pattern.eth_type = Some(0x0800);
        }
    }
    if let Some(Some(PortSpec::Exact(port))) = block.src_port.as_ref().map(|p| p.spec()) {
        pattern.tcp_src = Some(port);
        pattern.ip_proto = Some(6);
        pattern.eth_type = Some(0x0800);
    }
    if let Some(Some(PortSpec::Exact(port))) = block.dst_port.as_ref().map(|p| p.spec()) {
        pattern.tcp_dst = Some(port);
        pattern.ip_proto = Some(6);
        pattern.eth_type = Some(0x0800);
    }
}

fn exact_ip(spec: &str) -> Option<std::net::Ipv4Addr> {
    let spec = spec.trim();
    if spec.contains('/') {
        return None;
    }
    spec.parse().ok()
}

/// Synthesize the instruction list from the policy's action list, falling back to the first
/// rule's verdict when the list is empty. Returns `None` when nothing is enforceable.
fn synthesize_instructions(policy: &Policy) -> Option<Vec<Instruction>> {
    let verbs: Vec<&PolicyAction> = policy.actions.iter().collect();
    if verbs.is_empty() {
        // rule-notation policy: the verdict of the first rule decides
        return match policy.rules.first().map(|r| &r.action) {
            Some(ActionVerb::Deny) | Some(ActionVerb::Drop) => Some(vec![Instruction::ClearActions]),
            Some(ActionVerb::Allow) => Some(vec![]),
            Some(ActionVerb::Unknown(verb)) => {
                warn!("Policy '{}' carries unknown action '{}', treated as no-op", policy.name, verb);
                None
            }
            _ => None,
        };
    }

    // a drop anywhere in the list wins outright: the packet is not forwarded
    if verbs.iter().any(|a| matches!(a.verb, ActionVerb::Drop | ActionVerb::Deny)) {
        return Some(vec![Instruction::ClearActions]);
    }

    let mut decorations: Vec<Action> = Vec::new();
    let mut forwarding: Option<Vec<Instruction>> = None;
    let mut enforceable = false;
    for action in verbs {
        match &action.verb {
            ActionVerb::Reroute => {
                let out = action
                    .target_u32("port")
                    .map(|p| PseudoPort::Physical(p))
                    .unwrap_or(PseudoPort::Normal);
                forwarding = Some(vec![
                    Instruction::ClearActions,
                    Instruction::WriteActions(vec![Action::Output(out)]),
                ]);
                enforceable = true;
            }
            ActionVerb::Prioritize => {
                let dscp = action.target_u32("dscp").unwrap_or(46) as u8;
                decorations.push(Action::SetDscp(dscp));
                forwarding.get_or_insert_with(|| vec![
                    Instruction::ClearActions,
                    Instruction::WriteActions(vec![Action::Output(PseudoPort::Normal)]),
                ]);
                enforceable = true;
            }
            ActionVerb::SetPriority => {
                let pcp = action.target_u32("priority").unwrap_or(5) as u8;
                decorations.push(Action::SetVlanPcp(pcp));
                forwarding.get_or_insert_with(|| vec![
                    Instruction::ClearActions,
                    Instruction::WriteActions(vec![Action::Output(PseudoPort::Normal)]),
                ]);
                enforceable = true;
            }
            ActionVerb::Mirror => match action.target_u32("port") {
                // copy to the mirror port, keep the carried forwarding decision
                Some(port) => {
                    decorations.push(Action::Output(PseudoPort::Physical(port)));
                    enforceable = true;
                }
                None => {
                    warn!("Policy '{}': mirror action without a port, skipped", policy.name);
                }
            },
            ActionVerb::Allow => {
                enforceable = true;
            }
            ActionVerb::Unknown(verb) => {
                warn!(
                    "Policy '{}' carries unknown action '{}', treated as no-op",
                    policy.name, verb
                );
            }
            // drops were handled above
            ActionVerb::Drop | ActionVerb::Deny => (),
        }
    }
    if !enforceable {
        return None;
    }

    let mut instructions = Vec::new();
    if !decorations.is_empty() {
        instructions.push(Instruction::ApplyActions(decorations));
    }
    if let Some(mut fw) = forwarding {
        instructions.append(&mut fw);
    }
    Some(instructions)
}
