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

//! # Local Policy Evaluator
//!
//! Per-packet allow/deny decision against the cached policy set. The evaluator is stateless
//! given its inputs: policies are walked in the cache's order, rules in listed order, and the
//! first matching rule short-circuits with its verdict. An empty policy set, or a packet no rule
//! matches, defaults to allow.

use policy_engine::{ActionVerb, Condition, MatchBlock, Policy, PortSpec, Rule};

use log::*;
use std::net::Ipv4Addr;

/// The 5-tuple-like context a packet is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketContext {
    /// IPv4 source address
    pub src_ip: Ipv4Addr,
    /// IPv4 destination address
    pub dst_ip: Ipv4Addr,
    /// IP protocol number, when known
    pub protocol: Option<u8>,
    /// Transport source port, when the protocol carries one
    pub src_port: Option<u16>,
    /// Transport destination port, when the protocol carries one
    pub dst_port: Option<u16>,
}

/// The outcome of evaluating a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Whether the packet may be forwarded
    pub allowed: bool,
    /// Whether a rule explicitly produced the verdict (as opposed to the default)
    pub explicit: bool,
    /// The id of the deciding policy, if any
    pub policy_id: Option<String>,
}

impl Evaluation {
    fn default_allow() -> Self {
        Evaluation { allowed: true, explicit: false, policy_id: None }
    }
}

/// Evaluate a packet context against the cached policy set (already in evaluation order).
/// Disabled policies are skipped. Returns the default allow when nothing matches.
pub fn evaluate(policies: &[Policy], ctx: &PacketContext) -> Evaluation {
    for policy in policies.iter().filter(|p| p.enabled) {
        for rule in &policy.rules {
            if rule_matches(rule, ctx) {
                let allowed = !matches!(rule.action, ActionVerb::Deny | ActionVerb::Drop);
                trace!(
                    "Policy '{}' rule matched {:?}: {}",
                    policy.name,
                    ctx,
                    if allowed { "allow" } else { "deny" }
                );
                return Evaluation { allowed, explicit: true, policy_id: Some(policy.id.clone()) };
            }
        }
    }
    Evaluation::default_allow()
}

/// A rule matches when its match block (if present) and all of its conditions match.
fn rule_matches(rule: &Rule, ctx: &PacketContext) -> bool {
    if let Some(block) = &rule.match_block {
        if !match_block_matches(block, ctx) {
            return false;
        }
    }
    rule.conditions.iter().all(|c| condition_matches(c, ctx))
}

fn match_block_matches(block: &MatchBlock, ctx: &PacketContext) -> bool {
    if let Some(spec) = &block.src_ip {
        if !ip_matches(spec, ctx.src_ip) {
            return false;
        }
    }
    if let Some(spec) = &block.dst_ip {
        if !ip_matches(spec, ctx.dst_ip) {
            return false;
        }
    }
    if let Some(proto) = &block.protocol {
        if !proto.is_any() {
            match (proto.number(), ctx.protocol) {
                (Some(want), Some(have)) if want == have => (),
                _ => return false,
            }
        }
    }
    if !port_matches(&block.src_port, ctx.src_port) {
        return false;
    }
    if !port_matches(&block.dst_port, ctx.dst_port) {
        return false;
    }
    true
}

fn port_matches(want: &Option<policy_engine::PortMatch>, have: Option<u16>) -> bool {
    match want {
        None => true,
        Some(pm) => match pm.spec() {
            Some(PortSpec::Any) => true,
            Some(spec) => have.map_or(false, |p| spec.contains(p)),
            // unparsable notation never matches
            None => false,
        },
    }
}

/// Field/operator/value notation. Fields outside the packet context (runtime metrics such as
/// latency or bandwidth) cannot match a packet and fail the condition.
fn condition_matches(cond: &Condition, ctx: &PacketContext) -> bool {
    let value = cond.value_str();
    let eq = cond.is_equality();
    let result = match cond.field.as_str() {
        "src_ip" | "source_ip" => ip_matches(&value, ctx.src_ip),
        "dst_ip" | "destination_ip" => ip_matches(&value, ctx.dst_ip),
        "protocol" => match proto_number(&value) {
            None => true, // "any"
            want => want == ctx.protocol,
        },
        "src_port" | "source_port" => text_port_matches(&value, ctx.src_port),
        "dst_port" | "destination_port" => text_port_matches(&value, ctx.dst_port),
        field => {
            trace!("Condition on field '{}' is not evaluable per packet", field);
            return false;
        }
    };
    if eq {
        result
    } else {
        !result
    }
}

fn text_port_matches(value: &str, have: Option<u16>) -> bool {
    match policy_engine::PortMatch::Text(value.to_string()).spec() {
        Some(PortSpec::Any) => true,
        Some(spec) => have.map_or(false, |p| spec.contains(p)),
        None => false,
    }
}

/// Resolve a protocol value to a number; `None` stands for the `any` wildcard.
pub(crate) fn proto_number(value: &str) -> Option<u8> {
    match value.to_ascii_lowercase().as_str() {
        "any" | "" => None,
        "tcp" => Some(6),
        "udp" => Some(17),
        "icmp" => Some(1),
        v => v.parse().ok(),
    }
}

/// Whether `ip` matches the textual spec: an exact address or a `a.b.c.d/len` CIDR block.
/// Malformed specs never match.
pub(crate) fn ip_matches(spec: &str, ip: Ipv4Addr) -> bool {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("any") || spec == "*" {
        return true;
    }
    match spec.split_once('/') {
        None => spec.parse::<Ipv4Addr>().map_or(false, |want| want == ip),
        Some((base, len)) => {
            let base: Ipv4Addr = match base.parse() {
                Ok(b) => b,
                Err(_) => return false,
            };
            let len: u32 = match len.parse() {
                Ok(l) if l <= 32 => l,
                _ => return false,
            };
            let mask = if len == 0 { 0 } else { u32::MAX << (32 - len) };
            u32::from(ip) & mask == u32::from(base) & mask
        }
    }
}
