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

//! # Policy Document Types
//!
//! The declarative objects served by the Policy Engine. A policy carries an ordered list of rules
//! (each a conjunction of conditions with a verdict) used for per-packet evaluation, and an
//! ordered list of actions used when the policy is compiled into flow-table entries.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single policy document, as served by the Policy Engine.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Policy {
    /// Unique policy id
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Scenario / type tag assigned by the Policy Engine
    #[serde(rename = "type", default)]
    pub scenario: String,
    /// Whether the policy takes part in enforcement
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Priority; higher wins
    #[serde(default)]
    pub priority: i64,
    /// Ordered rule list for per-packet evaluation
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Ordered condition list for proactive compilation
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Ordered action list for proactive compilation
    #[serde(default)]
    pub actions: Vec<PolicyAction>,
}

fn default_enabled() -> bool {
    true
}

/// A rule inside a policy: all conditions must match, then the verdict applies.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Rule {
    /// Nested match-block notation
    #[serde(rename = "match", default)]
    pub match_block: Option<MatchBlock>,
    /// Field/operator/value notation
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Verdict or action verb of the rule
    #[serde(default)]
    pub action: ActionVerb,
}

/// The nested match-block notation of a rule: IP (exact or CIDR), protocol (name, number or
/// `any`) and port (exact, `low-high` range, or `any`) constraints.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MatchBlock {
    /// Source IP, exact (`10.0.0.5`) or CIDR (`10.0.0.0/24`)
    #[serde(default)]
    pub src_ip: Option<String>,
    /// Destination IP, exact or CIDR
    #[serde(default)]
    pub dst_ip: Option<String>,
    /// Protocol name (`tcp`), number (`6`) or `any`
    #[serde(default)]
    pub protocol: Option<ProtocolMatch>,
    /// Source port: exact, `low-high`, or `any`
    #[serde(default)]
    pub src_port: Option<PortMatch>,
    /// Destination port: exact, `low-high`, or `any`
    #[serde(default)]
    pub dst_port: Option<PortMatch>,
}

/// A field/operator/value condition.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Condition {
    /// Field name (`src_ip`, `dst_ip`, `protocol`, `src_port`, `dst_port`, or a runtime metric)
    pub field: String,
    /// Comparison operator; only equality is compilable
    #[serde(default = "default_operator")]
    pub operator: String,
    /// Comparison value (string or number, depending on the field)
    pub value: serde_json::Value,
}

fn default_operator() -> String {
    String::from("eq")
}

impl Condition {
    /// Whether the operator is an equality comparison.
    pub fn is_equality(&self) -> bool {
        matches!(self.operator.as_str(), "eq" | "==" | "equals" | "is")
    }

    /// The condition value rendered as a string (numbers lose no precision).
    pub fn value_str(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            v => v.to_string(),
        }
    }
}

/// Protocol constraint: a name, a number, or the `any` wildcard.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ProtocolMatch {
    /// Numeric IP protocol
    Number(u8),
    /// Protocol name (`tcp`, `udp`, `icmp`) or `any`
    Name(String),
}

impl ProtocolMatch {
    /// Resolve to an IP protocol number. `None` means "any" (wildcard) — either the explicit
    /// `any` keyword or a name this controller does not know.
    pub fn number(&self) -> Option<u8> {
        match self {
            ProtocolMatch::Number(n) => Some(*n),
            ProtocolMatch::Name(name) => match name.to_ascii_lowercase().as_str() {
                "tcp" => Some(6),
                "udp" => Some(17),
                "icmp" => Some(1),
                _ => name.parse().ok(),
            },
        }
    }

    /// Whether this constraint is the explicit `any` wildcard.
    pub fn is_any(&self) -> bool {
        matches!(self, ProtocolMatch::Name(name) if name.eq_ignore_ascii_case("any"))
    }
}

/// Port constraint notation: an exact number, a `low-high` range, or `any`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum PortMatch {
    /// Exact numeric port
    Number(u16),
    /// Textual notation: exact (`"80"`), range (`"80-443"`) or `"any"`
    Text(String),
}

/// Parsed form of a [`PortMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    /// Matches every port
    Any,
    /// Matches exactly one port
    Exact(u16),
    /// Matches an inclusive range
    Range(u16, u16),
}

impl PortMatch {
    /// Parse the notation. Returns `None` for text that is neither a number, a `low-high` range,
    /// nor `any` — callers treat such conditions as unmatchable.
    pub fn spec(&self) -> Option<PortSpec> {
        match self {
            PortMatch::Number(n) => Some(PortSpec::Exact(*n)),
            PortMatch::Text(text) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("any") {
                    return Some(PortSpec::Any);
                }
                if let Ok(n) = text.parse::<u16>() {
                    return Some(PortSpec::Exact(n));
                }
                let mut parts = text.splitn(2, '-');
                let low = parts.next()?.trim().parse::<u16>().ok()?;
                let high = parts.next()?.trim().parse::<u16>().ok()?;
                if low <= high {
                    Some(PortSpec::Range(low, high))
                } else {
                    None
                }
            }
        }
    }
}

impl PortSpec {
    /// Whether the given port satisfies the constraint.
    pub fn contains(&self, port: u16) -> bool {
        match self {
            PortSpec::Any => true,
            PortSpec::Exact(p) => *p == port,
            PortSpec::Range(low, high) => (*low..=*high).contains(&port),
        }
    }
}

/// The closed vocabulary of policy action verbs. Anything the Policy Engine sends outside this
/// vocabulary becomes [`ActionVerb::Unknown`] and degrades to observed-but-not-enforced.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ActionVerb {
    /// Permit the traffic
    Allow,
    /// Reject the traffic
    Deny,
    /// Discard matching packets
    Drop,
    /// Steer matching packets to a port (or back to normal processing)
    Reroute,
    /// Mark matching packets with a DSCP value
    Prioritize,
    /// Copy matching packets to a mirror port
    Mirror,
    /// Tag matching packets with a VLAN priority
    SetPriority,
    /// A verb this controller does not know
    Unknown(String),
}

impl Default for ActionVerb {
    fn default() -> Self {
        ActionVerb::Allow
    }
}

impl From<String> for ActionVerb {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "allow" | "accept" | "permit" => ActionVerb::Allow,
            "deny" | "block" | "reject" => ActionVerb::Deny,
            "drop" => ActionVerb::Drop,
            "reroute" | "redirect" => ActionVerb::Reroute,
            "prioritize" => ActionVerb::Prioritize,
            "mirror" => ActionVerb::Mirror,
            "set_priority" | "qos" => ActionVerb::SetPriority,
            _ => ActionVerb::Unknown(s),
        }
    }
}

impl From<ActionVerb> for String {
    fn from(verb: ActionVerb) -> Self {
        verb.to_string()
    }
}

impl fmt::Display for ActionVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionVerb::Allow => write!(f, "allow"),
            ActionVerb::Deny => write!(f, "deny"),
            ActionVerb::Drop => write!(f, "drop"),
            ActionVerb::Reroute => write!(f, "reroute"),
            ActionVerb::Prioritize => write!(f, "prioritize"),
            ActionVerb::Mirror => write!(f, "mirror"),
            ActionVerb::SetPriority => write!(f, "set_priority"),
            ActionVerb::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// A compiled-side action of a policy document.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PolicyAction {
    /// The action verb
    #[serde(rename = "action", alias = "type")]
    pub verb: ActionVerb,
    /// Action domain, `sdn` or `qos`
    #[serde(default)]
    pub domain: String,
    /// Verb-specific target (a port number, a DSCP value, ...)
    #[serde(default)]
    pub target: Option<serde_json::Value>,
    /// Free-form verb parameters
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl PolicyAction {
    /// The target interpreted as an integer, taken from `target` or from a parameter with the
    /// given name.
    pub fn target_u32(&self, param: &str) -> Option<u32> {
        let from_value = |v: &serde_json::Value| -> Option<u32> {
            match v {
                serde_json::Value::Number(n) => n.as_u64().map(|n| n as u32),
                serde_json::Value::String(s) => s.parse().ok(),
                _ => None,
            }
        };
        self.target
            .as_ref()
            .and_then(from_value)
            .or_else(|| self.parameters.get(param).and_then(from_value))
    }
}
