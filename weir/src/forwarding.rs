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

//! # Forwarding Engine
//!
//! The per-packet state machine behind every packet-in: learn the source, consult the policy
//! evaluator for IPv4 traffic, resolve the destination to a port or flood, install the reactive
//! flow, and always emit a packet-out for the packet at hand. The decision is returned as a pure
//! value, so the whole machine is testable without a socket in sight.

use crate::discovery;
use crate::policy::evaluate::{evaluate, PacketContext};
use crate::topology::Topology;
use crate::types::{
    Dpid, MacAddr, PortNo, IDLE_DENY, IDLE_REACTIVE, PRIO_ALLOW, PRIO_DENY, PRIO_LEARNING,
    TABLE_POLICY,
};

use etherparse::{InternetSlice, SlicedPacket, TransportSlice};
use log::*;
use openflow::{
    Action, FlowMod, Instruction, Match, PacketOut, Payload, PseudoPort, Timeout,
    FLOW_MOD_SEND_FLOW_REM,
};
use policy_engine::Policy;
use std::net::Ipv4Addr;

/// The outcome of handling one packet-in: flows to install, and at most one packet-out. A denied
/// packet installs a drop flow and emits nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    /// Flow-mods to send to the switch, in order
    pub flows: Vec<FlowMod>,
    /// The packet-out for the packet at hand, if it may be forwarded
    pub packet_out: Option<PacketOut>,
}

impl Verdict {
    fn ignore() -> Self {
        Verdict::default()
    }
}

/// Handle one packet-in on `(dpid, in_port)`: learn, evaluate, resolve, decide.
///
/// Discovery-protocol frames are ignored here (the discovery module consumes them before the
/// forwarding engine runs; the check is repeated for robustness). Non-IPv4 frames contribute
/// learning only and are forwarded by destination address.
pub fn handle_packet_in(
    topology: &mut Topology,
    policies: &[Policy],
    dpid: Dpid,
    in_port: PortNo,
    payload: &Payload,
    now: u64,
) -> Verdict {
    let frame = payload.bytes();
    if frame.len() < 14 || discovery::is_lldp(frame) {
        return Verdict::ignore();
    }

    let dst = MacAddr([frame[0], frame[1], frame[2], frame[3], frame[4], frame[5]]);
    let src = MacAddr([frame[6], frame[7], frame[8], frame[9], frame[10], frame[11]]);

    // extract the 5-tuple context of IPv4 frames, and the sender address of ARP frames
    let mut ctx: Option<PacketContext> = None;
    let mut learned_ip: Option<Ipv4Addr> = None;
    if let Ok(sliced) = SlicedPacket::from_ethernet(frame) {
        if let Some(InternetSlice::Ipv4(ip)) = &sliced.ip {
            let (src_port, dst_port) = match &sliced.transport {
                Some(TransportSlice::Tcp(tcp)) => {
                    (Some(tcp.source_port()), Some(tcp.destination_port()))
                }
                Some(TransportSlice::Udp(udp)) => {
                    (Some(udp.source_port()), Some(udp.destination_port()))
                }
                _ => (None, None),
            };
            ctx = Some(PacketContext {
                src_ip: ip.source_addr(),
                dst_ip: ip.destination_addr(),
                protocol: Some(ip.protocol()),
                src_port,
                dst_port,
            });
            learned_ip = Some(ip.source_addr());
        }
    }
    if learned_ip.is_none() {
        learned_ip = arp_sender_ip(frame);
    }

    // learning happens unconditionally, before any forwarding decision
    topology.learn_host(src, dpid, in_port, learned_ip, now);

    // policy check for IPv4 traffic; a deny installs a short-lived drop flow and ends here
    let mut explicit_allow = false;
    if let Some(ctx) = &ctx {
        let evaluation = evaluate(policies, ctx);
        if !evaluation.allowed {
            info!(
                "Denied {} -> {} on {} (policy {})",
                ctx.src_ip,
                ctx.dst_ip,
                dpid,
                evaluation.policy_id.as_deref().unwrap_or("?")
            );
            return Verdict { flows: vec![deny_flow(ctx)], packet_out: None };
        }
        explicit_allow = evaluation.explicit;
    }

    // destination resolution: known unicast goes out of its learned port, everything else floods
    let out_port = if dst.is_multicast() {
        None
    } else {
        topology.host_port_on(dpid, &dst)
    };

    let mut flows = Vec::new();
    if let Some(port) = out_port {
        let fm = match (explicit_allow, &ctx) {
            (true, Some(ctx)) => allow_flow(ctx, port),
            _ => learning_flow(dst, port),
        };
        flows.push(fm);
    } else {
        trace!("Flooding {} -> {} on {}", src, dst, dpid);
    }

    let out = out_port.map_or(PseudoPort::Flood, PseudoPort::Physical);
    let packet_out = PacketOut {
        payload: match payload.buffer_id() {
            Some(id) => Payload::Buffered(id, vec![]),
            None => Payload::NotBuffered(frame.to_vec()),
        },
        in_port: Some(in_port),
        actions: vec![Action::Output(out)],
    };

    Verdict { flows, packet_out: Some(packet_out) }
}

/// The reactive drop flow for a denied IPv4 pair: exact addresses and protocol, short idle
/// timeout, and no instructions at all, which discards the packet at the end of the pipeline.
fn deny_flow(ctx: &PacketContext) -> FlowMod {
    let mut pattern = Match::any();
    pattern.eth_type = Some(0x0800);
    pattern.ipv4_src = Some(ctx.src_ip);
    pattern.ipv4_dst = Some(ctx.dst_ip);
    pattern.ip_proto = ctx.protocol;
    let mut fm = FlowMod::add_flow(crate::types::TABLE_DEFAULT, PRIO_DENY, pattern, vec![]);
    fm.idle_timeout = Timeout::ExpiresAfter(IDLE_DENY);
    fm.flags = FLOW_MOD_SEND_FLOW_REM;
    fm
}

/// The reactive flow after an explicit allow: IP-qualified match, forwarding decision written
/// into the action set, and continuation into the policy table.
fn allow_flow(ctx: &PacketContext, port: PortNo) -> FlowMod {
    let mut pattern = Match::any();
    pattern.eth_type = Some(0x0800);
    pattern.ipv4_src = Some(ctx.src_ip);
    pattern.ipv4_dst = Some(ctx.dst_ip);
    pattern.ip_proto = ctx.protocol;
    match ctx.protocol {
        Some(6) => {
            pattern.tcp_src = ctx.src_port;
            pattern.tcp_dst = ctx.dst_port;
        }
        Some(17) => {
            pattern.udp_src = ctx.src_port;
            pattern.udp_dst = ctx.dst_port;
        }
        _ => (),
    }
    reactive(pattern, PRIO_ALLOW, port)
}

/// The plain learning flow: destination address match at learning priority.
fn learning_flow(dst: MacAddr, port: PortNo) -> FlowMod {
    let mut pattern = Match::any();
    pattern.eth_dst = Some(dst.0);
    reactive(pattern, PRIO_LEARNING, port)
}

fn reactive(pattern: Match, priority: u16, port: PortNo) -> FlowMod {
    let mut fm = FlowMod::add_flow(
        crate::types::TABLE_DEFAULT,
        priority,
        pattern,
        vec![
            Instruction::WriteActions(vec![Action::Output(PseudoPort::Physical(port))]),
            Instruction::GotoTable(TABLE_POLICY),
        ],
    );
    fm.idle_timeout = Timeout::ExpiresAfter(IDLE_REACTIVE);
    fm.flags = FLOW_MOD_SEND_FLOW_REM;
    fm
}

/// Extract the sender hardware/protocol address of an Ethernet ARP frame, for host learning.
fn arp_sender_ip(frame: &[u8]) -> Option<Ipv4Addr> {
    if frame.len() < 14 + 28 {
        return None;
    }
    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);
    if ethertype != 0x0806 {
        return None;
    }
    // IPv4-over-Ethernet ARP: hardware type 1, protocol type 0x0800
    let htype = u16::from_be_bytes([frame[14], frame[15]]);
    let ptype = u16::from_be_bytes([frame[16], frame[17]]);
    if htype != 1 || ptype != 0x0800 {
        return None;
    }
    Some(Ipv4Addr::new(frame[28], frame[29], frame[30], frame[31]))
}
