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

use crate::forwarding::handle_packet_in;
use crate::policy::PolicyCache;
use crate::test::frames;
use crate::topology::Topology;
use crate::types::{Dpid, MacAddr, IDLE_DENY, PRIO_ALLOW, PRIO_DENY, PRIO_LEARNING};

use openflow::{Action, Instruction, Payload, PseudoPort, Timeout};
use policy_engine::Policy;
use std::net::Ipv4Addr;

const SW: Dpid = Dpid(0xa1);
const MAC_A: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x0a];
const MAC_B: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x0b];

fn policies(json: Vec<serde_json::Value>) -> PolicyCache {
    let mut cache = PolicyCache::new();
    cache.replace(
        json.into_iter()
            .map(|j| serde_json::from_value::<Policy>(j).unwrap())
            .collect(),
        0,
    );
    cache
}

fn topo() -> Topology {
    let mut topology = Topology::new();
    topology.upsert_switch(SW, 0);
    topology
}

#[test]
fn unknown_destination_floods_without_reactive_flow() {
    let mut topology = topo();
    let frame = frames::ipv4_tcp(MAC_A, MAC_B, [10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
    let verdict = handle_packet_in(
        &mut topology,
        &[],
        SW,
        1,
        &Payload::NotBuffered(frame.clone()),
        100,
    );

    assert!(verdict.flows.is_empty());
    let po = verdict.packet_out.expect("flooded packets still go out");
    assert_eq!(po.actions, vec![Action::Output(PseudoPort::Flood)]);
    assert_eq!(po.in_port, Some(1));
    assert_eq!(po.payload, Payload::NotBuffered(frame));

    // the source was learned nevertheless
    let host = topology.hosts().into_iter().find(|h| h.mac == MacAddr(MAC_A)).unwrap();
    assert_eq!((host.dpid, host.port), (SW, 1));
    assert_eq!(host.ip, Some(Ipv4Addr::new(10, 0, 0, 1)));
}

#[test]
fn known_destination_installs_learning_flow_and_unicasts() {
    let mut topology = topo();
    topology.learn_host(MacAddr(MAC_B), SW, 7, None, 50);

    let frame = frames::ipv4_tcp(MAC_A, MAC_B, [10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
    let verdict =
        handle_packet_in(&mut topology, &[], SW, 1, &Payload::NotBuffered(frame), 100);

    assert_eq!(verdict.flows.len(), 1);
    let fm = &verdict.flows[0];
    // no explicit allow decision was made, so the flow matches the destination address only
    assert_eq!(fm.priority, PRIO_LEARNING);
    assert_eq!(fm.pattern.eth_dst, Some(MAC_B));
    assert_eq!(fm.pattern.ipv4_dst, None);
    assert!(fm
        .instructions
        .contains(&Instruction::WriteActions(vec![Action::Output(PseudoPort::Physical(7))])));

    let po = verdict.packet_out.unwrap();
    assert_eq!(po.actions, vec![Action::Output(PseudoPort::Physical(7))]);
}

#[test]
fn denied_packet_installs_drop_flow_and_emits_nothing() {
    let mut topology = topo();
    topology.learn_host(MacAddr(MAC_B), SW, 7, None, 50);
    let cache = policies(vec![serde_json::json!({
        "id": "deny", "name": "deny", "priority": 10,
        "rules": [{"match": {"src_ip": "10.0.0.1"}, "action": "deny"}]
    })]);

    let frame = frames::ipv4_tcp(MAC_A, MAC_B, [10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
    let verdict =
        handle_packet_in(&mut topology, cache.ordered(), SW, 1, &Payload::NotBuffered(frame), 100);

    assert!(verdict.packet_out.is_none());
    assert_eq!(verdict.flows.len(), 1);
    let fm = &verdict.flows[0];
    assert_eq!(fm.priority, PRIO_DENY);
    assert_eq!(fm.idle_timeout, Timeout::ExpiresAfter(IDLE_DENY));
    assert_eq!(fm.pattern.ipv4_src, Some(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(fm.pattern.ipv4_dst, Some(Ipv4Addr::new(10, 0, 0, 2)));
    assert_eq!(fm.pattern.ip_proto, Some(6));
    assert!(fm.instructions.is_empty());
}

#[test]
fn explicit_allow_installs_ip_qualified_flow() {
    let mut topology = topo();
    topology.learn_host(MacAddr(MAC_B), SW, 7, None, 50);
    let cache = policies(vec![serde_json::json!({
        "id": "allow", "name": "allow web", "priority": 10,
        "rules": [{"match": {"dst_port": "80-443"}, "action": "allow"}]
    })]);

    let frame = frames::ipv4_tcp(MAC_A, MAC_B, [10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
    let verdict =
        handle_packet_in(&mut topology, cache.ordered(), SW, 1, &Payload::NotBuffered(frame), 100);

    assert_eq!(verdict.flows.len(), 1);
    let fm = &verdict.flows[0];
    assert_eq!(fm.priority, PRIO_ALLOW);
    assert_eq!(fm.pattern.ipv4_src, Some(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(fm.pattern.tcp_dst, Some(80));
    assert!(verdict.packet_out.is_some());
}

#[test]
fn lldp_frames_are_ignored() {
    let mut topology = topo();
    let frame = crate::discovery::build_lldp(Dpid(0xb2), 3, MacAddr([0; 6]));
    let verdict = handle_packet_in(&mut topology, &[], SW, 1, &Payload::NotBuffered(frame), 100);
    assert!(verdict.flows.is_empty());
    assert!(verdict.packet_out.is_none());
    assert!(topology.hosts().is_empty());
}

#[test]
fn arp_learning_captures_the_sender_address() {
    let mut topology = topo();
    let frame = frames::arp(MAC_A, [10, 0, 0, 1]);
    let verdict = handle_packet_in(&mut topology, &[], SW, 2, &Payload::NotBuffered(frame), 100);
    // broadcast destination: flood, no reactive flow
    assert!(verdict.flows.is_empty());
    assert_eq!(
        verdict.packet_out.unwrap().actions,
        vec![Action::Output(PseudoPort::Flood)]
    );
    let host = topology.hosts().into_iter().find(|h| h.mac == MacAddr(MAC_A)).unwrap();
    assert_eq!(host.ip, Some(Ipv4Addr::new(10, 0, 0, 1)));
}

#[test]
fn buffered_packets_reference_the_buffer_in_the_packet_out() {
    let mut topology = topo();
    let frame = frames::ipv4_tcp(MAC_A, MAC_B, [10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
    let verdict =
        handle_packet_in(&mut topology, &[], SW, 1, &Payload::Buffered(77, frame), 100);
    let po = verdict.packet_out.unwrap();
    assert_eq!(po.payload, Payload::Buffered(77, vec![]));
}
