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

use crate::topology::{Endpoint, HostEvent, Link, PortInfo, Topology};
use crate::types::{Dpid, MacAddr};

use maplit::btreemap;
use openflow::PortDesc;
use std::net::Ipv4Addr;

const S1: Dpid = Dpid(1);
const S2: Dpid = Dpid(2);
const S3: Dpid = Dpid(3);
const MAC: MacAddr = MacAddr([0, 0, 0, 0, 0, 0xaa]);

fn link(a: Dpid, pa: u32, b: Dpid, pb: u32) -> Link {
    Link::new(Endpoint { dpid: a, port: pa }, Endpoint { dpid: b, port: pb })
}

fn three_switches() -> Topology {
    let mut t = Topology::new();
    t.upsert_switch(S1, 0);
    t.upsert_switch(S2, 0);
    t.upsert_switch(S3, 0);
    t
}

#[test]
fn replace_links_is_idempotent() {
    let mut t = three_switches();
    let snapshot = vec![link(S1, 1, S2, 1), link(S2, 2, S3, 1)];
    t.replace_links(snapshot.clone());
    let first: Vec<Link> = t.links().to_vec();
    t.replace_links(snapshot);
    assert_eq!(t.links(), &first[..]);
    assert_eq!(t.links().len(), 2);
    assert!(t.connected(S1, S3));
}

#[test]
fn stale_links_vanish_by_replacement() {
    let mut t = three_switches();
    t.replace_links(vec![link(S1, 1, S2, 1), link(S2, 2, S3, 1)]);
    assert!(t.connected(S1, S3));
    // next tick only reports one link: the other is implicitly dropped
    t.replace_links(vec![link(S1, 1, S2, 1)]);
    assert_eq!(t.links().len(), 1);
    assert!(t.connected(S1, S2));
    assert!(!t.connected(S1, S3));
}

#[test]
fn links_are_unordered_pairs() {
    let mut t = three_switches();
    t.replace_links(vec![
        link(S1, 1, S2, 1),
        // the same physical link, reported from the other side
        Link::new(Endpoint { dpid: S2, port: 1 }, Endpoint { dpid: S1, port: 1 }),
    ]);
    assert_eq!(t.links().len(), 1);
}

#[test]
fn links_to_unknown_switches_are_dropped() {
    let mut t = three_switches();
    t.replace_links(vec![link(S1, 1, Dpid(99), 1)]);
    assert!(t.links().is_empty());
}

#[test]
fn learn_host_is_idempotent_and_move_aware() {
    let mut t = three_switches();
    assert_eq!(t.learn_host(MAC, S1, 3, None, 10), HostEvent::New);
    assert_eq!(t.learn_host(MAC, S1, 3, None, 20), HostEvent::Refreshed);
    assert_eq!(t.hosts().len(), 1);
    // the newest observation always wins
    assert_eq!(t.learn_host(MAC, S2, 5, None, 30), HostEvent::Moved);
    let host = t.hosts()[0];
    assert_eq!((host.dpid, host.port, host.last_seen), (S2, 5, 30));
}

#[test]
fn learned_ip_is_not_downgraded() {
    let mut t = three_switches();
    t.learn_host(MAC, S1, 3, Some(Ipv4Addr::new(10, 0, 0, 9)), 10);
    t.learn_host(MAC, S1, 3, None, 20);
    assert_eq!(t.hosts()[0].ip, Some(Ipv4Addr::new(10, 0, 0, 9)));
    t.learn_host(MAC, S1, 3, Some(Ipv4Addr::new(10, 0, 0, 10)), 30);
    assert_eq!(t.hosts()[0].ip, Some(Ipv4Addr::new(10, 0, 0, 10)));
}

#[test]
fn stale_hosts_are_swept_by_ttl() {
    let mut t = three_switches();
    t.learn_host(MAC, S1, 3, None, 100);
    t.learn_host(MacAddr([0, 0, 0, 0, 0, 0xbb]), S1, 4, None, 350);
    assert_eq!(t.expire_stale_hosts(420, 300), 1);
    assert_eq!(t.hosts().len(), 1);
    assert_eq!(t.hosts()[0].mac, MacAddr([0, 0, 0, 0, 0, 0xbb]));
}

#[test]
fn removing_a_switch_removes_its_links() {
    let mut t = three_switches();
    t.replace_links(vec![link(S1, 1, S2, 1), link(S2, 2, S3, 1)]);
    t.remove_switch(S2);
    assert_eq!(t.switch_count(), 2);
    assert!(t.links().is_empty());
    assert!(!t.connected(S1, S3));
}

#[test]
fn port_refresh_replaces_the_port_map() {
    let mut t = three_switches();
    let desc = |no: u32, name: &str| PortDesc {
        port_no: no,
        hw_addr: [0, 0, 0, 0, 0, no as u8],
        name: name.to_string(),
        config: 0,
        state: 0,
    };
    t.refresh_ports(S1, &[desc(1, "eth1"), desc(2, "eth2")]);
    assert_eq!(t.switch(S1).unwrap().ports.len(), 2);
    // the next refresh no longer lists eth2
    t.refresh_ports(S1, &[desc(1, "eth1")]);
    assert_eq!(
        t.switch(S1).unwrap().ports,
        btreemap! {
            1 => PortInfo {
                hw_addr: MacAddr([0, 0, 0, 0, 0, 1]),
                name: String::from("eth1"),
                link_down: false,
            },
        }
    );
    // reserved port numbers (OFPP_LOCAL etc.) never enter the map
    t.refresh_ports(S1, &[desc(1, "eth1"), desc(0xffff_fffe, "local")]);
    assert_eq!(t.switch(S1).unwrap().ports.len(), 1);
}
