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

use crate::discovery::{build_lldp, is_lldp, parse_lldp, DiscoveryState};
use crate::topology::Endpoint;
use crate::types::{Dpid, MacAddr};

const S1: Dpid = Dpid(0xa1);
const S2: Dpid = Dpid(0xb2);

#[test]
fn lldp_probe_round_trip() {
    let frame = build_lldp(S1, 42, MacAddr([0, 1, 2, 3, 4, 5]));
    assert!(is_lldp(&frame));
    assert_eq!(parse_lldp(&frame), Some((S1, 42)));
}

#[test]
fn foreign_lldp_speakers_are_ignored() {
    // a minimal LLDP frame with a MAC-address chassis id (subtype 4), as a real switch sends it
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);
    frame.extend_from_slice(&[0; 6]);
    frame.extend_from_slice(&0x88ccu16.to_be_bytes());
    frame.extend_from_slice(&[0x02, 0x07, 0x04, 0, 1, 2, 3, 4, 5]); // chassis, subtype 4
    frame.extend_from_slice(&[0x04, 0x02, 0x05, 0x31]); // port id "1", subtype 5
    frame.extend_from_slice(&[0x06, 0x02, 0x00, 0x78]); // ttl 120
    frame.extend_from_slice(&[0x00, 0x00]);
    assert!(is_lldp(&frame));
    assert_eq!(parse_lldp(&frame), None);
}

#[test]
fn observations_age_out_of_the_rebuild() {
    let mut state = DiscoveryState::new();
    state.observe(Endpoint { dpid: S1, port: 1 }, Endpoint { dpid: S2, port: 2 }, 100);
    assert_eq!(state.fresh_links(110, 20).len(), 1);
    // too old for the next tick
    assert!(state.fresh_links(200, 20).is_empty());
    // and pruned for good
    assert!(state.observations().is_empty());
}

#[test]
fn observing_both_directions_yields_one_link() {
    let mut state = DiscoveryState::new();
    state.observe(Endpoint { dpid: S1, port: 1 }, Endpoint { dpid: S2, port: 2 }, 100);
    state.observe(Endpoint { dpid: S2, port: 2 }, Endpoint { dpid: S1, port: 1 }, 101);
    let links = state.fresh_links(105, 20);
    assert_eq!(links.len(), 1);
}

#[test]
fn repeated_observation_is_idempotent() {
    let mut state = DiscoveryState::new();
    for now in 100..110 {
        state.observe(Endpoint { dpid: S1, port: 1 }, Endpoint { dpid: S2, port: 2 }, now);
    }
    assert_eq!(state.observations().len(), 1);
    assert_eq!(state.observations()[0].last_seen, 109);
}

#[test]
fn forgetting_a_switch_drops_its_observations() {
    let mut state = DiscoveryState::new();
    state.observe(Endpoint { dpid: S1, port: 1 }, Endpoint { dpid: S2, port: 2 }, 100);
    state.forget_switch(S2);
    assert!(state.observations().is_empty());
}
