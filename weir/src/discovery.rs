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

//! # Link Discovery
//!
//! The discovery source behind the topology store's link list. On every discovery tick the
//! controller floods one LLDP probe out of every known switch port; probes coming back as
//! packet-ins on another switch reveal a link. Observations carry a freshness timestamp, and the
//! tick rebuilds the link list wholesale from the observations that are still fresh — a link that
//! stops being reported simply ages out of the next rebuild.

use crate::topology::{Endpoint, Link};
use crate::types::{Dpid, MacAddr, PortNo};

use serde::Serialize;
use std::collections::HashMap;

/// Destination address of LLDP frames (nearest-bridge group address).
pub const LLDP_DST: MacAddr = MacAddr([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);

/// The LLDP ethertype.
pub const ETHERTYPE_LLDP: u16 = 0x88cc;

const TLV_END: u8 = 0;
const TLV_CHASSIS_ID: u8 = 1;
const TLV_PORT_ID: u8 = 2;
const TLV_TTL: u8 = 3;
const SUBTYPE_LOCAL: u8 = 7;

/// Whether the frame is an LLDP probe (and thus must never reach the forwarding engine).
pub fn is_lldp(frame: &[u8]) -> bool {
    frame.len() >= 14 && frame[12] == 0x88 && frame[13] == 0xcc
}

/// Build the LLDP probe announcing `(dpid, port)`, sent from the port's hardware address.
pub fn build_lldp(dpid: Dpid, port: PortNo, src: MacAddr) -> Vec<u8> {
    let chassis = format!("dpid:{}", dpid);
    let port_id = format!("port:{}", port);
    let mut frame = Vec::with_capacity(64);
    frame.extend_from_slice(&LLDP_DST.0);
    frame.extend_from_slice(&src.0);
    frame.extend_from_slice(&ETHERTYPE_LLDP.to_be_bytes());
    push_tlv(&mut frame, TLV_CHASSIS_ID, &prefixed(SUBTYPE_LOCAL, chassis.as_bytes()));
    push_tlv(&mut frame, TLV_PORT_ID, &prefixed(SUBTYPE_LOCAL, port_id.as_bytes()));
    push_tlv(&mut frame, TLV_TTL, &120u16.to_be_bytes());
    push_tlv(&mut frame, TLV_END, &[]);
    frame
}

/// Parse an LLDP probe built by [`build_lldp`], returning the origin `(dpid, port)`. Probes from
/// foreign LLDP speakers (different chassis/port encodings) return `None` and are ignored.
pub fn parse_lldp(frame: &[u8]) -> Option<(Dpid, PortNo)> {
    if !is_lldp(frame) {
        return None;
    }
    let mut dpid = None;
    let mut port = None;
    let mut offset = 14;
    while offset + 2 <= frame.len() {
        let header = u16::from_be_bytes([frame[offset], frame[offset + 1]]);
        let tlv_type = (header >> 9) as u8;
        let tlv_len = (header & 0x1ff) as usize;
        offset += 2;
        if tlv_type == TLV_END {
            break;
        }
        if offset + tlv_len > frame.len() {
            return None;
        }
        let value = &frame[offset..offset + tlv_len];
        match tlv_type {
            TLV_CHASSIS_ID => {
                let text = local_text(value)?;
                let hex = text.strip_prefix("dpid:")?;
                dpid = u64::from_str_radix(hex, 16).ok().map(Dpid);
            }
            TLV_PORT_ID => {
                let text = local_text(value)?;
                port = text.strip_prefix("port:")?.parse::<PortNo>().ok();
            }
            _ => (),
        }
        offset += tlv_len;
    }
    Some((dpid?, port?))
}

fn push_tlv(frame: &mut Vec<u8>, tlv_type: u8, value: &[u8]) {
    let header = ((tlv_type as u16) << 9) | (value.len() as u16 & 0x1ff);
    frame.extend_from_slice(&header.to_be_bytes());
    frame.extend_from_slice(value);
}

fn prefixed(subtype: u8, value: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(1 + value.len());
    v.push(subtype);
    v.extend_from_slice(value);
    v
}

fn local_text(value: &[u8]) -> Option<&str> {
    match value.split_first() {
        Some((&SUBTYPE_LOCAL, rest)) => std::str::from_utf8(rest).ok(),
        _ => None,
    }
}

/// A single timestamped link observation, exposed raw on the debug surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// The observed link
    pub link: Link,
    /// Unix timestamp of the latest probe that confirmed it
    pub last_seen: u64,
}

/// The collected link observations between discovery ticks.
#[derive(Debug, Default)]
pub struct DiscoveryState {
    observations: HashMap<Link, u64>,
}

impl DiscoveryState {
    /// Create an empty observation set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a probe sent on `origin` arrived on `receiver`. Repeated observations only
    /// refresh the timestamp, so replaying a discovery snapshot is idempotent.
    pub fn observe(&mut self, origin: Endpoint, receiver: Endpoint, now: u64) {
        self.observations.insert(Link::new(origin, receiver), now);
    }

    /// The links confirmed within the last `max_age` seconds; the input of the wholesale link
    /// rebuild. Older observations are pruned as a side effect.
    pub fn fresh_links(&mut self, now: u64, max_age: u64) -> Vec<Link> {
        self.observations.retain(|_, seen| now.saturating_sub(*seen) <= max_age);
        let mut links: Vec<Link> = self.observations.keys().copied().collect();
        links.sort_by_key(|l| (l.a, l.b));
        links
    }

    /// Every raw observation, for the debug surface.
    pub fn observations(&self) -> Vec<Observation> {
        let mut all: Vec<Observation> = self
            .observations
            .iter()
            .map(|(link, last_seen)| Observation { link: *link, last_seen: *last_seen })
            .collect();
        all.sort_by_key(|o| (o.link.a, o.link.b));
        all
    }

    /// Forget every observation touching the given switch (switch-leave).
    pub fn forget_switch(&mut self, dpid: Dpid) {
        self.observations.retain(|l, _| l.a.dpid != dpid && l.b.dpid != dpid);
    }
}
