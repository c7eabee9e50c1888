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

//! # Topology Store
//!
//! In-memory model of the network: switches with their ports, the link list, and the learned
//! hosts. The store is the single owner of this state; every other component reads it through
//! accessors and mutates it through the operations below, under the model lock held by the
//! controller.
//!
//! Links are rebuilt wholesale on every discovery tick: after [`Topology::replace_links`] the
//! link list reflects exactly what discovery reported at that instant, and stale links vanish by
//! replacement rather than by explicit removal. Hosts follow last-write-wins semantics; a
//! conflicting observation overwrites the previous location and is logged as a host move.

use crate::types::{Dpid, MacAddr, PortNo};

use log::*;
use openflow::PortDesc;
use petgraph::prelude::*;
use petgraph::stable_graph::StableGraph;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the unix epoch; the timestamp base of the topology store.
pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// One switch port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Hardware address of the port
    pub hw_addr: MacAddr,
    /// Interface name
    pub name: String,
    /// Whether the physical link is down
    pub link_down: bool,
}

/// One connected switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchEntry {
    /// Datapath id of the switch
    pub dpid: Dpid,
    /// Known ports, refreshed wholesale on every discovery tick
    pub ports: BTreeMap<PortNo, PortInfo>,
    /// Unix timestamp of the connect event
    pub connected_at: u64,
}

/// One end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Endpoint {
    /// Switch holding the port
    pub dpid: Dpid,
    /// Port number on that switch
    pub port: PortNo,
}

/// An unordered switch-to-switch link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    /// The lexicographically smaller endpoint
    pub a: Endpoint,
    /// The lexicographically larger endpoint
    pub b: Endpoint,
}

impl Link {
    /// Build a link from two endpoints, normalizing their order so that the same physical link
    /// always compares equal no matter which side reported it.
    pub fn new(x: Endpoint, y: Endpoint) -> Self {
        if x <= y {
            Link { a: x, b: y }
        } else {
            Link { a: y, b: x }
        }
    }
}

/// A learned host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    /// Hardware address (the key)
    pub mac: MacAddr,
    /// Switch the host was last seen on
    pub dpid: Dpid,
    /// Port the host was last seen on
    pub port: PortNo,
    /// Best known IP address, if any
    pub ip: Option<Ipv4Addr>,
    /// Unix timestamp of the last observation
    pub last_seen: u64,
}

/// Outcome of a host learning event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// First observation of this hardware address
    New,
    /// Same location as before (idempotent refresh)
    Refreshed,
    /// The host shows up on a different switch or port
    Moved,
}

/// The link graph mirror: switches as nodes, links as edges.
type LinkGraph = StableGraph<Dpid, (), Undirected, u32>;

/// # Topology Store
///
/// Owns switches, links and hosts. The link list is mirrored into a stable graph (switches as
/// nodes, links as edges) for connectivity queries and the debug surface.
#[derive(Debug, Default)]
pub struct Topology {
    switches: HashMap<Dpid, SwitchEntry>,
    hosts: HashMap<MacAddr, Host>,
    links: Vec<Link>,
    graph: LinkGraph,
    node_idx: HashMap<Dpid, NodeIndex>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a switch (or refresh its connect timestamp on reconnect). Ports are filled in by
    /// the first port refresh.
    pub fn upsert_switch(&mut self, dpid: Dpid, now: u64) {
        match self.switches.get_mut(&dpid) {
            Some(entry) => {
                info!("Switch {} reconnected", dpid);
                entry.connected_at = now;
            }
            None => {
                info!("Switch {} connected", dpid);
                self.switches
                    .insert(dpid, SwitchEntry { dpid, ports: BTreeMap::new(), connected_at: now });
            }
        }
        if !self.node_idx.contains_key(&dpid) {
            let idx = self.graph.add_node(dpid);
            self.node_idx.insert(dpid, idx);
        }
    }

    /// Drop a switch on switch-leave, together with its graph node and all links touching it.
    pub fn remove_switch(&mut self, dpid: Dpid) {
        if self.switches.remove(&dpid).is_some() {
            info!("Switch {} disconnected", dpid);
        }
        if let Some(idx) = self.node_idx.remove(&dpid) {
            self.graph.remove_node(idx);
        }
        self.links.retain(|l| l.a.dpid != dpid && l.b.dpid != dpid);
    }

    /// Replace the port map of a switch with a freshly discovered port description list.
    pub fn refresh_ports(&mut self, dpid: Dpid, ports: &[PortDesc]) {
        if let Some(entry) = self.switches.get_mut(&dpid) {
            entry.ports = ports
                .iter()
                .filter(|p| p.port_no <= 0xffff_ff00) // physical ports only, no OFPP_* reserved
                .map(|p| {
                    (
                        p.port_no,
                        PortInfo {
                            hw_addr: MacAddr(p.hw_addr),
                            name: p.name.clone(),
                            link_down: p.link_down(),
                        },
                    )
                })
                .collect();
        }
    }

    /// Update or remove a single port after a port-status event.
    pub fn update_port(&mut self, dpid: Dpid, desc: &PortDesc, removed: bool) {
        if let Some(entry) = self.switches.get_mut(&dpid) {
            if removed {
                entry.ports.remove(&desc.port_no);
            } else {
                entry.ports.insert(
                    desc.port_no,
                    PortInfo {
                        hw_addr: MacAddr(desc.hw_addr),
                        name: desc.name.clone(),
                        link_down: desc.link_down(),
                    },
                );
            }
        }
    }

    /// Replace the link list wholesale with the result of a discovery tick, and rebuild the graph
    /// mirror. Links between switches that are no longer connected are dropped silently.
    pub fn replace_links(&mut self, links: Vec<Link>) {
        let mut deduped: Vec<Link> = Vec::with_capacity(links.len());
        for link in links {
            if !self.switches.contains_key(&link.a.dpid) || !self.switches.contains_key(&link.b.dpid)
            {
                continue;
            }
            if !deduped.contains(&link) {
                deduped.push(link);
            }
        }
        self.links = deduped;
        self.graph.clear_edges();
        for link in &self.links {
            if let (Some(&a), Some(&b)) =
                (self.node_idx.get(&link.a.dpid), self.node_idx.get(&link.b.dpid))
            {
                self.graph.add_edge(a, b, ());
            }
        }
    }

    /// Learn (or refresh) a host. Identical observations are no-ops; a location change logs a
    /// host move and overwrites, the newest observation always winning. A known IP is never
    /// downgraded to `None` by a learning event that carries no IP.
    pub fn learn_host(
        &mut self,
        mac: MacAddr,
        dpid: Dpid,
        port: PortNo,
        ip: Option<Ipv4Addr>,
        now: u64,
    ) -> HostEvent {
        match self.hosts.get_mut(&mac) {
            Some(host) => {
                let moved = host.dpid != dpid || host.port != port;
                if moved {
                    info!(
                        "Host {} moved from {}:{} to {}:{}",
                        mac, host.dpid, host.port, dpid, port
                    );
                }
                host.dpid = dpid;
                host.port = port;
                if ip.is_some() {
                    host.ip = ip;
                }
                host.last_seen = now;
                if moved {
                    HostEvent::Moved
                } else {
                    HostEvent::Refreshed
                }
            }
            None => {
                debug!("Learned host {} at {}:{}", mac, dpid, port);
                self.hosts.insert(mac, Host { mac, dpid, port, ip, last_seen: now });
                HostEvent::New
            }
        }
    }

    /// Drop every host unseen for longer than `host_ttl` seconds. Returns the number of swept
    /// entries.
    pub fn expire_stale_hosts(&mut self, now: u64, host_ttl: u64) -> usize {
        let before = self.hosts.len();
        self.hosts.retain(|_, h| now.saturating_sub(h.last_seen) <= host_ttl);
        let swept = before - self.hosts.len();
        if swept > 0 {
            debug!("Swept {} stale host entries", swept);
        }
        swept
    }

    /// The port a host is attached to, if it is known to sit on the given switch.
    pub fn host_port_on(&self, dpid: Dpid, mac: &MacAddr) -> Option<PortNo> {
        self.hosts.get(mac).filter(|h| h.dpid == dpid).map(|h| h.port)
    }

    /// Look up one switch.
    pub fn switch(&self, dpid: Dpid) -> Option<&SwitchEntry> {
        self.switches.get(&dpid)
    }

    /// All connected switches, ordered by dpid.
    pub fn switches(&self) -> Vec<&SwitchEntry> {
        let mut entries: Vec<&SwitchEntry> = self.switches.values().collect();
        entries.sort_by_key(|s| s.dpid);
        entries
    }

    /// The dpids of all connected switches, ordered.
    pub fn switch_ids(&self) -> Vec<Dpid> {
        let mut ids: Vec<Dpid> = self.switches.keys().copied().collect();
        ids.sort();
        ids
    }

    /// The current link list.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// All learned hosts, ordered by hardware address.
    pub fn hosts(&self) -> Vec<&Host> {
        let mut hosts: Vec<&Host> = self.hosts.values().collect();
        hosts.sort_by_key(|h| h.mac);
        hosts
    }

    /// Number of connected switches.
    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }

    /// Whether the two switches are connected through the current link set (directly or over
    /// intermediate switches).
    pub fn connected(&self, a: Dpid, b: Dpid) -> bool {
        match (self.node_idx.get(&a), self.node_idx.get(&b)) {
            (Some(&a), Some(&b)) => petgraph::algo::has_path_connecting(&self.graph, a, b, None),
            _ => false,
        }
    }
}
