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

//! # Controller Core
//!
//! Ties everything together: switch sessions feed the dispatcher, the dispatcher updates the
//! network model, and three periodic loops (topology discovery, statistics collection, policy
//! sync) poll and refresh it. The whole model sits behind one coarse reader-writer lock, so the
//! sessions and loops mutate it as if they were a single serialized worker. Switch write handles
//! live outside the lock, so protocol I/O never blocks model readers.

mod session;

pub use session::listen;

use crate::config::Config;
use crate::discovery::{self, DiscoveryState};
use crate::error::{Error, Result};
use crate::forwarding;
use crate::policy::{compile, PolicyCache};
use crate::stats::{
    FlowEfficiency, FlowEntry, PerformanceMetrics, PortRates, StatsState,
};
use crate::topology::{unix_now, Endpoint, Host, Link, SwitchEntry, Topology};
use crate::types::{
    Dpid, PortNo, PRIO_ICMP, PRIO_PROTECT, PRIO_TABLE_MISS, TABLE_DEFAULT, TABLE_POLICY,
};
use crate::Stopper;

use log::*;
use openflow::{
    Action, FlowMod, FlowStatsRequest, Instruction, Match, Message, MultipartReply,
    MultipartRequest, PacketOut, Payload, PortStatsRequest, PseudoPort,
};
use policy_engine::{Policy, PolicyEngineClient};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

/// Number of packet bytes a table-miss sends to the controller (`OFPCML_NO_BUFFER`: the whole
/// packet, unbuffered).
const CONTROLLER_MAX_LEN: u16 = 0xffff;

/// The shared network model: topology, discovery observations, statistics and the policy cache.
/// Mutated only under the controller's model lock.
#[derive(Debug)]
pub struct NetworkModel {
    /// Switches, links and hosts
    pub topology: Topology,
    /// Raw link observations between discovery ticks
    pub discovery: DiscoveryState,
    /// Counters, rates, flow cache and cumulative totals
    pub stats: StatsState,
    /// The cached policy set and the Policy Engine availability flag
    pub policies: PolicyCache,
}

/// Write handle of a connected switch. Cloneable; all writers share one mutex around the stream.
#[derive(Debug, Clone)]
pub struct SwitchHandle {
    stream: Arc<Mutex<TcpStream>>,
}

impl SwitchHandle {
    /// Wrap a connected stream.
    pub fn new(stream: TcpStream) -> Self {
        Self { stream: Arc::new(Mutex::new(stream)) }
    }

    pub(crate) fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut stream = self.stream.lock().unwrap();
        stream.write_all(bytes)?;
        Ok(())
    }
}

/// Liveness and inventory summary for the `/status` and `/health` endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    /// Seconds since process start
    pub uptime_secs: u64,
    /// Connected switches
    pub switches: usize,
    /// Learned hosts
    pub hosts: usize,
    /// Current links
    pub links: usize,
    /// Cached policies
    pub policies: usize,
    /// Cached policies that are enabled
    pub policies_enabled: usize,
    /// Whether the last Policy Engine sync succeeded
    pub policy_engine_available: bool,
    /// Unix timestamp of the last successful sync, if any
    pub last_policy_sync: Option<u64>,
    /// Current health score
    pub health_score: f64,
}

/// Debug view of one switch session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugSwitch {
    /// Datapath id
    pub dpid: Dpid,
    /// Unix timestamp of the connect event
    pub connected_at: u64,
    /// Number of known ports
    pub ports: usize,
    /// Whether a write handle is registered
    pub connected: bool,
}

/// # The Controller
///
/// Owns the network model, the switch write handles and the Policy Engine client. One instance
/// is shared (via `Arc`) between the listener, the session threads, the periodic loops and the
/// Management API.
#[derive(Debug)]
pub struct Controller {
    model: RwLock<NetworkModel>,
    connections: RwLock<HashMap<Dpid, SwitchHandle>>,
    config: Config,
    policy_client: PolicyEngineClient,
    xid: AtomicU32,
}

impl Controller {
    /// Build a controller for the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        let policy_client =
            PolicyEngineClient::new(&config.policy_engine_host, config.policy_engine_port)?;
        Ok(Self {
            model: RwLock::new(NetworkModel {
                topology: Topology::new(),
                discovery: DiscoveryState::new(),
                stats: StatsState::new(unix_now()),
                policies: PolicyCache::new(),
            }),
            connections: RwLock::new(HashMap::new()),
            config,
            policy_client,
            xid: AtomicU32::new(1),
        })
    }

    /// The configuration the controller was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn next_xid(&self) -> u32 {
        self.xid.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a message to a connected switch. Failures are returned, never escalated; the next
    /// periodic cycle re-attempts naturally.
    pub fn send(&self, dpid: Dpid, msg: Message) -> Result<()> {
        let handle = self
            .connections
            .read()
            .unwrap()
            .get(&dpid)
            .cloned()
            .ok_or(Error::SwitchNotConnected(dpid))?;
        handle.send_raw(&Message::marshal(self.next_xid(), msg))
    }

    fn send_all(&self, dpid: Dpid, messages: Vec<Message>) {
        for msg in messages {
            if let Err(e) = self.send(dpid, msg) {
                warn!("Failed to send to switch {}: {}", dpid, e);
            }
        }
    }

    // ------------------------------------------------------------------------------------------
    // session events
    // ------------------------------------------------------------------------------------------

    /// Register a switch after a completed handshake: store the write handle, create the
    /// topology entry, install the default table, compile the cached policies and request the
    /// port descriptions.
    pub fn switch_connected(&self, dpid: Dpid, handle: SwitchHandle) {
        self.connections.write().unwrap().insert(dpid, handle);
        let policy_flows = {
            let mut model = self.model.write().unwrap();
            model.topology.upsert_switch(dpid, unix_now());
            compile::compile_all(model.policies.ordered())
        };
        let mut messages: Vec<Message> = Vec::new();
        for fm in default_flows(&self.config) {
            messages.push(Message::FlowMod(fm));
        }
        messages.push(Message::FlowMod(FlowMod::delete_all_flows(TABLE_POLICY)));
        let now = unix_now();
        {
            let mut model = self.model.write().unwrap();
            for fm in &policy_flows {
                model.stats.note_flow_installed(dpid, fm, now);
            }
        }
        messages.extend(policy_flows.into_iter().map(Message::FlowMod));
        messages.push(Message::MultipartRequest(MultipartRequest::PortDesc));
        info!("Switch {} registered, installing {} messages", dpid, messages.len());
        self.send_all(dpid, messages);
    }

    /// Tear down all state of a switch on switch-leave.
    pub fn switch_disconnected(&self, dpid: Dpid) {
        self.connections.write().unwrap().remove(&dpid);
        let mut model = self.model.write().unwrap();
        model.topology.remove_switch(dpid);
        model.discovery.forget_switch(dpid);
        model.stats.forget_switch(dpid, unix_now());
    }

    /// Dispatch one message from an established session.
    pub fn handle_message(&self, dpid: Dpid, msg: Message) {
        match msg {
            Message::EchoRequest(data) => {
                if let Err(e) = self.send(dpid, Message::EchoReply(data)) {
                    warn!("Failed to answer echo from {}: {}", dpid, e);
                }
            }
            Message::PacketIn(pi) => self.handle_packet_in(dpid, pi),
            Message::FlowRemoved(fr) => {
                let mut model = self.model.write().unwrap();
                model.stats.mark_flow_removed(
                    dpid,
                    fr.priority,
                    &fr.pattern,
                    fr.packet_count,
                    fr.byte_count,
                    unix_now(),
                );
            }
            Message::PortStatus(ps) => {
                debug!("Port status on {}: {:?} {}", dpid, ps.reason, ps.desc.name);
                {
                    let mut model = self.model.write().unwrap();
                    let removed = matches!(ps.reason, openflow::PortReason::Delete);
                    model.topology.update_port(dpid, &ps.desc, removed);
                }
                // port events also trigger an immediate pull refresh
                if let Err(e) = self.send(dpid, Message::MultipartRequest(MultipartRequest::PortDesc))
                {
                    warn!("Failed to refresh ports of {}: {}", dpid, e);
                }
            }
            Message::MultipartReply(reply) => self.handle_multipart(dpid, reply),
            Message::Error(err) => {
                warn!(
                    "Switch {} reported error type {} code {}",
                    dpid, err.err_type, err.code
                );
            }
            Message::Hello | Message::FeaturesReply(_) | Message::BarrierReply => (),
            Message::EchoReply(_) => (),
            Message::Other(t) => debug!("Ignoring unhandled message type {} from {}", t, dpid),
            // send-only messages never arrive here
            Message::FeaturesRequest
            | Message::PacketOut(_)
            | Message::FlowMod(_)
            | Message::MultipartRequest(_)
            | Message::BarrierRequest => (),
        }
    }

    fn handle_packet_in(&self, dpid: Dpid, pi: openflow::PacketIn) {
        let in_port = match pi.in_port {
            Some(port) => port,
            None => {
                debug!("Packet-in from {} without an ingress port, ignored", dpid);
                return;
            }
        };
        let frame = pi.payload.bytes();

        // discovery frames feed the link observations and never reach the forwarding engine
        if discovery::is_lldp(frame) {
            if let Some((origin_dpid, origin_port)) = discovery::parse_lldp(frame) {
                let mut model = self.model.write().unwrap();
                model.discovery.observe(
                    Endpoint { dpid: origin_dpid, port: origin_port },
                    Endpoint { dpid, port: in_port },
                    unix_now(),
                );
            }
            return;
        }

        let verdict = {
            let mut model = self.model.write().unwrap();
            let NetworkModel { topology, policies, stats, .. } = &mut *model;
            let verdict =
                forwarding::handle_packet_in(topology, policies.ordered(), dpid, in_port, &pi.payload, unix_now());
            let now = unix_now();
            for fm in &verdict.flows {
                stats.note_flow_installed(dpid, fm, now);
            }
            verdict
        };

        let mut messages: Vec<Message> =
            verdict.flows.into_iter().map(Message::FlowMod).collect();
        if let Some(po) = verdict.packet_out {
            messages.push(Message::PacketOut(po));
        }
        self.send_all(dpid, messages);
    }

    fn handle_multipart(&self, dpid: Dpid, reply: MultipartReply) {
        let mut model = self.model.write().unwrap();
        match reply {
            MultipartReply::PortStats(entries) => {
                model.stats.record_port_stats(dpid, &entries, Instant::now());
            }
            MultipartReply::FlowStats(entries) => {
                model.stats.record_flow_stats(dpid, &entries, unix_now());
            }
            MultipartReply::PortDesc(ports) => {
                model.topology.refresh_ports(dpid, &ports);
            }
        }
    }

    // ------------------------------------------------------------------------------------------
    // periodic loops
    // ------------------------------------------------------------------------------------------

    /// One topology discovery tick: request fresh port descriptions, flood LLDP probes out of
    /// every known port, rebuild the link list from fresh observations, and run the TTL sweeps.
    pub fn discovery_tick(&self) {
        let now = unix_now();
        let max_age = 2 * self.config.discovery_interval.as_secs().max(1);

        // collect the probe targets under the read lock, send after
        let mut probes: Vec<(Dpid, PortNo, crate::types::MacAddr)> = Vec::new();
        let switch_ids = {
            let model = self.model.read().unwrap();
            for sw in model.topology.switches() {
                for (port, info) in &sw.ports {
                    if !info.link_down {
                        probes.push((sw.dpid, *port, info.hw_addr));
                    }
                }
            }
            model.topology.switch_ids()
        };

        for dpid in &switch_ids {
            if let Err(e) =
                self.send(*dpid, Message::MultipartRequest(MultipartRequest::PortDesc))
            {
                debug!("Port description request to {} failed: {}", dpid, e);
            }
        }
        for (dpid, port, hw_addr) in probes {
            let frame = discovery::build_lldp(dpid, port, hw_addr);
            let po = PacketOut {
                payload: Payload::NotBuffered(frame),
                in_port: None,
                actions: vec![Action::Output(PseudoPort::Physical(port))],
            };
            if let Err(e) = self.send(dpid, Message::PacketOut(po)) {
                debug!("LLDP probe to {}:{} failed: {}", dpid, port, e);
            }
        }

        let mut model = self.model.write().unwrap();
        let NetworkModel { topology, discovery, stats, .. } = &mut *model;
        let links: Vec<Link> = discovery.fresh_links(now, max_age);
        topology.replace_links(links);
        topology.expire_stale_hosts(now, self.config.host_ttl.as_secs());
        stats.expire_stale_flows(now, self.config.flow_ttl.as_secs());
    }

    /// One statistics tick: fire port-stats and flow-stats requests at every connected switch.
    /// Replies are handled asynchronously by the session dispatcher.
    pub fn stats_tick(&self) {
        let switch_ids = self.model.read().unwrap().topology.switch_ids();
        for dpid in switch_ids {
            let requests = vec![
                Message::MultipartRequest(MultipartRequest::PortStats(PortStatsRequest {
                    port_no: None,
                })),
                Message::MultipartRequest(MultipartRequest::FlowStats(
                    FlowStatsRequest::all_tables(),
                )),
            ];
            for msg in requests {
                if let Err(e) = self.send(dpid, msg) {
                    debug!("Statistics request to {} failed: {}", dpid, e);
                }
            }
        }
    }

    /// One policy sync cycle: fetch the policy set, replace the cache wholesale on success and
    /// recompile every connected switch; on failure flip the availability flag and keep
    /// enforcing the last known good set. Returns the number of cached policies.
    pub fn sync_policies(&self) -> Result<usize> {
        match self.policy_client.get_policies() {
            Ok(policies) => {
                let count = policies.len();
                info!("Policy sync fetched {} policies", count);
                {
                    let mut model = self.model.write().unwrap();
                    model.policies.replace(policies, unix_now());
                }
                self.apply_policies_everywhere();
                Ok(count)
            }
            Err(e) => {
                let mut model = self.model.write().unwrap();
                model.policies.mark_unavailable(&e);
                Err(e.into())
            }
        }
    }

    /// Recompile and reinstall the policy table of every connected switch.
    pub fn apply_policies_everywhere(&self) {
        let (switch_ids, flows) = {
            let model = self.model.read().unwrap();
            (model.topology.switch_ids(), compile::compile_all(model.policies.ordered()))
        };
        let now = unix_now();
        for dpid in switch_ids {
            let mut messages = vec![Message::FlowMod(FlowMod::delete_all_flows(TABLE_POLICY))];
            {
                let mut model = self.model.write().unwrap();
                for fm in &flows {
                    model.stats.note_flow_installed(dpid, fm, now);
                }
            }
            messages.extend(flows.iter().cloned().map(Message::FlowMod));
            self.send_all(dpid, messages);
        }
    }

    /// Run the discovery loop until the stopper fires.
    pub fn run_discovery_loop(&self, stopper: Stopper) {
        run_periodic("discovery", self.config.discovery_interval, &stopper, || {
            self.discovery_tick()
        });
    }

    /// Run the statistics loop until the stopper fires.
    pub fn run_stats_loop(&self, stopper: Stopper) {
        run_periodic("statistics", self.config.stats_interval, &stopper, || self.stats_tick());
    }

    /// Run the policy sync loop until the stopper fires. The first cycle runs immediately.
    pub fn run_policy_loop(&self, stopper: Stopper) {
        if let Err(e) = self.sync_policies() {
            debug!("Initial policy sync failed: {}", e);
        }
        run_periodic("policy sync", self.config.policy_poll_interval, &stopper, || {
            if let Err(e) = self.sync_policies() {
                debug!("Policy sync failed: {}", e);
            }
        });
    }

    // ------------------------------------------------------------------------------------------
    // read surface (Management API)
    // ------------------------------------------------------------------------------------------

    /// Snapshot of all connected switches.
    pub fn switches(&self) -> Vec<SwitchEntry> {
        self.model.read().unwrap().topology.switches().into_iter().cloned().collect()
    }

    /// Snapshot of the current link list.
    pub fn links(&self) -> Vec<Link> {
        self.model.read().unwrap().topology.links().to_vec()
    }

    /// Snapshot of all learned hosts.
    pub fn hosts(&self) -> Vec<Host> {
        self.model.read().unwrap().topology.hosts().into_iter().cloned().collect()
    }

    /// Per-port rates of one switch, or `None` when it is not connected.
    pub fn port_stats(&self, dpid: Dpid) -> Option<Vec<PortRates>> {
        let model = self.model.read().unwrap();
        model.topology.switch(dpid)?;
        Some(model.stats.port_rates_for(dpid))
    }

    /// Cached flows of one switch, or `None` when it is not connected.
    pub fn switch_flows(&self, dpid: Dpid) -> Option<Vec<FlowEntry>> {
        let model = self.model.read().unwrap();
        model.topology.switch(dpid)?;
        Some(model.stats.flows_for(dpid).into_iter().cloned().collect())
    }

    /// Every cached flow.
    pub fn all_flows(&self) -> Vec<FlowEntry> {
        self.model.read().unwrap().stats.flows().into_iter().cloned().collect()
    }

    /// The derived performance metrics bundle.
    pub fn performance(&self) -> PerformanceMetrics {
        self.model.read().unwrap().stats.performance()
    }

    /// The flow-cache efficiency summary.
    pub fn flow_efficiency(&self) -> FlowEfficiency {
        self.model.read().unwrap().stats.flow_efficiency()
    }

    /// Snapshot of the cached policy set, in evaluation order.
    pub fn policies(&self) -> Vec<Policy> {
        self.model.read().unwrap().policies.ordered().to_vec()
    }

    /// The liveness and inventory summary.
    pub fn status(&self) -> StatusSummary {
        let model = self.model.read().unwrap();
        let health = model.stats.health();
        StatusSummary {
            uptime_secs: unix_now().saturating_sub(model.stats.cumulative().started_at),
            switches: model.topology.switch_count(),
            hosts: model.topology.hosts().len(),
            links: model.topology.links().len(),
            policies: model.policies.len(),
            policies_enabled: model.policies.enabled_count(),
            policy_engine_available: model.policies.is_available(),
            last_policy_sync: model.policies.last_sync(),
            health_score: health.score,
        }
    }

    /// Raw discovery observations, for the debug surface.
    pub fn debug_discovery(&self) -> Vec<crate::discovery::Observation> {
        self.model.read().unwrap().discovery.observations()
    }

    /// Raw session state, for the debug surface.
    pub fn debug_switches(&self) -> Vec<DebugSwitch> {
        let model = self.model.read().unwrap();
        let connections = self.connections.read().unwrap();
        model
            .topology
            .switches()
            .into_iter()
            .map(|sw| DebugSwitch {
                dpid: sw.dpid,
                connected_at: sw.connected_at,
                ports: sw.ports.len(),
                connected: connections.contains_key(&sw.dpid),
            })
            .collect()
    }

    /// Accept switch connections until the stopper fires (see [`listen`]).
    pub fn run_listener(self: &Arc<Self>, stopper: Stopper) -> Result<()> {
        listen(Arc::clone(self), &self.config.openflow_listen.clone(), stopper)
    }
}

/// The static entries of the default table: the table-miss to the controller, the ICMP fast
/// path, and (when configured) the controller-protection guard.
fn default_flows(config: &Config) -> Vec<FlowMod> {
    let mut flows = Vec::new();

    let miss = FlowMod::add_flow(
        TABLE_DEFAULT,
        PRIO_TABLE_MISS,
        Match::any(),
        vec![Instruction::ApplyActions(vec![Action::Output(PseudoPort::Controller(
            CONTROLLER_MAX_LEN,
        ))])],
    );
    flows.push(miss);

    let mut icmp = Match::any();
    icmp.eth_type = Some(0x0800);
    icmp.ip_proto = Some(1);
    flows.push(FlowMod::add_flow(
        TABLE_DEFAULT,
        PRIO_ICMP,
        icmp,
        vec![
            Instruction::WriteActions(vec![Action::Output(PseudoPort::Normal)]),
            Instruction::GotoTable(TABLE_POLICY),
        ],
    ));

    if let Some(ip) = config.protected_ip {
        let mut guard = Match::any();
        guard.eth_type = Some(0x0800);
        guard.ipv4_dst = Some(ip);
        // no instructions: data-plane traffic towards the controller address is discarded
        flows.push(FlowMod::add_flow(TABLE_DEFAULT, PRIO_PROTECT, guard, vec![]));
    }

    flows
}

/// Drive a periodic tick until the stopper fires, sleeping in short slices so shutdown is
/// picked up promptly.
fn run_periodic<F: FnMut()>(name: &str, interval: Duration, stopper: &Stopper, mut tick: F) {
    info!("Starting {} loop (interval {:?})", name, interval);
    let slice = Duration::from_millis(200);
    loop {
        tick();
        let mut slept = Duration::from_secs(0);
        while slept < interval {
            if stopper.is_stop() {
                info!("Stopping {} loop", name);
                return;
            }
            thread::sleep(slice.min(interval - slept));
            slept += slice;
        }
    }
}
