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

//! # Statistics Engine
//!
//! Ingests the periodic port and flow counter replies, derives per-port rates and process-wide
//! cumulative totals, maintains the flow cache, and condenses everything into a health score.
//!
//! Rates are simple deltas against the previous sample (`Δbytes·8/Δt`), clamped at zero so a
//! counter reset after a switch restart shows up as a quiet sample instead of a negative rate.
//! The "latency" entering the health score is *synthetic* — a heuristic derived from active-port
//! bandwidth, not a measurement.

use crate::types::{Dpid, PortNo};

use log::*;
use openflow::{FlowMod, FlowStats, Match, PortStats, Timeout};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// Derived rates and latest counters of one port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct PortRates {
    /// Port number
    pub port_no: PortNo,
    /// Receive rate, bits per second
    pub rx_bps: f64,
    /// Transmit rate, bits per second
    pub tx_bps: f64,
    /// Latest receive byte counter
    pub rx_bytes: u64,
    /// Latest transmit byte counter
    pub tx_bytes: u64,
    /// Latest receive packet counter
    pub rx_packets: u64,
    /// Latest transmit packet counter
    pub tx_packets: u64,
    /// Latest receive error counter
    pub rx_errors: u64,
    /// Latest transmit error counter
    pub tx_errors: u64,
    /// Errors that appeared since the previous sample
    pub error_delta: u64,
}

/// Key of a flow cache entry: the canonical match text is part of the key, so two structurally
/// different matches can never collide, whatever their hashes do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowKey {
    /// Switch the flow is installed on
    pub dpid: Dpid,
    /// Priority of the entry
    pub priority: u16,
    /// Canonical match text
    pub pattern: String,
}

/// One cached flow entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEntry {
    /// Switch the flow is installed on
    pub dpid: Dpid,
    /// Table the flow lives in
    pub table_id: u8,
    /// Priority of the entry
    pub priority: u16,
    /// Canonical match text
    pub pattern: String,
    /// Idle timeout in seconds (zero: none)
    pub idle_timeout: u16,
    /// Hard timeout in seconds (zero: none)
    pub hard_timeout: u16,
    /// Packets matched, from the latest counter sample
    pub packet_count: u64,
    /// Bytes matched, from the latest counter sample
    pub byte_count: u64,
    /// Unix timestamp of local creation (flow-mod sent or first seen in a reply)
    pub created_at: u64,
    /// Unix timestamp of the latest update
    pub updated_at: u64,
    /// Whether the switch reported the flow as removed
    pub removed: bool,
}

/// Process-lifetime totals. Monotonically increasing; negative counter deltas are clamped to
/// zero before they are folded in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CumulativeStats {
    /// Total bytes transferred over all observed ports
    pub total_bytes: u64,
    /// Total packets transferred over all observed ports
    pub total_packets: u64,
    /// Total distinct flows that entered the cache
    pub total_flows_created: u64,
    /// Highest combined instantaneous bandwidth seen, bits per second
    pub peak_bandwidth_bps: f64,
    /// Total port errors observed
    pub total_errors: u64,
    /// Unix timestamp of process start
    pub started_at: u64,
}

/// Health and activity summary derived from the latest samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// Aggregate health score, 0 to 100
    pub score: f64,
    /// Synthetic average latency in milliseconds (a bandwidth heuristic, not a measurement)
    pub simulated_latency_ms: f64,
    /// Ports currently carrying traffic
    pub active_ports: usize,
    /// Ports currently tracked
    pub total_ports: usize,
    /// Ports showing errors in their latest sample
    pub error_ports: usize,
    /// Combined bandwidth over all ports, bits per second
    pub total_bps: f64,
}

/// Efficiency/utilization summary derived from the flow cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowEfficiency {
    /// Flows currently cached
    pub total_flows: usize,
    /// Cached flows that have matched at least one packet
    pub active_flows: usize,
    /// Share of cached flows that carry traffic, in percent
    pub efficiency_pct: f64,
    /// Bytes accounted to cached flows
    pub total_bytes: u64,
    /// Packets accounted to cached flows
    pub total_packets: u64,
    /// Mean packet size over the cached flows, in bytes
    pub avg_packet_size: f64,
}

/// The complete derived metrics bundle served by the Management API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    /// Combined receive rate over all ports, bits per second
    pub rx_bps: f64,
    /// Combined transmit rate over all ports, bits per second
    pub tx_bps: f64,
    /// Combined bandwidth, bits per second
    pub total_bps: f64,
    /// Process-lifetime totals
    pub cumulative: CumulativeStats,
    /// Health summary
    pub health: HealthSnapshot,
    /// Combined bandwidth per switch, bits per second
    pub per_switch_bps: HashMap<String, f64>,
}

/// # Statistics state
///
/// Owned by the network model; fed by the session dispatcher, read by the Management API.
#[derive(Debug)]
pub struct StatsState {
    port_prev: HashMap<(Dpid, PortNo), (PortStats, Instant)>,
    port_rates: HashMap<(Dpid, PortNo), PortRates>,
    flows: HashMap<FlowKey, FlowEntry>,
    cumulative: CumulativeStats,
}

impl StatsState {
    /// Create an empty statistics state; `started_at` is the process start timestamp.
    pub fn new(started_at: u64) -> Self {
        Self {
            port_prev: HashMap::new(),
            port_rates: HashMap::new(),
            flows: HashMap::new(),
            cumulative: CumulativeStats {
                total_bytes: 0,
                total_packets: 0,
                total_flows_created: 0,
                peak_bandwidth_bps: 0.0,
                total_errors: 0,
                started_at,
            },
        }
    }

    /// Fold a port-statistics reply into the state: derive rates against the previous sample of
    /// each port and update the cumulative totals. The first sample of a port only establishes
    /// its baseline.
    pub fn record_port_stats(&mut self, dpid: Dpid, entries: &[PortStats], now: Instant) {
        for sample in entries {
            let key = (dpid, sample.port_no);
            let rates = match self.port_prev.get(&key) {
                Some((prev, prev_t)) => {
                    let dt = now.saturating_duration_since(*prev_t).as_secs_f64();
                    let rx_delta = sample.rx_bytes.saturating_sub(prev.rx_bytes);
                    let tx_delta = sample.tx_bytes.saturating_sub(prev.tx_bytes);
                    let pk_delta = sample
                        .rx_packets
                        .saturating_sub(prev.rx_packets)
                        .saturating_add(sample.tx_packets.saturating_sub(prev.tx_packets));
                    let err_delta = sample
                        .rx_errors
                        .saturating_sub(prev.rx_errors)
                        .saturating_add(sample.tx_errors.saturating_sub(prev.tx_errors));
                    let (rx_bps, tx_bps) = if dt > 0.0 {
                        (rx_delta as f64 * 8.0 / dt, tx_delta as f64 * 8.0 / dt)
                    } else {
                        (0.0, 0.0)
                    };
                    self.cumulative.total_bytes += rx_delta + tx_delta;
                    self.cumulative.total_packets += pk_delta;
                    self.cumulative.total_errors += err_delta;
                    PortRates {
                        port_no: sample.port_no,
                        rx_bps,
                        tx_bps,
                        rx_bytes: sample.rx_bytes,
                        tx_bytes: sample.tx_bytes,
                        rx_packets: sample.rx_packets,
                        tx_packets: sample.tx_packets,
                        rx_errors: sample.rx_errors,
                        tx_errors: sample.tx_errors,
                        error_delta: err_delta,
                    }
                }
                None => PortRates {
                    port_no: sample.port_no,
                    rx_bytes: sample.rx_bytes,
                    tx_bytes: sample.tx_bytes,
                    rx_packets: sample.rx_packets,
                    tx_packets: sample.tx_packets,
                    rx_errors: sample.rx_errors,
                    tx_errors: sample.tx_errors,
                    ..PortRates::default()
                },
            };
            self.port_prev.insert(key, (*sample, now));
            self.port_rates.insert(key, rates);
        }
        let total = self.total_bps();
        if total > self.cumulative.peak_bandwidth_bps {
            self.cumulative.peak_bandwidth_bps = total;
        }
    }

    /// Upsert flow cache entries from a flow-statistics reply. New keys count as created flows.
    pub fn record_flow_stats(&mut self, dpid: Dpid, entries: &[FlowStats], now: u64) {
        for stat in entries {
            let key = FlowKey {
                dpid,
                priority: stat.priority,
                pattern: stat.pattern.canonical(),
            };
            match self.flows.get_mut(&key) {
                Some(entry) => {
                    entry.packet_count = stat.packet_count;
                    entry.byte_count = stat.byte_count;
                    entry.updated_at = now;
                    entry.removed = false;
                }
                None => {
                    self.cumulative.total_flows_created += 1;
                    self.flows.insert(
                        key,
                        FlowEntry {
                            dpid,
                            table_id: stat.table_id,
                            priority: stat.priority,
                            pattern: stat.pattern.canonical(),
                            idle_timeout: stat.idle_timeout,
                            hard_timeout: stat.hard_timeout,
                            packet_count: stat.packet_count,
                            byte_count: stat.byte_count,
                            created_at: now.saturating_sub(stat.duration_sec as u64),
                            updated_at: now,
                            removed: false,
                        },
                    );
                }
            }
        }
    }

    /// Register a flow the controller just installed, ahead of any statistics reply.
    pub fn note_flow_installed(&mut self, dpid: Dpid, fm: &FlowMod, now: u64) {
        let key = FlowKey { dpid, priority: fm.priority, pattern: fm.pattern.canonical() };
        if self.flows.contains_key(&key) {
            return;
        }
        self.cumulative.total_flows_created += 1;
        self.flows.insert(
            key,
            FlowEntry {
                dpid,
                table_id: fm.table_id,
                priority: fm.priority,
                pattern: fm.pattern.canonical(),
                idle_timeout: match fm.idle_timeout {
                    Timeout::Permanent => 0,
                    Timeout::ExpiresAfter(s) => s,
                },
                hard_timeout: match fm.hard_timeout {
                    Timeout::Permanent => 0,
                    Timeout::ExpiresAfter(s) => s,
                },
                packet_count: 0,
                byte_count: 0,
                created_at: now,
                updated_at: now,
                removed: false,
            },
        );
    }

    /// Mark a cached flow as removed after a flow-removed message, folding in its final
    /// counters. The entry stays cached until the TTL sweep drops it.
    pub fn mark_flow_removed(
        &mut self,
        dpid: Dpid,
        priority: u16,
        pattern: &Match,
        packet_count: u64,
        byte_count: u64,
        now: u64,
    ) {
        let key = FlowKey { dpid, priority, pattern: pattern.canonical() };
        if let Some(entry) = self.flows.get_mut(&key) {
            entry.packet_count = packet_count;
            entry.byte_count = byte_count;
            entry.updated_at = now;
            entry.removed = true;
        }
    }

    /// Drop all per-switch statistics state on switch-leave. Flow cache entries of the switch
    /// are marked removed and left for the sweep.
    pub fn forget_switch(&mut self, dpid: Dpid, now: u64) {
        self.port_prev.retain(|(d, _), _| *d != dpid);
        self.port_rates.retain(|(d, _), _| *d != dpid);
        for entry in self.flows.values_mut().filter(|f| f.dpid == dpid) {
            entry.removed = true;
            entry.updated_at = now;
        }
    }

    /// Sweep flow cache entries that have not been updated for longer than `ttl` seconds.
    pub fn expire_stale_flows(&mut self, now: u64, ttl: u64) -> usize {
        let before = self.flows.len();
        self.flows.retain(|_, f| now.saturating_sub(f.updated_at) <= ttl);
        let swept = before - self.flows.len();
        if swept > 0 {
            debug!("Swept {} stale flow cache entries", swept);
        }
        swept
    }

    /// Combined bandwidth over all tracked ports, bits per second.
    pub fn total_bps(&self) -> f64 {
        self.port_rates.values().map(|r| r.rx_bps + r.tx_bps).sum()
    }

    /// The latest rates of every port of one switch, ordered by port number.
    pub fn port_rates_for(&self, dpid: Dpid) -> Vec<PortRates> {
        let mut rates: Vec<PortRates> = self
            .port_rates
            .iter()
            .filter(|((d, _), _)| *d == dpid)
            .map(|(_, r)| *r)
            .collect();
        rates.sort_by_key(|r| r.port_no);
        rates
    }

    /// The cached flows of one switch.
    pub fn flows_for(&self, dpid: Dpid) -> Vec<&FlowEntry> {
        let mut flows: Vec<&FlowEntry> =
            self.flows.values().filter(|f| f.dpid == dpid).collect();
        flows.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.pattern.cmp(&b.pattern)));
        flows
    }

    /// Every cached flow.
    pub fn flows(&self) -> Vec<&FlowEntry> {
        let mut flows: Vec<&FlowEntry> = self.flows.values().collect();
        flows.sort_by(|a, b| {
            a.dpid
                .cmp(&b.dpid)
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| a.pattern.cmp(&b.pattern))
        });
        flows
    }

    /// Look up one cached flow by key.
    pub fn flow(&self, key: &FlowKey) -> Option<&FlowEntry> {
        self.flows.get(key)
    }

    /// The process-lifetime totals.
    pub fn cumulative(&self) -> CumulativeStats {
        self.cumulative
    }

    /// Derive the health snapshot from the latest port samples.
    ///
    /// The score starts at 100 and loses up to 20 points for elevated synthetic latency, up to
    /// 30 points proportional to the fraction of ports showing errors, and a flat 15 points when
    /// fewer than 80% of the ports carry traffic.
    pub fn health(&self) -> HealthSnapshot {
        let total_ports = self.port_rates.len();
        let active: Vec<&PortRates> =
            self.port_rates.values().filter(|r| r.rx_bps + r.tx_bps > 0.0).collect();
        let error_ports = self.port_rates.values().filter(|r| r.error_delta > 0).count();
        let total_bps = self.total_bps();

        // synthetic per-port latency: 1 ms base plus 0.05 ms per Mbps of load
        let simulated_latency_ms = if active.is_empty() {
            1.0
        } else {
            active
                .iter()
                .map(|r| 1.0 + (r.rx_bps + r.tx_bps) / 1e6 * 0.05)
                .sum::<f64>()
                / active.len() as f64
        };

        let mut score = 100.0;
        // up to 20 points for elevated latency (fully elevated at 10 ms average)
        score -= ((simulated_latency_ms - 5.0) / 5.0 * 20.0).max(0.0).min(20.0);
        if total_ports > 0 {
            score -= error_ports as f64 / total_ports as f64 * 30.0;
            if (active.len() as f64) < 0.8 * total_ports as f64 {
                score -= 15.0;
            }
        }

        HealthSnapshot {
            score: score.max(0.0),
            simulated_latency_ms,
            active_ports: active.len(),
            total_ports,
            error_ports,
            total_bps,
        }
    }

    /// Derive the efficiency/utilization summary from the flow cache.
    pub fn flow_efficiency(&self) -> FlowEfficiency {
        let total_flows = self.flows.len();
        let active_flows = self.flows.values().filter(|f| f.packet_count > 0).count();
        let total_bytes: u64 = self.flows.values().map(|f| f.byte_count).sum();
        let total_packets: u64 = self.flows.values().map(|f| f.packet_count).sum();
        FlowEfficiency {
            total_flows,
            active_flows,
            efficiency_pct: if total_flows > 0 {
                active_flows as f64 / total_flows as f64 * 100.0
            } else {
                0.0
            },
            total_bytes,
            total_packets,
            avg_packet_size: if total_packets > 0 {
                total_bytes as f64 / total_packets as f64
            } else {
                0.0
            },
        }
    }

    /// The full derived metrics bundle.
    pub fn performance(&self) -> PerformanceMetrics {
        let rx_bps: f64 = self.port_rates.values().map(|r| r.rx_bps).sum();
        let tx_bps: f64 = self.port_rates.values().map(|r| r.tx_bps).sum();
        let mut per_switch_bps: HashMap<String, f64> = HashMap::new();
        for ((dpid, _), rates) in &self.port_rates {
            *per_switch_bps.entry(dpid.to_string()).or_insert(0.0) += rates.rx_bps + rates.tx_bps;
        }
        PerformanceMetrics {
            rx_bps,
            tx_bps,
            total_bps: rx_bps + tx_bps,
            cumulative: self.cumulative,
            health: self.health(),
            per_switch_bps,
        }
    }
}
