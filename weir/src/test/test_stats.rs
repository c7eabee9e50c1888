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

use crate::stats::{FlowKey, StatsState};
use crate::types::Dpid;

use openflow::{FlowStats, Match, PortStats};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

const SW: Dpid = Dpid(0xa1);

fn port_sample(port_no: u32, rx_bytes: u64, tx_bytes: u64) -> PortStats {
    PortStats { port_no, rx_bytes, tx_bytes, ..PortStats::default() }
}

fn flow_sample(priority: u16, ipv4_dst: [u8; 4], packets: u64, bytes: u64) -> FlowStats {
    let mut pattern = Match::any();
    pattern.eth_type = Some(0x0800);
    pattern.ipv4_dst = Some(Ipv4Addr::from(ipv4_dst));
    FlowStats {
        table_id: 0,
        duration_sec: 1,
        priority,
        idle_timeout: 300,
        hard_timeout: 0,
        cookie: 0,
        packet_count: packets,
        byte_count: bytes,
        pattern,
    }
}

#[test]
fn one_kilobyte_per_second_is_8000_bps() {
    let mut stats = StatsState::new(0);
    let t0 = Instant::now();
    let t1 = t0 + Duration::from_secs(1);
    stats.record_port_stats(SW, &[port_sample(1, 1000, 0)], t0);
    stats.record_port_stats(SW, &[port_sample(1, 2000, 0)], t1);
    let rates = stats.port_rates_for(SW);
    assert_eq!(rates.len(), 1);
    assert!((rates[0].rx_bps - 8000.0).abs() < f64::EPSILON);
    assert_eq!(rates[0].tx_bps, 0.0);
}

#[test]
fn replaying_an_identical_sample_yields_zero_not_negative() {
    let mut stats = StatsState::new(0);
    let t0 = Instant::now();
    let t1 = t0 + Duration::from_secs(2);
    let t2 = t0 + Duration::from_secs(4);
    stats.record_port_stats(SW, &[port_sample(1, 5000, 3000)], t0);
    stats.record_port_stats(SW, &[port_sample(1, 5000, 3000)], t1);
    assert_eq!(stats.port_rates_for(SW)[0].rx_bps, 0.0);
    assert_eq!(stats.port_rates_for(SW)[0].tx_bps, 0.0);
    // counter reset (switch restart): clamped to zero, cumulative totals untouched
    let before = stats.cumulative();
    stats.record_port_stats(SW, &[port_sample(1, 100, 50)], t2);
    assert_eq!(stats.port_rates_for(SW)[0].rx_bps, 0.0);
    assert_eq!(stats.cumulative().total_bytes, before.total_bytes);
}

#[test]
fn cumulative_totals_and_peak_track_deltas() {
    let mut stats = StatsState::new(0);
    let t0 = Instant::now();
    let t1 = t0 + Duration::from_secs(1);
    stats.record_port_stats(SW, &[port_sample(1, 0, 0)], t0);
    stats.record_port_stats(SW, &[port_sample(1, 1000, 500)], t1);
    let totals = stats.cumulative();
    assert_eq!(totals.total_bytes, 1500);
    assert!((totals.peak_bandwidth_bps - 12000.0).abs() < f64::EPSILON);
    // a later, quieter sample must not lower the recorded peak
    let t2 = t1 + Duration::from_secs(1);
    stats.record_port_stats(SW, &[port_sample(1, 1100, 550)], t2);
    assert!((stats.cumulative().peak_bandwidth_bps - 12000.0).abs() < f64::EPSILON);
}

#[test]
fn same_priority_different_matches_never_collide() {
    let mut stats = StatsState::new(0);
    stats.record_flow_stats(SW, &[flow_sample(10, [10, 0, 0, 1], 5, 500)], 100);
    stats.record_flow_stats(SW, &[flow_sample(10, [10, 0, 0, 2], 9, 900)], 100);

    let mut a = Match::any();
    a.eth_type = Some(0x0800);
    a.ipv4_dst = Some(Ipv4Addr::new(10, 0, 0, 1));
    let mut b = Match::any();
    b.eth_type = Some(0x0800);
    b.ipv4_dst = Some(Ipv4Addr::new(10, 0, 0, 2));

    let fa = stats
        .flow(&FlowKey { dpid: SW, priority: 10, pattern: a.canonical() })
        .expect("first flow retrievable");
    let fb = stats
        .flow(&FlowKey { dpid: SW, priority: 10, pattern: b.canonical() })
        .expect("second flow retrievable");
    assert_eq!((fa.packet_count, fa.byte_count), (5, 500));
    assert_eq!((fb.packet_count, fb.byte_count), (9, 900));
    assert_eq!(stats.cumulative().total_flows_created, 2);
}

#[test]
fn flow_updates_do_not_recount_creation() {
    let mut stats = StatsState::new(0);
    stats.record_flow_stats(SW, &[flow_sample(10, [10, 0, 0, 1], 5, 500)], 100);
    stats.record_flow_stats(SW, &[flow_sample(10, [10, 0, 0, 1], 50, 5000)], 102);
    assert_eq!(stats.cumulative().total_flows_created, 1);
    let flows = stats.flows_for(SW);
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].packet_count, 50);
}

#[test]
fn flow_removal_is_marked_then_swept() {
    let mut stats = StatsState::new(0);
    let sample = flow_sample(10, [10, 0, 0, 1], 5, 500);
    stats.record_flow_stats(SW, &[sample.clone()], 100);
    stats.mark_flow_removed(SW, 10, &sample.pattern, 8, 800, 150);
    let flows = stats.flows_for(SW);
    assert!(flows[0].removed);
    assert_eq!(flows[0].byte_count, 800);
    // retained until the TTL sweep catches it
    assert_eq!(stats.expire_stale_flows(150 + 601, 600), 1);
    assert!(stats.flows_for(SW).is_empty());
}

#[test]
fn health_starts_at_100_and_degrades_with_errors() {
    let mut stats = StatsState::new(0);
    assert_eq!(stats.health().score, 100.0);

    let t0 = Instant::now();
    let t1 = t0 + Duration::from_secs(1);
    // two ports, both active, one erroring
    stats.record_port_stats(SW, &[port_sample(1, 0, 0), port_sample(2, 0, 0)], t0);
    let mut erroring = port_sample(1, 1000, 0);
    erroring.rx_errors = 4;
    stats.record_port_stats(SW, &[erroring, port_sample(2, 2000, 0)], t1);

    let health = stats.health();
    assert_eq!(health.total_ports, 2);
    assert_eq!(health.active_ports, 2);
    assert_eq!(health.error_ports, 1);
    // half the ports erroring costs 15 of the 30 error points
    assert!(health.score <= 85.0);
    assert!(health.score > 0.0);
    assert_eq!(stats.cumulative().total_errors, 4);
}

#[test]
fn idle_ports_cost_activity_points() {
    let mut stats = StatsState::new(0);
    let t0 = Instant::now();
    let t1 = t0 + Duration::from_secs(1);
    // four ports, only one carries traffic: 25% < 80%
    let quiet: Vec<PortStats> = (1..=4).map(|p| port_sample(p, 0, 0)).collect();
    stats.record_port_stats(SW, &quiet, t0);
    let mut second = quiet.clone();
    second[0].rx_bytes = 1000;
    stats.record_port_stats(SW, &second, t1);
    let health = stats.health();
    assert_eq!(health.active_ports, 1);
    assert!(health.score <= 85.0);
}

#[test]
fn efficiency_summarizes_the_flow_cache() {
    let mut stats = StatsState::new(0);
    stats.record_flow_stats(SW, &[flow_sample(10, [10, 0, 0, 1], 10, 5000)], 100);
    stats.record_flow_stats(SW, &[flow_sample(10, [10, 0, 0, 2], 0, 0)], 100);
    let eff = stats.flow_efficiency();
    assert_eq!(eff.total_flows, 2);
    assert_eq!(eff.active_flows, 1);
    assert!((eff.efficiency_pct - 50.0).abs() < f64::EPSILON);
    assert!((eff.avg_packet_size - 500.0).abs() < f64::EPSILON);
}
