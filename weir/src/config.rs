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

//! This module is responsible for reading the controller configuration from the environment.
//! Configuration is environment-derived, read exactly once at startup; there are no flags.

use crate::error::{Error, Result};

use std::env;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Controller configuration, read from `WEIR_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the OpenFlow listener binds to (`WEIR_OPENFLOW_LISTEN`, default `0.0.0.0:6653`)
    pub openflow_listen: String,
    /// Address the Management API binds to (`WEIR_API_LISTEN`, default `0.0.0.0:8080`)
    pub api_listen: String,
    /// Policy Engine host (`WEIR_POLICY_ENGINE_HOST`, default `127.0.0.1`)
    pub policy_engine_host: String,
    /// Policy Engine port (`WEIR_POLICY_ENGINE_PORT`, default `9000`)
    pub policy_engine_port: u16,
    /// Policy poll interval (`WEIR_POLICY_POLL_INTERVAL`, seconds, default 30)
    pub policy_poll_interval: Duration,
    /// Topology discovery interval (`WEIR_DISCOVERY_INTERVAL`, seconds, default 10)
    pub discovery_interval: Duration,
    /// Statistics collection interval (`WEIR_STATS_INTERVAL`, seconds, default 2)
    pub stats_interval: Duration,
    /// Optional controller-protection address (`WEIR_PROTECTED_IP`): when set, a guard entry
    /// dropping data-plane traffic towards this address is installed on every switch
    pub protected_ip: Option<Ipv4Addr>,
    /// Hosts unseen for this long are swept (`WEIR_HOST_TTL`, seconds, default 300)
    pub host_ttl: Duration,
    /// Flow-cache entries not updated for this long are swept (`WEIR_FLOW_TTL`, seconds,
    /// default 600)
    pub flow_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openflow_listen: String::from("0.0.0.0:6653"),
            api_listen: String::from("0.0.0.0:8080"),
            policy_engine_host: String::from("127.0.0.1"),
            policy_engine_port: 9000,
            policy_poll_interval: Duration::from_secs(30),
            discovery_interval: Duration::from_secs(10),
            stats_interval: Duration::from_secs(2),
            protected_ip: None,
            host_ttl: Duration::from_secs(300),
            flow_ttl: Duration::from_secs(600),
        }
    }
}

impl Config {
    /// Build the configuration from the process environment. Unset variables fall back to their
    /// defaults; set-but-unparsable values are errors.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        if let Some(listen) = read_var("WEIR_OPENFLOW_LISTEN") {
            config.openflow_listen = listen;
        }
        if let Some(listen) = read_var("WEIR_API_LISTEN") {
            config.api_listen = listen;
        }
        if let Some(host) = read_var("WEIR_POLICY_ENGINE_HOST") {
            config.policy_engine_host = host;
        }
        if let Some(port) = read_var("WEIR_POLICY_ENGINE_PORT") {
            config.policy_engine_port = parse_var("WEIR_POLICY_ENGINE_PORT", &port)?;
        }
        if let Some(secs) = read_var("WEIR_POLICY_POLL_INTERVAL") {
            config.policy_poll_interval =
                Duration::from_secs(parse_var("WEIR_POLICY_POLL_INTERVAL", &secs)?);
        }
        if let Some(secs) = read_var("WEIR_DISCOVERY_INTERVAL") {
            config.discovery_interval =
                Duration::from_secs(parse_var("WEIR_DISCOVERY_INTERVAL", &secs)?);
        }
        if let Some(secs) = read_var("WEIR_STATS_INTERVAL") {
            config.stats_interval = Duration::from_secs(parse_var("WEIR_STATS_INTERVAL", &secs)?);
        }
        if let Some(ip) = read_var("WEIR_PROTECTED_IP") {
            config.protected_ip = Some(parse_var("WEIR_PROTECTED_IP", &ip)?);
        }
        if let Some(secs) = read_var("WEIR_HOST_TTL") {
            config.host_ttl = Duration::from_secs(parse_var("WEIR_HOST_TTL", &secs)?);
        }
        if let Some(secs) = read_var("WEIR_FLOW_TTL") {
            config.flow_ttl = Duration::from_secs(parse_var("WEIR_FLOW_TTL", &secs)?);
        }
        Ok(config)
    }
}

fn read_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
    })
}
