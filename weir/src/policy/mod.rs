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

//! # Policies
//!
//! The cached policy set together with its two consumers: the per-packet
//! [evaluator](crate::policy::evaluate) and the proactive [compiler](crate::policy::compile).
//! Policy documents are authored and versioned by the external Policy Engine; the controller
//! holds the full set as an opaque cache, replaced wholesale on each successful sync.
//!
//! Both consumers walk the set in the same order: descending priority, ties broken by id — so a
//! packet-in and a compiled flow table always agree on which policy wins.

pub mod compile;
pub mod evaluate;

use itertools::Itertools;
use log::*;
use policy_engine::Policy;

/// The cached policy set, plus the Policy Engine availability flag.
#[derive(Debug, Default)]
pub struct PolicyCache {
    /// Policies in evaluation order (descending priority, then id)
    policies: Vec<Policy>,
    /// Whether the last sync attempt reached the Policy Engine
    available: bool,
    /// Unix timestamp of the last successful sync
    last_sync: Option<u64>,
}

impl PolicyCache {
    /// Create an empty cache; the Policy Engine counts as unavailable until the first
    /// successful sync.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached set wholesale with a freshly fetched one, marking the engine
    /// available.
    pub fn replace(&mut self, policies: Vec<Policy>, now: u64) {
        self.policies = policies
            .into_iter()
            .sorted_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)))
            .collect();
        self.last_sync = Some(now);
        if !self.available {
            info!("Policy Engine reachable, cached {} policies", self.policies.len());
            self.available = true;
        }
    }

    /// Record a failed sync. The cached policies stay untouched: enforcement degrades to the
    /// last known good set. The transition is logged once.
    pub fn mark_unavailable(&mut self, error: &dyn std::fmt::Display) {
        if self.available {
            warn!("Policy Engine became unreachable: {}", error);
            self.available = false;
        }
    }

    /// Whether the last sync attempt succeeded.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Unix timestamp of the last successful sync, if any.
    pub fn last_sync(&self) -> Option<u64> {
        self.last_sync
    }

    /// The cached policies in evaluation/compilation order.
    pub fn ordered(&self) -> &[Policy] {
        &self.policies
    }

    /// Number of cached policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the cache holds no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Number of enabled policies.
    pub fn enabled_count(&self) -> usize {
        self.policies.iter().filter(|p| p.enabled).count()
    }
}
