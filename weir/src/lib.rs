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

#![deny(missing_docs)]

//! # Weir: a Policy-Enforcing OpenFlow Controller
//!
//! Weir is the control plane of a software-defined network: it maintains a live model of the
//! network (switches, links, hosts), forwards as a learning switch, enforces externally authored
//! policy documents both per packet and as proactively compiled flow tables, and continuously
//! derives bandwidth and health metrics from switch counters.
//!
//! ## Structure
//!
//! - **[`topology`]**: the in-memory network model — switches with their ports, the link list
//!   (rebuilt wholesale on every discovery tick) and the learned hosts (last write wins, TTL
//!   swept).
//!
//! - **[`discovery`]**: the link discovery source. LLDP probes are flooded on every tick; probes
//!   arriving back as packet-ins become timestamped link observations.
//!
//! - **[`policy`]**: the cached policy set with its two consumers — the per-packet
//!   [evaluator](policy::evaluate) (allow/deny, default allow) and the proactive
//!   [compiler](policy::compile) (one flow-table entry per enabled policy).
//!
//! - **[`forwarding`]**: the packet-in state machine: learn, evaluate, resolve
//!   (unicast-or-flood), install a reactive flow, emit the packet-out.
//!
//! - **[`stats`]**: counter ingestion, per-port rates, the flow cache, cumulative totals and the
//!   derived health score.
//!
//! - **[`controller`]**: switch sessions (thread per connection), the message dispatcher, the
//!   periodic loops, and the read surface the Management API is built on.
//!
//! All shared state lives in one [`controller::NetworkModel`] behind a single coarse
//! reader-writer lock: sessions, periodic loops and the API all observe the model as a single
//! serialized unit, and protocol I/O stays outside the lock.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::thread;
//! use weir::controller::Controller;
//! use weir::{Config, Stopper};
//!
//! fn main() -> Result<(), weir::Error> {
//!     let config = Config::from_env()?;
//!     let controller = Arc::new(Controller::new(config)?);
//!     let stopper = Stopper::new();
//!
//!     let c = Arc::clone(&controller);
//!     let s = stopper.clone();
//!     thread::spawn(move || c.run_discovery_loop(s));
//!     let c = Arc::clone(&controller);
//!     let s = stopper.clone();
//!     thread::spawn(move || c.run_stats_loop(s));
//!     let c = Arc::clone(&controller);
//!     let s = stopper.clone();
//!     thread::spawn(move || c.run_policy_loop(s));
//!
//!     controller.run_listener(stopper)
//! }
//! ```

pub mod config;
pub mod controller;
pub mod discovery;
pub mod forwarding;
pub mod policy;
pub mod stats;
pub mod topology;
pub mod types;

mod error;
mod test;

pub use config::Config;
pub use error::{Error, Result};

use std::sync::{Arc, RwLock};

/// Stopper, to check when to stop, or to send the stop command. Every long-running loop polls
/// one of these, which is the shutdown signal of the whole process.
#[derive(Clone, Debug, Default)]
pub struct Stopper {
    b: Arc<RwLock<bool>>,
}

impl Stopper {
    /// Create a new stopper
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the stop command. This function will block until the write lock can be acquired.
    pub fn send_stop(&self) {
        *self.b.write().unwrap() = true;
    }

    /// Checks if the stop flag is set. This function will block until the read lock can be
    /// acquired.
    pub fn is_stop(&self) -> bool {
        *self.b.read().unwrap()
    }
}
