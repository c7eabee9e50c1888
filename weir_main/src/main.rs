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

use std::error::Error;
use std::sync::Arc;
use std::thread;

use log::*;
use weir::controller::Controller;
use weir::{Config, Stopper};

fn main() -> Result<(), Box<dyn Error>> {
    // initialize the env logger
    pretty_env_logger::init();

    // configuration is environment-derived, read exactly once
    let config = Config::from_env()?;
    info!(
        "Starting controller: OpenFlow on {}, API on {}, Policy Engine at {}:{}",
        config.openflow_listen,
        config.api_listen,
        config.policy_engine_host,
        config.policy_engine_port
    );

    let controller = Arc::new(Controller::new(config.clone())?);
    let stopper = Stopper::new();
    let mut workers = Vec::new();

    // periodic loops: topology discovery, statistics collection, policy sync
    let c = Arc::clone(&controller);
    let s = stopper.clone();
    workers.push(thread::spawn(move || c.run_discovery_loop(s)));

    let c = Arc::clone(&controller);
    let s = stopper.clone();
    workers.push(thread::spawn(move || c.run_stats_loop(s)));

    let c = Arc::clone(&controller);
    let s = stopper.clone();
    workers.push(thread::spawn(move || c.run_policy_loop(s)));

    // the Management API owns the only async runtime, on its own thread
    let c = Arc::clone(&controller);
    let s = stopper.clone();
    let api_listen = config.api_listen.clone();
    workers.push(thread::spawn(move || {
        if let Err(e) = weir_api::serve(c, &api_listen, s) {
            error!("Management API failed: {}", e);
        }
    }));

    // the OpenFlow listener runs on the main thread until the stopper fires
    let result = controller.run_listener(stopper.clone());
    stopper.send_stop();
    for worker in workers {
        let _ = worker.join();
    }
    result?;
    Ok(())
}
