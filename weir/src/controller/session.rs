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

//! # Switch Sessions
//!
//! One thread per switch connection: hello exchange, features request, then a blocking
//! read-dispatch loop for the lifetime of the session. A failed or closed connection tears the
//! switch down; everything it contributed to the model is removed and the next connection of the
//! same datapath starts fresh.

use crate::controller::{Controller, SwitchHandle};
use crate::error::{Error, Result};
use crate::types::Dpid;
use crate::Stopper;

use log::*;
use openflow::{Header, Message};
use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Accept switch connections on `addr` until the stopper fires, spawning one session thread per
/// connection.
pub fn listen(controller: Arc<Controller>, addr: &str, stopper: Stopper) -> Result<()> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    info!("Listening for switches on {}", addr);
    loop {
        if stopper.is_stop() {
            info!("Stopping listener");
            return Ok(());
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("Connection from {}", peer);
                let controller = Arc::clone(&controller);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(controller, stream) {
                        warn!("Session from {} ended with error: {}", peer, e);
                    }
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(100));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Drive one switch connection: handshake, registration, dispatch loop, teardown.
pub fn handle_connection(controller: Arc<Controller>, stream: TcpStream) -> Result<()> {
    let mut reader = stream.try_clone()?;
    let handle = SwitchHandle::new(stream);

    handle.send_raw(&Message::marshal(0, Message::Hello))?;
    let dpid = handshake(&handle, &mut reader)?;
    controller.switch_connected(dpid, handle);

    let result = dispatch_loop(&controller, dpid, &mut reader);
    controller.switch_disconnected(dpid);
    result
}

/// Read messages until the features reply identifies the datapath. The switch's hello is
/// answered by the hello already sent; anything else before identification is ignored.
fn handshake(handle: &SwitchHandle, reader: &mut TcpStream) -> Result<Dpid> {
    loop {
        let (_, msg) = match read_message(reader)? {
            Some(parsed) => parsed,
            None => return Err(Error::HandshakeFailed),
        };
        match msg {
            Message::Hello => {
                handle.send_raw(&Message::marshal(0, Message::FeaturesRequest))?;
            }
            Message::FeaturesReply(features) => {
                let dpid = Dpid(features.datapath_id);
                debug!(
                    "Handshake complete: datapath {} with {} tables",
                    dpid, features.num_tables
                );
                return Ok(dpid);
            }
            Message::EchoRequest(data) => {
                handle.send_raw(&Message::marshal(0, Message::EchoReply(data)))?;
            }
            other => trace!("Ignoring pre-handshake message {:?}", other),
        }
    }
}

fn dispatch_loop(controller: &Controller, dpid: Dpid, reader: &mut TcpStream) -> Result<()> {
    loop {
        match read_message(reader) {
            Ok(Some((_, msg))) => controller.handle_message(dpid, msg),
            Ok(None) => {
                info!("Switch {} closed the connection", dpid);
                return Ok(());
            }
            Err(Error::OpenFlow(e)) => {
                // a malformed message aborts the session; the switch will reconnect
                warn!("Protocol error from {}: {}", dpid, e);
                return Err(e.into());
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read one complete message off the stream. Returns `Ok(None)` on a clean end of stream at a
/// message boundary.
fn read_message(stream: &mut TcpStream) -> Result<Option<(Header, Message)>> {
    let mut header_buf = [0u8; Header::SIZE];
    match stream.read_exact(&mut header_buf) {
        Ok(()) => (),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let header = Header::parse(&header_buf)?;
    let mut body = vec![0u8; header.body_len()];
    stream.read_exact(&mut body)?;
    let (_, msg) = Message::parse(&header, &body)?;
    Ok(Some((header, msg)))
}
