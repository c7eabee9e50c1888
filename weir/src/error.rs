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

//! Module containing all error types

use crate::types::Dpid;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error propagated from the OpenFlow codec
    #[error("OpenFlow codec error: {0}")]
    OpenFlow(#[from] openflow::Error),
    /// Error propagated from the Policy Engine client
    #[error("Policy Engine error: {0}")]
    PolicyEngine(#[from] policy_engine::Error),
    /// IO error on a switch connection or the listener socket
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The referenced switch is not connected
    #[error("Switch {0} is not connected")]
    SwitchNotConnected(Dpid),
    /// The switch closed its connection during the handshake
    #[error("Switch closed the connection before completing the handshake")]
    HandshakeFailed,
    /// A configuration value cannot be parsed
    #[error("Invalid configuration value for {key}: {value}")]
    InvalidConfig {
        /// The environment variable
        key: String,
        /// The offending value
        value: String,
    },
}

/// Controller result type
pub type Result<T> = core::result::Result<T, Error>;
