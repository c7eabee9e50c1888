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

//! # OpenFlow 1.3 Wire Codec
//!
//! This is a small crate implementing the subset of the OpenFlow 1.3 protocol needed to drive a
//! two-table switch pipeline: the symmetric session messages (hello, echo, features, barrier),
//! flow modifications with OXM matches and instructions, packet-in / packet-out, flow-removed and
//! port-status notifications, and the multipart statistics family (port statistics, flow
//! statistics, and port descriptions).
//!
//! All messages are represented as plain Rust values. [`Message::marshal`] serializes a message
//! (including its header) into a byte buffer, and [`Message::parse`] deserializes a message from
//! a previously read [`Header`] and body buffer. Parsing never panics on malformed input; every
//! error is reported through [`Error`].
//!
//! ```
//! use openflow::{FlowMod, Header, Instruction, Match, Message};
//!
//! fn main() -> Result<(), openflow::Error> {
//!     let mut m = Match::any();
//!     m.eth_type = Some(0x0800);
//!     m.ipv4_src = Some(std::net::Ipv4Addr::new(10, 0, 0, 5));
//!     let fm = FlowMod::add_flow(0, 1010, m, vec![Instruction::ClearActions]);
//!     let bytes = Message::marshal(7, Message::FlowMod(fm));
//!     let header = Header::parse(&bytes[0..8])?;
//!     let (xid, msg) = Message::parse(&header, &bytes[8..])?;
//!     assert_eq!(xid, 7);
//!     assert!(matches!(msg, Message::FlowMod(_)));
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]

mod action;
mod header;
mod matching;
mod message;
mod multipart;

#[cfg(test)]
mod test;

pub use action::{Action, Instruction, PseudoPort};
pub use header::Header;
pub use matching::Match;
pub use message::{
    ErrorMsg, FlowMod, FlowModCmd, FlowRemoved, FlowRemovedReason, Message, MsgCode, PacketIn,
    PacketInReason, PacketOut, Payload, PortDesc, PortReason, PortStatus, SwitchFeatures, Timeout,
    FLOW_MOD_SEND_FLOW_REM,
};
pub use multipart::{
    FlowStats, FlowStatsRequest, MultipartReply, MultipartRequest, PortStats, PortStatsRequest,
};

use thiserror::Error as ThisError;

/// The protocol version implemented by this crate (OpenFlow 1.3).
pub const OFP_VERSION: u8 = 0x04;

/// Buffer id signalling "not buffered" in packet-in, packet-out and flow-mod messages.
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Wildcard port number for flow-mod `out_port` and statistics requests.
pub const OFPP_ANY: u32 = 0xffff_ffff;

/// Wildcard group number for flow-mod `out_group` and statistics requests.
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// Codec error type
#[derive(Debug, ThisError)]
pub enum Error {
    /// The message (or a field inside it) ends before its encoding is complete.
    #[error("Truncated message: {0}")]
    Truncated(#[from] std::io::Error),
    /// The header announces a protocol version other than OpenFlow 1.3.
    #[error("Unsupported OpenFlow version: 0x{0:02x}")]
    UnsupportedVersion(u8),
    /// The header length field is smaller than the header itself.
    #[error("Invalid message length: {0}")]
    InvalidLength(usize),
    /// A match structure announces a type other than OXM.
    #[error("Unsupported match type: {0}")]
    UnsupportedMatchType(u16),
    /// A multipart message carries an unknown body type.
    #[error("Unknown multipart type: {0}")]
    UnknownMultipartType(u16),
}

/// Codec result type
pub type Result<T> = core::result::Result<T, Error>;
