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

//! Multipart (statistics) messages

use crate::matching::Match;
use crate::message::PortDesc;
use crate::{Error, Result, OFPG_ANY, OFPP_ANY};

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

const MP_FLOW: u16 = 1;
const MP_PORT_STATS: u16 = 4;
const MP_PORT_DESC: u16 = 13;

/// Request body asking for flow statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStatsRequest {
    /// Table to read, `0xff` for all tables
    pub table_id: u8,
    /// Restrict to flows with this match (empty match reads everything)
    pub pattern: Match,
}

impl FlowStatsRequest {
    /// Request the flow statistics of every table.
    pub fn all_tables() -> Self {
        FlowStatsRequest { table_id: 0xff, pattern: Match::any() }
    }
}

/// Request body asking for port counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatsRequest {
    /// Port to read, or `None` for all ports
    pub port_no: Option<u32>,
}

/// A multipart request sent to a switch.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartRequest {
    /// Per-flow counters
    FlowStats(FlowStatsRequest),
    /// Per-port counters
    PortStats(PortStatsRequest),
    /// Port descriptions (numbers, names, hardware addresses, link state)
    PortDesc,
}

impl MultipartRequest {
    /// Byte size of the marshaled request body.
    pub fn size_of(&self) -> usize {
        8 + match self {
            MultipartRequest::FlowStats(req) => 32 + req.pattern.size_of(),
            MultipartRequest::PortStats(_) => 8,
            MultipartRequest::PortDesc => 0,
        }
    }

    /// Serialize the request body (multipart header plus type-specific part).
    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        let mp_type = match self {
            MultipartRequest::FlowStats(_) => MP_FLOW,
            MultipartRequest::PortStats(_) => MP_PORT_STATS,
            MultipartRequest::PortDesc => MP_PORT_DESC,
        };
        bytes.extend_from_slice(&mp_type.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes()); // flags
        bytes.extend_from_slice(&[0; 4]);
        match self {
            MultipartRequest::FlowStats(req) => {
                bytes.push(req.table_id);
                bytes.extend_from_slice(&[0; 3]);
                bytes.extend_from_slice(&OFPP_ANY.to_be_bytes());
                bytes.extend_from_slice(&OFPG_ANY.to_be_bytes());
                bytes.extend_from_slice(&[0; 4]);
                bytes.extend_from_slice(&0u64.to_be_bytes()); // cookie
                bytes.extend_from_slice(&0u64.to_be_bytes()); // cookie mask
                req.pattern.marshal(bytes);
            }
            MultipartRequest::PortStats(req) => {
                bytes.extend_from_slice(&req.port_no.unwrap_or(OFPP_ANY).to_be_bytes());
                bytes.extend_from_slice(&[0; 4]);
            }
            MultipartRequest::PortDesc => (),
        }
    }
}

/// Counters of a single port, from a port-statistics reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortStats {
    /// Port number
    pub port_no: u32,
    /// Packets received
    pub rx_packets: u64,
    /// Packets transmitted
    pub tx_packets: u64,
    /// Bytes received
    pub rx_bytes: u64,
    /// Bytes transmitted
    pub tx_bytes: u64,
    /// Packets dropped on receive
    pub rx_dropped: u64,
    /// Packets dropped on transmit
    pub tx_dropped: u64,
    /// Receive errors
    pub rx_errors: u64,
    /// Transmit errors
    pub tx_errors: u64,
    /// Seconds the port has been alive
    pub duration_sec: u32,
}

impl PortStats {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Self> {
        let port_no = bytes.read_u32::<BigEndian>()?;
        skip(bytes, 4)?;
        let rx_packets = bytes.read_u64::<BigEndian>()?;
        let tx_packets = bytes.read_u64::<BigEndian>()?;
        let rx_bytes = bytes.read_u64::<BigEndian>()?;
        let tx_bytes = bytes.read_u64::<BigEndian>()?;
        let rx_dropped = bytes.read_u64::<BigEndian>()?;
        let tx_dropped = bytes.read_u64::<BigEndian>()?;
        let rx_errors = bytes.read_u64::<BigEndian>()?;
        let tx_errors = bytes.read_u64::<BigEndian>()?;
        // frame / over / crc errors and collisions
        skip(bytes, 32)?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let _duration_nsec = bytes.read_u32::<BigEndian>()?;
        Ok(PortStats {
            port_no,
            rx_packets,
            tx_packets,
            rx_bytes,
            tx_bytes,
            rx_dropped,
            tx_dropped,
            rx_errors,
            tx_errors,
            duration_sec,
        })
    }
}

/// Statistics of a single flow entry, from a flow-statistics reply.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowStats {
    /// Table the entry lives in
    pub table_id: u8,
    /// Seconds the entry has been installed
    pub duration_sec: u32,
    /// Priority of the entry
    pub priority: u16,
    /// Idle timeout of the entry
    pub idle_timeout: u16,
    /// Hard timeout of the entry
    pub hard_timeout: u16,
    /// Cookie of the entry
    pub cookie: u64,
    /// Packets matched
    pub packet_count: u64,
    /// Bytes matched
    pub byte_count: u64,
    /// Match of the entry
    pub pattern: Match,
}

impl FlowStats {
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Self> {
        let start = bytes.position();
        let length = bytes.read_u16::<BigEndian>()? as u64;
        let table_id = bytes.read_u8()?;
        skip(bytes, 1)?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let _duration_nsec = bytes.read_u32::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        let hard_timeout = bytes.read_u16::<BigEndian>()?;
        let _flags = bytes.read_u16::<BigEndian>()?;
        skip(bytes, 4)?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let pattern = Match::parse(bytes)?;
        // skip the instructions; counters and match are all the cache needs
        let consumed = bytes.position() - start;
        skip(bytes, (length.saturating_sub(consumed)) as usize)?;
        Ok(FlowStats {
            table_id,
            duration_sec,
            priority,
            idle_timeout,
            hard_timeout,
            cookie,
            packet_count,
            byte_count,
            pattern,
        })
    }
}

/// A multipart reply from a switch.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartReply {
    /// Per-flow counters
    FlowStats(Vec<FlowStats>),
    /// Per-port counters
    PortStats(Vec<PortStats>),
    /// Port descriptions
    PortDesc(Vec<PortDesc>),
}

impl MultipartReply {
    /// Parse a multipart reply body.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let mut bytes = Cursor::new(buf);
        let mp_type = bytes.read_u16::<BigEndian>()?;
        let _flags = bytes.read_u16::<BigEndian>()?;
        skip(&mut bytes, 4)?;
        match mp_type {
            MP_FLOW => {
                let mut entries = Vec::new();
                while (bytes.position() as usize) < buf.len() {
                    entries.push(FlowStats::parse(&mut bytes)?);
                }
                Ok(MultipartReply::FlowStats(entries))
            }
            MP_PORT_STATS => {
                let mut entries = Vec::new();
                while (bytes.position() as usize) + 112 <= buf.len() {
                    entries.push(PortStats::parse(&mut bytes)?);
                }
                Ok(MultipartReply::PortStats(entries))
            }
            MP_PORT_DESC => {
                let mut entries = Vec::new();
                while (bytes.position() as usize) + 64 <= buf.len() {
                    entries.push(PortDesc::parse(&mut bytes)?);
                }
                Ok(MultipartReply::PortDesc(entries))
            }
            t => Err(Error::UnknownMultipartType(t)),
        }
    }
}

fn skip(bytes: &mut Cursor<&[u8]>, n: usize) -> Result<()> {
    let mut buf = vec![0u8; n];
    bytes.read_exact(&mut buf)?;
    Ok(())
}
