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

//! OpenFlow message bodies

use crate::action::{Action, Instruction, PseudoPort};
use crate::header::Header;
use crate::matching::Match;
use crate::multipart::{MultipartReply, MultipartRequest};
use crate::{Result, OFPG_ANY, OFPP_ANY, OFP_NO_BUFFER};

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// OpenFlow 1.3 message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgCode {
    /// OFPT_HELLO
    Hello = 0,
    /// OFPT_ERROR
    Error = 1,
    /// OFPT_ECHO_REQUEST
    EchoRequest = 2,
    /// OFPT_ECHO_REPLY
    EchoReply = 3,
    /// OFPT_FEATURES_REQUEST
    FeaturesRequest = 5,
    /// OFPT_FEATURES_REPLY
    FeaturesReply = 6,
    /// OFPT_PACKET_IN
    PacketIn = 10,
    /// OFPT_FLOW_REMOVED
    FlowRemoved = 11,
    /// OFPT_PORT_STATUS
    PortStatus = 12,
    /// OFPT_PACKET_OUT
    PacketOut = 13,
    /// OFPT_FLOW_MOD
    FlowMod = 14,
    /// OFPT_MULTIPART_REQUEST
    MultipartRequest = 18,
    /// OFPT_MULTIPART_REPLY
    MultipartReply = 19,
    /// OFPT_BARRIER_REQUEST
    BarrierRequest = 20,
    /// OFPT_BARRIER_REPLY
    BarrierReply = 21,
}

/// How long before a flow entry expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// The entry never expires on its own.
    Permanent,
    /// The entry expires after this many seconds.
    ExpiresAfter(u16),
}

impl Timeout {
    /// Decode a wire timeout (zero means permanent).
    pub fn of_int(tm: u16) -> Timeout {
        match tm {
            0 => Timeout::Permanent,
            d => Timeout::ExpiresAfter(d),
        }
    }

    /// The wire encoding of the timeout.
    pub fn to_int(self) -> u16 {
        match self {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(d) => d,
        }
    }
}

/// Type of modification to perform on a flow table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlowModCmd {
    /// Add a new flow entry
    Add = 0,
    /// Modify all matching entries
    Modify = 1,
    /// Modify entries strictly matching wildcards and priority
    ModifyStrict = 2,
    /// Delete all matching entries
    Delete = 3,
    /// Delete entries strictly matching wildcards and priority
    DeleteStrict = 4,
}

/// Flow-mod flag requesting a flow-removed message when the entry expires or is deleted.
pub const FLOW_MOD_SEND_FLOW_REM: u16 = 1;

/// Modification to a flow table, sent from the controller to a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMod {
    /// Opaque controller-chosen identifier
    pub cookie: u64,
    /// Table to operate on
    pub table_id: u8,
    /// The modification to perform
    pub command: FlowModCmd,
    /// Idle timeout before discarding (no matching packets)
    pub idle_timeout: Timeout,
    /// Max time before discarding
    pub hard_timeout: Timeout,
    /// Priority within the table; higher numbers match first
    pub priority: u16,
    /// Buffered packet to apply the flow to, if any
    pub apply_to_packet: Option<u32>,
    /// For delete commands: require this output port, if set
    pub out_port: Option<PseudoPort>,
    /// Flow-mod flags (`FLOW_MOD_SEND_FLOW_REM` et al.)
    pub flags: u16,
    /// Fields to match
    pub pattern: Match,
    /// Instructions executed when the entry matches
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    /// Construct an add-flow modification with idle/hard timeouts of zero (permanent entry) and
    /// flow-removed notifications disabled.
    pub fn add_flow(table_id: u8, priority: u16, pattern: Match, instructions: Vec<Instruction>) -> Self {
        FlowMod {
            cookie: 0,
            table_id,
            command: FlowModCmd::Add,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            priority,
            apply_to_packet: None,
            out_port: None,
            flags: 0,
            pattern,
            instructions,
        }
    }

    /// Construct a delete-flows modification removing every entry of the given table.
    pub fn delete_all_flows(table_id: u8) -> Self {
        FlowMod {
            cookie: 0,
            table_id,
            command: FlowModCmd::Delete,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            priority: 0,
            apply_to_packet: None,
            out_port: None,
            flags: 0,
            pattern: Match::any(),
            instructions: vec![],
        }
    }

    fn size_of(&self) -> usize {
        40 + self.pattern.size_of() + Instruction::size_of_sequence(&self.instructions)
    }

    fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.cookie.to_be_bytes());
        bytes.extend_from_slice(&0u64.to_be_bytes()); // cookie mask
        bytes.push(self.table_id);
        bytes.push(self.command as u8);
        bytes.extend_from_slice(&self.idle_timeout.to_int().to_be_bytes());
        bytes.extend_from_slice(&self.hard_timeout.to_int().to_be_bytes());
        bytes.extend_from_slice(&self.priority.to_be_bytes());
        bytes.extend_from_slice(&self.apply_to_packet.unwrap_or(OFP_NO_BUFFER).to_be_bytes());
        bytes.extend_from_slice(&self.out_port.map_or(OFPP_ANY, PseudoPort::to_int).to_be_bytes());
        bytes.extend_from_slice(&OFPG_ANY.to_be_bytes());
        bytes.extend_from_slice(&self.flags.to_be_bytes());
        bytes.extend_from_slice(&[0; 2]);
        self.pattern.marshal(bytes);
        for instr in &self.instructions {
            instr.marshal(bytes);
        }
    }

    fn parse(buf: &[u8]) -> Result<Self> {
        let mut bytes = Cursor::new(buf);
        let cookie = bytes.read_u64::<BigEndian>()?;
        let _cookie_mask = bytes.read_u64::<BigEndian>()?;
        let table_id = bytes.read_u8()?;
        let command = match bytes.read_u8()? {
            1 => FlowModCmd::Modify,
            2 => FlowModCmd::ModifyStrict,
            3 => FlowModCmd::Delete,
            4 => FlowModCmd::DeleteStrict,
            _ => FlowModCmd::Add,
        };
        let idle_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let hard_timeout = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let priority = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let out_port_raw = bytes.read_u32::<BigEndian>()?;
        let _out_group = bytes.read_u32::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        skip(&mut bytes, 2)?;
        let pattern = Match::parse(&mut bytes)?;
        let remaining = buf.len() - bytes.position() as usize;
        let instructions = Instruction::parse_sequence(&mut bytes, remaining)?;
        Ok(FlowMod {
            cookie,
            table_id,
            command,
            idle_timeout,
            hard_timeout,
            priority,
            apply_to_packet: match buffer_id {
                OFP_NO_BUFFER => None,
                n => Some(n),
            },
            out_port: match out_port_raw {
                OFPP_ANY => None,
                p => Some(PseudoPort::of_int(p)),
            },
            flags,
            pattern,
            instructions,
        })
    }
}

/// The data associated with a packet handed to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// The switch buffers the packet; only a prefix is included.
    Buffered(u32, Vec<u8>),
    /// The full packet is included.
    NotBuffered(Vec<u8>),
}

impl Payload {
    /// The packet bytes carried in the payload.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Payload::Buffered(_, buf) | Payload::NotBuffered(buf) => buf,
        }
    }

    /// The switch-side buffer id, if the packet is buffered.
    pub fn buffer_id(&self) -> Option<u32> {
        match self {
            Payload::Buffered(id, _) => Some(*id),
            Payload::NotBuffered(_) => None,
        }
    }
}

/// The reason a packet arrives at the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketInReason {
    /// No flow entry matched (table-miss)
    NoMatch,
    /// An explicit output-to-controller action
    ExplicitSend,
    /// The packet's TTL is invalid
    InvalidTtl,
    /// A reason code this crate does not know
    Unknown(u8),
}

/// A packet received by the datapath and sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketIn {
    /// Packet data (and buffer id, if buffered on the switch)
    pub payload: Payload,
    /// Full length of the packet on the wire
    pub total_len: u16,
    /// Why the packet was sent to the controller
    pub reason: PacketInReason,
    /// Table that triggered the send
    pub table_id: u8,
    /// Cookie of the flow entry that triggered the send
    pub cookie: u64,
    /// Ingress port, from the embedded match
    pub in_port: Option<u32>,
}

impl PacketIn {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut bytes = Cursor::new(buf);
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let total_len = bytes.read_u16::<BigEndian>()?;
        let reason = match bytes.read_u8()? {
            0 => PacketInReason::NoMatch,
            1 => PacketInReason::ExplicitSend,
            2 => PacketInReason::InvalidTtl,
            r => PacketInReason::Unknown(r),
        };
        let table_id = bytes.read_u8()?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let pattern = Match::parse(&mut bytes)?;
        skip(&mut bytes, 2)?;
        let mut data = Vec::new();
        bytes.read_to_end(&mut data)?;
        Ok(PacketIn {
            payload: match buffer_id {
                OFP_NO_BUFFER => Payload::NotBuffered(data),
                id => Payload::Buffered(id, data),
            },
            total_len,
            reason,
            table_id,
            cookie,
            in_port: pattern.in_port,
        })
    }
}

/// A packet sent out of the datapath on the controller's request.
#[derive(Debug, Clone, PartialEq)]
pub struct PacketOut {
    /// Packet data, or the buffer id of a packet held on the switch
    pub payload: Payload,
    /// Ingress port to pretend the packet arrived on, if any
    pub in_port: Option<u32>,
    /// Actions applied to the packet, in order
    pub actions: Vec<Action>,
}

impl PacketOut {
    fn size_of(&self) -> usize {
        let data_len = match &self.payload {
            Payload::Buffered(_, _) => 0,
            Payload::NotBuffered(buf) => buf.len(),
        };
        16 + Action::size_of_sequence(&self.actions) + data_len
    }

    fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.payload.buffer_id().unwrap_or(OFP_NO_BUFFER).to_be_bytes());
        bytes.extend_from_slice(
            &self.in_port.map_or(0xffff_fffdu32, |p| p).to_be_bytes(), // OFPP_CONTROLLER
        );
        bytes.extend_from_slice(&(Action::size_of_sequence(&self.actions) as u16).to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        for action in &self.actions {
            action.marshal(bytes);
        }
        if let Payload::NotBuffered(buf) = &self.payload {
            bytes.extend_from_slice(buf);
        }
    }
}

/// The reason a flow entry was removed from a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRemovedReason {
    /// The idle timeout elapsed
    IdleTimeout,
    /// The hard timeout elapsed
    HardTimeout,
    /// Deleted by a flow-mod
    Delete,
    /// The group it pointed to was deleted
    GroupDelete,
    /// A reason code this crate does not know
    Unknown(u8),
}

/// Notification that a flow entry was removed from a table.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRemoved {
    /// Cookie of the removed entry
    pub cookie: u64,
    /// Priority of the removed entry
    pub priority: u16,
    /// Why the entry was removed
    pub reason: FlowRemovedReason,
    /// Table the entry lived in
    pub table_id: u8,
    /// Lifetime of the entry in seconds
    pub duration_sec: u32,
    /// Packets matched by the entry
    pub packet_count: u64,
    /// Bytes matched by the entry
    pub byte_count: u64,
    /// Match of the removed entry
    pub pattern: Match,
}

impl FlowRemoved {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut bytes = Cursor::new(buf);
        let cookie = bytes.read_u64::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let reason = match bytes.read_u8()? {
            0 => FlowRemovedReason::IdleTimeout,
            1 => FlowRemovedReason::HardTimeout,
            2 => FlowRemovedReason::Delete,
            3 => FlowRemovedReason::GroupDelete,
            r => FlowRemovedReason::Unknown(r),
        };
        let table_id = bytes.read_u8()?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let _duration_nsec = bytes.read_u32::<BigEndian>()?;
        let _idle_timeout = bytes.read_u16::<BigEndian>()?;
        let _hard_timeout = bytes.read_u16::<BigEndian>()?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let pattern = Match::parse(&mut bytes)?;
        Ok(FlowRemoved {
            cookie,
            priority,
            reason,
            table_id,
            duration_sec,
            packet_count,
            byte_count,
            pattern,
        })
    }
}

/// Switch capabilities and identity, sent in reply to a features request. OpenFlow 1.3 no longer
/// lists ports here; port descriptions come from the port-description multipart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchFeatures {
    /// Datapath identifier (globally unique per device)
    pub datapath_id: u64,
    /// Number of packets the switch can buffer
    pub num_buffers: u32,
    /// Number of flow tables
    pub num_tables: u8,
    /// Auxiliary connection id (0 on the main connection)
    pub auxiliary_id: u8,
    /// Capability bitmap as announced by the switch
    pub capabilities: u32,
}

impl SwitchFeatures {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut bytes = Cursor::new(buf);
        let datapath_id = bytes.read_u64::<BigEndian>()?;
        let num_buffers = bytes.read_u32::<BigEndian>()?;
        let num_tables = bytes.read_u8()?;
        let auxiliary_id = bytes.read_u8()?;
        skip(&mut bytes, 2)?;
        let capabilities = bytes.read_u32::<BigEndian>()?;
        let _reserved = bytes.read_u32::<BigEndian>()?;
        Ok(SwitchFeatures { datapath_id, num_buffers, num_tables, auxiliary_id, capabilities })
    }
}

/// Description of a single switch port (OpenFlow 1.3 `ofp_port`, 64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDesc {
    /// Port number
    pub port_no: u32,
    /// Hardware address of the port
    pub hw_addr: [u8; 6],
    /// Human-readable interface name
    pub name: String,
    /// Config bitmap (`OFPPC_*`); bit 0 is administratively down
    pub config: u32,
    /// State bitmap (`OFPPS_*`); bit 0 is link down
    pub state: u32,
}

impl PortDesc {
    /// Whether the physical link on this port is down.
    pub fn link_down(&self) -> bool {
        self.state & 1 == 1
    }

    pub(crate) fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Self> {
        let port_no = bytes.read_u32::<BigEndian>()?;
        skip(bytes, 4)?;
        let mut hw_addr = [0u8; 6];
        bytes.read_exact(&mut hw_addr)?;
        skip(bytes, 2)?;
        let mut name_raw = [0u8; 16];
        bytes.read_exact(&mut name_raw)?;
        let name = String::from_utf8_lossy(&name_raw)
            .trim_end_matches('\0')
            .to_string();
        let config = bytes.read_u32::<BigEndian>()?;
        let state = bytes.read_u32::<BigEndian>()?;
        // curr, advertised, supported, peer, curr_speed, max_speed
        skip(bytes, 24)?;
        Ok(PortDesc { port_no, hw_addr, name, config, state })
    }
}

/// What changed about a physical port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortReason {
    /// The port was added
    Add,
    /// The port was removed
    Delete,
    /// An attribute of the port changed
    Modify,
    /// A reason code this crate does not know
    Unknown(u8),
}

/// Notification that a physical port was added, removed or modified.
#[derive(Debug, Clone, PartialEq)]
pub struct PortStatus {
    /// What happened to the port
    pub reason: PortReason,
    /// The port description after the change
    pub desc: PortDesc,
}

impl PortStatus {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut bytes = Cursor::new(buf);
        let reason = match bytes.read_u8()? {
            0 => PortReason::Add,
            1 => PortReason::Delete,
            2 => PortReason::Modify,
            r => PortReason::Unknown(r),
        };
        skip(&mut bytes, 7)?;
        let desc = PortDesc::parse(&mut bytes)?;
        Ok(PortStatus { reason, desc })
    }
}

/// An error reported by the switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMsg {
    /// High-level error type (`OFPET_*`)
    pub err_type: u16,
    /// Error code within the type
    pub code: u16,
    /// At least 64 bytes of the offending request
    pub data: Vec<u8>,
}

impl ErrorMsg {
    fn parse(buf: &[u8]) -> Result<Self> {
        let mut bytes = Cursor::new(buf);
        let err_type = bytes.read_u16::<BigEndian>()?;
        let code = bytes.read_u16::<BigEndian>()?;
        let mut data = Vec::new();
        bytes.read_to_end(&mut data)?;
        Ok(ErrorMsg { err_type, code, data })
    }
}

/// Abstraction of the OpenFlow messages exchanged with a switch.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Session start (version negotiation)
    Hello,
    /// Error report from the switch
    Error(ErrorMsg),
    /// Liveness probe
    EchoRequest(Vec<u8>),
    /// Liveness probe answer, echoing the request payload
    EchoReply(Vec<u8>),
    /// Ask the switch for its identity and capabilities
    FeaturesRequest,
    /// The switch's identity and capabilities
    FeaturesReply(SwitchFeatures),
    /// A packet needing controller attention
    PacketIn(PacketIn),
    /// A flow entry expired or was deleted
    FlowRemoved(FlowRemoved),
    /// A port appeared, disappeared or changed
    PortStatus(PortStatus),
    /// Inject a packet into the datapath
    PacketOut(PacketOut),
    /// Install, modify or delete flow entries
    FlowMod(FlowMod),
    /// Request statistics or descriptions
    MultipartRequest(MultipartRequest),
    /// Statistics or description reply
    MultipartReply(MultipartReply),
    /// Flush-barrier request
    BarrierRequest,
    /// Flush-barrier confirmation
    BarrierReply,
    /// A message type this crate does not model; carried so sessions can log and move on
    Other(u8),
}

impl Message {
    fn msg_code(&self) -> MsgCode {
        match self {
            Message::Hello => MsgCode::Hello,
            Message::Error(_) => MsgCode::Error,
            Message::EchoRequest(_) => MsgCode::EchoRequest,
            Message::EchoReply(_) => MsgCode::EchoReply,
            Message::FeaturesRequest => MsgCode::FeaturesRequest,
            Message::FeaturesReply(_) => MsgCode::FeaturesReply,
            Message::PacketIn(_) => MsgCode::PacketIn,
            Message::FlowRemoved(_) => MsgCode::FlowRemoved,
            Message::PortStatus(_) => MsgCode::PortStatus,
            Message::PacketOut(_) => MsgCode::PacketOut,
            Message::FlowMod(_) => MsgCode::FlowMod,
            Message::MultipartRequest(_) => MsgCode::MultipartRequest,
            Message::MultipartReply(_) => MsgCode::MultipartReply,
            Message::BarrierRequest => MsgCode::BarrierRequest,
            Message::BarrierReply => MsgCode::BarrierReply,
            Message::Other(_) => MsgCode::Hello,
        }
    }

    fn body_size(&self) -> usize {
        match self {
            Message::Hello
            | Message::FeaturesRequest
            | Message::BarrierRequest
            | Message::BarrierReply => 0,
            Message::EchoRequest(buf) | Message::EchoReply(buf) => buf.len(),
            Message::FlowMod(fm) => fm.size_of(),
            Message::PacketOut(po) => po.size_of(),
            Message::MultipartRequest(req) => req.size_of(),
            // receive-only messages are never marshaled
            Message::Error(_)
            | Message::FeaturesReply(_)
            | Message::PacketIn(_)
            | Message::FlowRemoved(_)
            | Message::PortStatus(_)
            | Message::MultipartReply(_)
            | Message::Other(_) => 0,
        }
    }

    /// Serialize a message, header included, for the given transaction id.
    pub fn marshal(xid: u32, msg: Message) -> Vec<u8> {
        let header = Header::new(msg.msg_code() as u8, msg.body_size(), xid);
        let mut bytes = Vec::with_capacity(Header::SIZE + msg.body_size());
        header.marshal(&mut bytes);
        match msg {
            Message::Hello
            | Message::FeaturesRequest
            | Message::BarrierRequest
            | Message::BarrierReply => (),
            Message::EchoRequest(buf) | Message::EchoReply(buf) => bytes.extend_from_slice(&buf),
            Message::FlowMod(fm) => fm.marshal(&mut bytes),
            Message::PacketOut(po) => po.marshal(&mut bytes),
            Message::MultipartRequest(req) => req.marshal(&mut bytes),
            Message::Error(_)
            | Message::FeaturesReply(_)
            | Message::PacketIn(_)
            | Message::FlowRemoved(_)
            | Message::PortStatus(_)
            | Message::MultipartReply(_)
            | Message::Other(_) => (),
        }
        bytes
    }

    /// Parse a message body for the given header. Returns the transaction id together with the
    /// parsed message. Types the crate does not model come back as [`Message::Other`].
    pub fn parse(header: &Header, buf: &[u8]) -> Result<(u32, Message)> {
        let msg = match header.msg_type() {
            t if t == MsgCode::Hello as u8 => Message::Hello,
            t if t == MsgCode::Error as u8 => Message::Error(ErrorMsg::parse(buf)?),
            t if t == MsgCode::EchoRequest as u8 => Message::EchoRequest(buf.to_vec()),
            t if t == MsgCode::EchoReply as u8 => Message::EchoReply(buf.to_vec()),
            t if t == MsgCode::FeaturesReply as u8 => {
                Message::FeaturesReply(SwitchFeatures::parse(buf)?)
            }
            t if t == MsgCode::PacketIn as u8 => Message::PacketIn(PacketIn::parse(buf)?),
            t if t == MsgCode::FlowRemoved as u8 => Message::FlowRemoved(FlowRemoved::parse(buf)?),
            t if t == MsgCode::PortStatus as u8 => Message::PortStatus(PortStatus::parse(buf)?),
            t if t == MsgCode::FlowMod as u8 => Message::FlowMod(FlowMod::parse(buf)?),
            t if t == MsgCode::MultipartReply as u8 => {
                Message::MultipartReply(MultipartReply::parse(buf)?)
            }
            t if t == MsgCode::BarrierReply as u8 => Message::BarrierReply,
            t => Message::Other(t),
        };
        Ok((header.xid(), msg))
    }
}

fn skip(bytes: &mut Cursor<&[u8]>, n: usize) -> Result<()> {
    let mut buf = vec![0u8; n];
    bytes.read_exact(&mut buf)?;
    Ok(())
}
