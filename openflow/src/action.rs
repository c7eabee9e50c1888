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

//! Actions and instructions

use crate::matching::{oxm_field, write_oxm_header};
use crate::Result;

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// Reserved port numbers of OpenFlow 1.3 (`OFPP_*`).
mod ofp_port {
    pub const MAX: u32 = 0xffff_ff00;
    pub const IN_PORT: u32 = 0xffff_fff8;
    pub const TABLE: u32 = 0xffff_fff9;
    pub const NORMAL: u32 = 0xffff_fffa;
    pub const FLOOD: u32 = 0xffff_fffb;
    pub const ALL: u32 = 0xffff_fffc;
    pub const CONTROLLER: u32 = 0xffff_fffd;
    pub const LOCAL: u32 = 0xffff_fffe;
}

/// Output port behavior: either a physical port or one of the reserved logical ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoPort {
    /// A physical port on the datapath
    Physical(u32),
    /// Send back out of the ingress port
    InPort,
    /// Submit to the first flow table (only valid in packet-out)
    Table,
    /// Process with the datapath's traditional L2/L3 pipeline
    Normal,
    /// Flood along the minimum spanning tree, ingress port excluded
    Flood,
    /// All ports except the ingress port
    All,
    /// Send to the controller, with the given number of bytes to include
    Controller(u16),
    /// The local networking stack of the switch
    Local,
}

impl PseudoPort {
    /// The wire encoding of the port number.
    pub fn to_int(self) -> u32 {
        match self {
            PseudoPort::Physical(p) => p,
            PseudoPort::InPort => ofp_port::IN_PORT,
            PseudoPort::Table => ofp_port::TABLE,
            PseudoPort::Normal => ofp_port::NORMAL,
            PseudoPort::Flood => ofp_port::FLOOD,
            PseudoPort::All => ofp_port::ALL,
            PseudoPort::Controller(_) => ofp_port::CONTROLLER,
            PseudoPort::Local => ofp_port::LOCAL,
        }
    }

    /// Decode a wire port number. Unknown reserved values decode as physical ports so that a
    /// parse of foreign data never fails here.
    pub fn of_int(p: u32) -> Self {
        match p {
            x if x == ofp_port::IN_PORT => PseudoPort::InPort,
            x if x == ofp_port::TABLE => PseudoPort::Table,
            x if x == ofp_port::NORMAL => PseudoPort::Normal,
            x if x == ofp_port::FLOOD => PseudoPort::Flood,
            x if x == ofp_port::ALL => PseudoPort::All,
            x if x == ofp_port::CONTROLLER => PseudoPort::Controller(0),
            x if x == ofp_port::LOCAL => PseudoPort::Local,
            p => PseudoPort::Physical(p.min(ofp_port::MAX)),
        }
    }
}

const ACTION_OUTPUT: u16 = 0;
const ACTION_SET_FIELD: u16 = 25;

/// A single action applied to a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Forward the packet out of a port
    Output(PseudoPort),
    /// Rewrite the IPv4 DSCP field
    SetDscp(u8),
    /// Rewrite the VLAN priority (PCP) field
    SetVlanPcp(u8),
}

impl Action {
    /// Byte size of the marshaled action.
    pub fn size_of(&self) -> usize {
        match self {
            Action::Output(_) => 16,
            // set-field: 4 byte action header + OXM TLV (4 + 1), padded to 8
            Action::SetDscp(_) | Action::SetVlanPcp(_) => 16,
        }
    }

    /// Total byte size of a marshaled action list.
    pub fn size_of_sequence(actions: &[Action]) -> usize {
        actions.iter().map(Action::size_of).sum()
    }

    /// Serialize the action.
    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        match *self {
            Action::Output(pp) => {
                bytes.extend_from_slice(&ACTION_OUTPUT.to_be_bytes());
                bytes.extend_from_slice(&16u16.to_be_bytes());
                bytes.extend_from_slice(&pp.to_int().to_be_bytes());
                let max_len: u16 = match pp {
                    PseudoPort::Controller(n) => n,
                    _ => 0,
                };
                bytes.extend_from_slice(&max_len.to_be_bytes());
                bytes.extend_from_slice(&[0; 6]);
            }
            Action::SetDscp(dscp) => marshal_set_field(bytes, oxm_field::IP_DSCP, dscp & 0x3f),
            Action::SetVlanPcp(pcp) => marshal_set_field(bytes, oxm_field::VLAN_PCP, pcp & 0x07),
        }
    }

    /// Parse a list of actions occupying exactly `len` bytes. Action types this crate does not
    /// model are skipped.
    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<Action>> {
        let end = bytes.position() + len as u64;
        let mut actions = Vec::new();
        while bytes.position() + 4 <= end {
            let action_type = bytes.read_u16::<BigEndian>()?;
            let action_len = bytes.read_u16::<BigEndian>()? as usize;
            match action_type {
                ACTION_OUTPUT => {
                    let port = bytes.read_u32::<BigEndian>()?;
                    let max_len = bytes.read_u16::<BigEndian>()?;
                    skip(bytes, 6)?;
                    let pp = match PseudoPort::of_int(port) {
                        PseudoPort::Controller(_) => PseudoPort::Controller(max_len),
                        pp => pp,
                    };
                    actions.push(Action::Output(pp));
                }
                _ => skip(bytes, action_len.saturating_sub(4))?,
            }
        }
        Ok(actions)
    }
}

fn marshal_set_field(bytes: &mut Vec<u8>, field: u8, value: u8) {
    bytes.extend_from_slice(&ACTION_SET_FIELD.to_be_bytes());
    bytes.extend_from_slice(&16u16.to_be_bytes());
    write_oxm_header(bytes, field, 1);
    bytes.push(value);
    // pad the whole action to 8 bytes
    bytes.extend_from_slice(&[0; 7]);
}

const INSTR_GOTO_TABLE: u16 = 1;
const INSTR_WRITE_ACTIONS: u16 = 3;
const INSTR_APPLY_ACTIONS: u16 = 4;
const INSTR_CLEAR_ACTIONS: u16 = 5;

/// A flow entry instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Continue matching in another table
    GotoTable(u8),
    /// Merge the actions into the packet's action set
    WriteActions(Vec<Action>),
    /// Apply the actions immediately, in order
    ApplyActions(Vec<Action>),
    /// Clear the packet's action set
    ClearActions,
}

impl Instruction {
    /// Byte size of the marshaled instruction.
    pub fn size_of(&self) -> usize {
        match self {
            Instruction::GotoTable(_) => 8,
            Instruction::WriteActions(a) | Instruction::ApplyActions(a) => {
                8 + Action::size_of_sequence(a)
            }
            Instruction::ClearActions => 8,
        }
    }

    /// Total byte size of a marshaled instruction list.
    pub fn size_of_sequence(instructions: &[Instruction]) -> usize {
        instructions.iter().map(Instruction::size_of).sum()
    }

    /// Serialize the instruction.
    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        match self {
            Instruction::GotoTable(table) => {
                bytes.extend_from_slice(&INSTR_GOTO_TABLE.to_be_bytes());
                bytes.extend_from_slice(&8u16.to_be_bytes());
                bytes.push(*table);
                bytes.extend_from_slice(&[0; 3]);
            }
            Instruction::WriteActions(actions) | Instruction::ApplyActions(actions) => {
                let code = match self {
                    Instruction::WriteActions(_) => INSTR_WRITE_ACTIONS,
                    _ => INSTR_APPLY_ACTIONS,
                };
                bytes.extend_from_slice(&code.to_be_bytes());
                bytes.extend_from_slice(&(self.size_of() as u16).to_be_bytes());
                bytes.extend_from_slice(&[0; 4]);
                for action in actions {
                    action.marshal(bytes);
                }
            }
            Instruction::ClearActions => {
                bytes.extend_from_slice(&INSTR_CLEAR_ACTIONS.to_be_bytes());
                bytes.extend_from_slice(&8u16.to_be_bytes());
                bytes.extend_from_slice(&[0; 4]);
            }
        }
    }

    /// Parse a list of instructions occupying exactly `len` bytes. Unknown instruction types are
    /// skipped.
    pub fn parse_sequence(bytes: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<Instruction>> {
        let end = bytes.position() + len as u64;
        let mut instructions = Vec::new();
        while bytes.position() + 4 <= end {
            let instr_type = bytes.read_u16::<BigEndian>()?;
            let instr_len = bytes.read_u16::<BigEndian>()? as usize;
            match instr_type {
                INSTR_GOTO_TABLE => {
                    let table = bytes.read_u8()?;
                    skip(bytes, 3)?;
                    instructions.push(Instruction::GotoTable(table));
                }
                INSTR_WRITE_ACTIONS | INSTR_APPLY_ACTIONS => {
                    skip(bytes, 4)?;
                    let actions = Action::parse_sequence(bytes, instr_len - 8)?;
                    instructions.push(match instr_type {
                        INSTR_WRITE_ACTIONS => Instruction::WriteActions(actions),
                        _ => Instruction::ApplyActions(actions),
                    });
                }
                INSTR_CLEAR_ACTIONS => {
                    skip(bytes, 4)?;
                    instructions.push(Instruction::ClearActions);
                }
                _ => skip(bytes, instr_len.saturating_sub(4))?,
            }
        }
        Ok(instructions)
    }
}

fn skip(bytes: &mut Cursor<&[u8]>, n: usize) -> Result<()> {
    let mut buf = vec![0u8; n];
    bytes.read_exact(&mut buf)?;
    Ok(())
}
