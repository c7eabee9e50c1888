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

//! OpenFlow message header

use crate::{Error, Result, OFP_VERSION};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// The first eight bytes of every OpenFlow message. The header is parsed on its own to learn the
/// type and total length of the message, so that the remaining bytes can be read off the stream
/// and handed to the right body parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    version: u8,
    msg_type: u8,
    length: u16,
    xid: u32,
}

impl Header {
    /// Create a header for the given message type, body length and transaction id. The length
    /// field stores the *total* message size, header included.
    pub fn new(msg_type: u8, body_len: usize, xid: u32) -> Self {
        Self { version: OFP_VERSION, msg_type, length: (Self::SIZE + body_len) as u16, xid }
    }

    /// Byte size of the header on the wire.
    pub const SIZE: usize = 8;

    /// Serialize the header into the buffer.
    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        bytes.push(self.version);
        bytes.push(self.msg_type);
        bytes.extend_from_slice(&self.length.to_be_bytes());
        bytes.extend_from_slice(&self.xid.to_be_bytes());
    }

    /// Parse a header from the first [`Header::SIZE`] bytes of `buf`. Fails if the version is not
    /// OpenFlow 1.3 or the length field is smaller than the header itself.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let mut bytes = Cursor::new(buf);
        let version = bytes.read_u8()?;
        let msg_type = bytes.read_u8()?;
        let length = bytes.read_u16::<BigEndian>()?;
        let xid = bytes.read_u32::<BigEndian>()?;
        if version != OFP_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        if (length as usize) < Self::SIZE {
            return Err(Error::InvalidLength(length as usize));
        }
        Ok(Self { version, msg_type, length, xid })
    }

    /// The raw message type code of this header.
    pub fn msg_type(&self) -> u8 {
        self.msg_type
    }

    /// Number of body bytes following the header.
    pub fn body_len(&self) -> usize {
        self.length as usize - Self::SIZE
    }

    /// The transaction id associated with this message. Replies carry the same id as the request
    /// to facilitate pairing.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}
