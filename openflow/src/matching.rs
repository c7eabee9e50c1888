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

//! OXM match structure

use crate::{Error, Result};

use byteorder::{BigEndian, ReadBytesExt};
use std::fmt;
use std::io::{Cursor, Read};
use std::net::Ipv4Addr;

/// OXM class used for all fields in this crate (`OFPXMC_OPENFLOW_BASIC`).
pub(crate) const OXM_CLASS_BASIC: u16 = 0x8000;

/// Match structure type for OXM matches (`OFPMT_OXM`).
const MATCH_TYPE_OXM: u16 = 1;

pub(crate) mod oxm_field {
    //! OXM field codes of `OFPXMC_OPENFLOW_BASIC`.
    pub const IN_PORT: u8 = 0;
    pub const ETH_DST: u8 = 3;
    pub const ETH_SRC: u8 = 4;
    pub const ETH_TYPE: u8 = 5;
    pub const VLAN_PCP: u8 = 7;
    pub const IP_DSCP: u8 = 8;
    pub const IP_PROTO: u8 = 10;
    pub const IPV4_SRC: u8 = 11;
    pub const IPV4_DST: u8 = 12;
    pub const TCP_SRC: u8 = 13;
    pub const TCP_DST: u8 = 14;
    pub const UDP_SRC: u8 = 15;
    pub const UDP_DST: u8 = 16;
}

/// Write a single OXM TLV header (class, field, hasmask=0, payload length).
pub(crate) fn write_oxm_header(bytes: &mut Vec<u8>, field: u8, len: u8) {
    bytes.extend_from_slice(&OXM_CLASS_BASIC.to_be_bytes());
    bytes.push(field << 1);
    bytes.push(len);
}

/// # Flow Match
///
/// Set of packet header field constraints identifying which packets a flow rule applies to. An
/// unset field is a wildcard. Only the fields needed by the controller pipeline are represented;
/// unknown OXM TLVs received from a switch are skipped over while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Match {
    /// Ingress port
    pub in_port: Option<u32>,
    /// Ethernet source address
    pub eth_src: Option<[u8; 6]>,
    /// Ethernet destination address
    pub eth_dst: Option<[u8; 6]>,
    /// Ethertype of the payload
    pub eth_type: Option<u16>,
    /// IPv4 protocol number
    pub ip_proto: Option<u8>,
    /// IPv4 source address (exact)
    pub ipv4_src: Option<Ipv4Addr>,
    /// IPv4 destination address (exact)
    pub ipv4_dst: Option<Ipv4Addr>,
    /// TCP source port
    pub tcp_src: Option<u16>,
    /// TCP destination port
    pub tcp_dst: Option<u16>,
    /// UDP source port
    pub udp_src: Option<u16>,
    /// UDP destination port
    pub udp_dst: Option<u16>,
}

impl Match {
    /// The match that matches every packet (all fields wildcarded).
    pub fn any() -> Self {
        Self::default()
    }

    /// Canonical textual form of the match: every set field rendered as `name=value`, in a fixed
    /// field order, joined with `,`. Two matches are structurally equal exactly when their
    /// canonical forms are equal, which makes this string usable as a cache key.
    pub fn canonical(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(p) = self.in_port {
            parts.push(format!("in_port={}", p));
        }
        if let Some(m) = self.eth_src {
            parts.push(format!("eth_src={}", fmt_mac(&m)));
        }
        if let Some(m) = self.eth_dst {
            parts.push(format!("eth_dst={}", fmt_mac(&m)));
        }
        if let Some(t) = self.eth_type {
            parts.push(format!("eth_type=0x{:04x}", t));
        }
        if let Some(p) = self.ip_proto {
            parts.push(format!("ip_proto={}", p));
        }
        if let Some(ip) = self.ipv4_src {
            parts.push(format!("ipv4_src={}", ip));
        }
        if let Some(ip) = self.ipv4_dst {
            parts.push(format!("ipv4_dst={}", ip));
        }
        if let Some(p) = self.tcp_src {
            parts.push(format!("tcp_src={}", p));
        }
        if let Some(p) = self.tcp_dst {
            parts.push(format!("tcp_dst={}", p));
        }
        if let Some(p) = self.udp_src {
            parts.push(format!("udp_src={}", p));
        }
        if let Some(p) = self.udp_dst {
            parts.push(format!("udp_dst={}", p));
        }
        if parts.is_empty() {
            String::from("any")
        } else {
            parts.join(",")
        }
    }

    fn oxm_payload_len(&self) -> usize {
        let mut len = 0;
        len += self.in_port.map_or(0, |_| 4 + 4);
        len += self.eth_src.map_or(0, |_| 4 + 6);
        len += self.eth_dst.map_or(0, |_| 4 + 6);
        len += self.eth_type.map_or(0, |_| 4 + 2);
        len += self.ip_proto.map_or(0, |_| 4 + 1);
        len += self.ipv4_src.map_or(0, |_| 4 + 4);
        len += self.ipv4_dst.map_or(0, |_| 4 + 4);
        len += self.tcp_src.map_or(0, |_| 4 + 2);
        len += self.tcp_dst.map_or(0, |_| 4 + 2);
        len += self.udp_src.map_or(0, |_| 4 + 2);
        len += self.udp_dst.map_or(0, |_| 4 + 2);
        len
    }

    /// Byte size of the marshaled match, padding to the 8-byte boundary included.
    pub fn size_of(&self) -> usize {
        let unpadded = 4 + self.oxm_payload_len();
        (unpadded + 7) / 8 * 8
    }

    /// Serialize the match (type, length, OXM TLVs, zero padding to 8 bytes).
    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        let length = 4 + self.oxm_payload_len();
        bytes.extend_from_slice(&MATCH_TYPE_OXM.to_be_bytes());
        bytes.extend_from_slice(&(length as u16).to_be_bytes());
        if let Some(p) = self.in_port {
            write_oxm_header(bytes, oxm_field::IN_PORT, 4);
            bytes.extend_from_slice(&p.to_be_bytes());
        }
        if let Some(m) = self.eth_src {
            write_oxm_header(bytes, oxm_field::ETH_SRC, 6);
            bytes.extend_from_slice(&m);
        }
        if let Some(m) = self.eth_dst {
            write_oxm_header(bytes, oxm_field::ETH_DST, 6);
            bytes.extend_from_slice(&m);
        }
        if let Some(t) = self.eth_type {
            write_oxm_header(bytes, oxm_field::ETH_TYPE, 2);
            bytes.extend_from_slice(&t.to_be_bytes());
        }
        if let Some(p) = self.ip_proto {
            write_oxm_header(bytes, oxm_field::IP_PROTO, 1);
            bytes.push(p);
        }
        if let Some(ip) = self.ipv4_src {
            write_oxm_header(bytes, oxm_field::IPV4_SRC, 4);
            bytes.extend_from_slice(&ip.octets());
        }
        if let Some(ip) = self.ipv4_dst {
            write_oxm_header(bytes, oxm_field::IPV4_DST, 4);
            bytes.extend_from_slice(&ip.octets());
        }
        if let Some(p) = self.tcp_src {
            write_oxm_header(bytes, oxm_field::TCP_SRC, 2);
            bytes.extend_from_slice(&p.to_be_bytes());
        }
        if let Some(p) = self.tcp_dst {
            write_oxm_header(bytes, oxm_field::TCP_DST, 2);
            bytes.extend_from_slice(&p.to_be_bytes());
        }
        if let Some(p) = self.udp_src {
            write_oxm_header(bytes, oxm_field::UDP_SRC, 2);
            bytes.extend_from_slice(&p.to_be_bytes());
        }
        if let Some(p) = self.udp_dst {
            write_oxm_header(bytes, oxm_field::UDP_DST, 2);
            bytes.extend_from_slice(&p.to_be_bytes());
        }
        while bytes.len() % 8 != 0 {
            bytes.push(0);
        }
    }

    /// Parse a match structure from the cursor, consuming the trailing padding. TLVs of a class
    /// or field this crate does not model are skipped.
    pub fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Self> {
        let start = bytes.position();
        let match_type = bytes.read_u16::<BigEndian>()?;
        if match_type != MATCH_TYPE_OXM {
            return Err(Error::UnsupportedMatchType(match_type));
        }
        let length = bytes.read_u16::<BigEndian>()? as u64;
        let mut m = Match::any();
        while bytes.position() < start + length {
            let class = bytes.read_u16::<BigEndian>()?;
            let field_byte = bytes.read_u8()?;
            let field = field_byte >> 1;
            let has_mask = field_byte & 1 == 1;
            let tlv_len = bytes.read_u8()?;
            if class != OXM_CLASS_BASIC || has_mask {
                skip(bytes, tlv_len as usize)?;
                continue;
            }
            match (field, tlv_len) {
                (oxm_field::IN_PORT, 4) => m.in_port = Some(bytes.read_u32::<BigEndian>()?),
                (oxm_field::ETH_SRC, 6) => m.eth_src = Some(read_mac(bytes)?),
                (oxm_field::ETH_DST, 6) => m.eth_dst = Some(read_mac(bytes)?),
                (oxm_field::ETH_TYPE, 2) => m.eth_type = Some(bytes.read_u16::<BigEndian>()?),
                (oxm_field::IP_PROTO, 1) => m.ip_proto = Some(bytes.read_u8()?),
                (oxm_field::IPV4_SRC, 4) => {
                    m.ipv4_src = Some(Ipv4Addr::from(bytes.read_u32::<BigEndian>()?))
                }
                (oxm_field::IPV4_DST, 4) => {
                    m.ipv4_dst = Some(Ipv4Addr::from(bytes.read_u32::<BigEndian>()?))
                }
                (oxm_field::TCP_SRC, 2) => m.tcp_src = Some(bytes.read_u16::<BigEndian>()?),
                (oxm_field::TCP_DST, 2) => m.tcp_dst = Some(bytes.read_u16::<BigEndian>()?),
                (oxm_field::UDP_SRC, 2) => m.udp_src = Some(bytes.read_u16::<BigEndian>()?),
                (oxm_field::UDP_DST, 2) => m.udp_dst = Some(bytes.read_u16::<BigEndian>()?),
                (_, len) => skip(bytes, len as usize)?,
            }
        }
        // consume padding up to the 8 byte boundary
        let consumed = bytes.position() - start;
        let padded = (consumed + 7) / 8 * 8;
        skip(bytes, (padded - consumed) as usize)?;
        Ok(m)
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

fn read_mac(bytes: &mut Cursor<&[u8]>) -> Result<[u8; 6]> {
    let mut mac = [0u8; 6];
    bytes.read_exact(&mut mac)?;
    Ok(mac)
}

fn skip(bytes: &mut Cursor<&[u8]>, n: usize) -> Result<()> {
    let mut buf = vec![0u8; n];
    bytes.read_exact(&mut buf)?;
    Ok(())
}

fn fmt_mac(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}
