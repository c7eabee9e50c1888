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

//! Module containing all type definitions

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Switch port number
pub type PortNo = u32;

/// The flow table holding default, learning and reactive entries.
pub const TABLE_DEFAULT: u8 = 0;
/// The dedicated policy table.
pub const TABLE_POLICY: u8 = 1;

/// Priority of the table-miss entry sending packets to the controller.
pub const PRIO_TABLE_MISS: u16 = 0;
/// Priority of the ICMP fast-path entry in the default table.
pub const PRIO_ICMP: u16 = 5;
/// Priority of reactive MAC-learning flows.
pub const PRIO_LEARNING: u16 = 10;
/// Priority of reactive IP flows installed after an explicit allow verdict.
pub const PRIO_ALLOW: u16 = 20;
/// Priority of reactive drop flows installed after a deny verdict.
pub const PRIO_DENY: u16 = 100;
/// Priority of the controller-protection guard entry.
pub const PRIO_PROTECT: u16 = 65000;

/// Offset added to a policy's own priority when installed in the policy table; keeps every
/// policy entry above the static defaults.
pub const POLICY_PRIORITY_OFFSET: i64 = 1000;

/// Idle timeout of reactive learning/allow flows, in seconds.
pub const IDLE_REACTIVE: u16 = 300;
/// Idle timeout of reactive deny (drop) flows, in seconds.
pub const IDLE_DENY: u16 = 30;
/// Idle timeout of compiled policy flows, in seconds.
pub const IDLE_POLICY: u16 = 300;

/// Datapath identifier: the globally unique id of a forwarding device.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Dpid {
    type Err = std::num::ParseIntError;

    /// Accepts both the hexadecimal form (`00000000000000a1`, with or without `0x`) and a
    /// decimal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(hex) = s.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16).map(Dpid);
        }
        if s.len() == 16 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            return u64::from_str_radix(s, 16).map(Dpid);
        }
        s.parse::<u64>().map(Dpid)
    }
}

impl Serialize for Dpid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Ethernet hardware address
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The broadcast address `ff:ff:ff:ff:ff:ff`.
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    /// Whether the address has the group (multicast/broadcast) bit set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 1 == 1
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dpid_parses_hex_and_decimal() {
        assert_eq!("0x1a".parse::<Dpid>().unwrap(), Dpid(26));
        assert_eq!("00000000000000a1".parse::<Dpid>().unwrap(), Dpid(0xa1));
        assert_eq!("42".parse::<Dpid>().unwrap(), Dpid(42));
        assert_eq!(Dpid(0xa1).to_string(), "00000000000000a1");
    }
}
