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

use crate::*;

use std::net::Ipv4Addr;

#[test]
fn header_layout() {
    let header = Header::new(MsgCode::FlowMod as u8, 72, 0xdead_beef);
    let mut bytes = Vec::new();
    header.marshal(&mut bytes);
    assert_eq!(bytes, vec![0x04, 14, 0x00, 80, 0xde, 0xad, 0xbe, 0xef]);
    let parsed = Header::parse(&bytes).unwrap();
    assert_eq!(parsed.msg_type(), 14);
    assert_eq!(parsed.body_len(), 72);
    assert_eq!(parsed.xid(), 0xdead_beef);
}

#[test]
fn header_rejects_wrong_version() {
    let buf = [0x01, 0, 0, 8, 0, 0, 0, 0];
    assert!(matches!(Header::parse(&buf), Err(Error::UnsupportedVersion(0x01))));
}

#[test]
fn match_marshal_is_padded_and_typed() {
    let mut m = Match::any();
    m.eth_type = Some(0x0800);
    m.ipv4_src = Some(Ipv4Addr::new(10, 0, 0, 5));
    let mut bytes = Vec::new();
    m.marshal(&mut bytes);
    // OXM match type 1, length = 4 + (4+2) + (4+4) = 18, padded to 24 bytes total
    assert_eq!(bytes.len(), 24);
    assert_eq!(&bytes[0..4], &[0x00, 0x01, 0x00, 18]);
    // first TLV: class 0x8000, field ETH_TYPE (5 << 1), length 2, value 0x0800
    assert_eq!(&bytes[4..10], &[0x80, 0x00, 0x0a, 0x02, 0x08, 0x00]);

    let mut cursor = std::io::Cursor::new(&bytes[..]);
    let parsed = Match::parse(&mut cursor).unwrap();
    assert_eq!(parsed, m);
    assert_eq!(cursor.position(), 24);
}

#[test]
fn match_canonical_is_stable() {
    let mut a = Match::any();
    a.ipv4_dst = Some(Ipv4Addr::new(10, 0, 0, 1));
    a.eth_type = Some(0x0800);
    let mut b = Match::any();
    b.eth_type = Some(0x0800);
    b.ipv4_dst = Some(Ipv4Addr::new(10, 0, 0, 1));
    assert_eq!(a.canonical(), b.canonical());
    assert_eq!(a.canonical(), "eth_type=0x0800,ipv4_dst=10.0.0.1");
    assert_eq!(Match::any().canonical(), "any");
}

#[test]
fn flow_mod_round_trip() {
    let mut m = Match::any();
    m.eth_type = Some(0x0800);
    m.ipv4_src = Some(Ipv4Addr::new(10, 0, 0, 5));
    let mut fm = FlowMod::add_flow(1, 1010, m, vec![Instruction::ClearActions]);
    fm.idle_timeout = Timeout::ExpiresAfter(300);
    fm.flags = FLOW_MOD_SEND_FLOW_REM;
    let bytes = Message::marshal(42, Message::FlowMod(fm.clone()));

    let header = Header::parse(&bytes[0..8]).unwrap();
    assert_eq!(header.body_len() + 8, bytes.len());
    let (xid, msg) = Message::parse(&header, &bytes[8..]).unwrap();
    assert_eq!(xid, 42);
    match msg {
        Message::FlowMod(parsed) => {
            assert_eq!(parsed.table_id, 1);
            assert_eq!(parsed.priority, 1010);
            assert_eq!(parsed.idle_timeout, Timeout::ExpiresAfter(300));
            assert_eq!(parsed.pattern, fm.pattern);
            assert_eq!(parsed.instructions, vec![Instruction::ClearActions]);
        }
        m => panic!("expected a flow-mod, got {:?}", m),
    }
}

#[test]
fn packet_in_parse() {
    // body: unbuffered packet-in on port 3, table 0, with a 14 byte frame
    let frame: Vec<u8> = vec![0xff; 14];
    let mut body: Vec<u8> = Vec::new();
    body.extend_from_slice(&OFP_NO_BUFFER.to_be_bytes());
    body.extend_from_slice(&(frame.len() as u16).to_be_bytes());
    body.push(0); // reason: no match
    body.push(0); // table id
    body.extend_from_slice(&0u64.to_be_bytes()); // cookie
    // match with in_port = 3: type 1, len 12, one TLV, padded to 16
    body.extend_from_slice(&[0x00, 0x01, 0x00, 12]);
    body.extend_from_slice(&[0x80, 0x00, 0x00, 0x04]);
    body.extend_from_slice(&3u32.to_be_bytes());
    body.extend_from_slice(&[0; 4]);
    body.extend_from_slice(&[0; 2]); // pad
    body.extend_from_slice(&frame);

    let header = Header::new(MsgCode::PacketIn as u8, body.len(), 1);
    let (_, msg) = Message::parse(&header, &body).unwrap();
    match msg {
        Message::PacketIn(pi) => {
            assert_eq!(pi.in_port, Some(3));
            assert_eq!(pi.total_len, 14);
            assert_eq!(pi.payload.buffer_id(), None);
            assert_eq!(pi.payload.bytes(), &frame[..]);
        }
        m => panic!("expected a packet-in, got {:?}", m),
    }
}

#[test]
fn port_stats_reply_parse() {
    let mut body: Vec<u8> = Vec::new();
    body.extend_from_slice(&4u16.to_be_bytes()); // OFPMP_PORT_STATS
    body.extend_from_slice(&[0; 6]);
    // one 112 byte entry for port 1
    body.extend_from_slice(&1u32.to_be_bytes());
    body.extend_from_slice(&[0; 4]);
    for counter in &[10u64, 20, 1000, 2000, 0, 0, 3, 0] {
        body.extend_from_slice(&counter.to_be_bytes());
    }
    body.extend_from_slice(&[0; 32]);
    body.extend_from_slice(&60u32.to_be_bytes());
    body.extend_from_slice(&0u32.to_be_bytes());

    match MultipartReply::parse(&body).unwrap() {
        MultipartReply::PortStats(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].port_no, 1);
            assert_eq!(entries[0].rx_bytes, 1000);
            assert_eq!(entries[0].tx_bytes, 2000);
            assert_eq!(entries[0].rx_errors, 3);
            assert_eq!(entries[0].duration_sec, 60);
        }
        r => panic!("expected port stats, got {:?}", r),
    }
}

#[test]
fn truncated_body_is_an_error_not_a_panic() {
    let header = Header::new(MsgCode::FeaturesReply as u8, 4, 9);
    assert!(Message::parse(&header, &[0, 1, 2, 3]).is_err());
}
