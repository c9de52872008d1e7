//! Infinova-D: Pelco-D frames wrapped in a session envelope.

use super::pelco_d;
use crate::channel::Channel;
use crate::packet::CcPacket;
use crate::writer;

pub const GAPTIME: u64 = pelco_d::GAPTIME;
pub const TIMEOUT: u64 = pelco_d::TIMEOUT;
pub const MAX_ADDRESS: i32 = pelco_d::MAX_ADDRESS;

const HEADER_SZ: usize = 12;
const AUTH_SZ: usize = 64;
const MSG_ID_AUTH: u8 = 0x01;
const MSG_ID_PTZ: u8 = 0x13;

fn header(chn: &mut Channel, msg_id: u8, n_bytes: usize) -> bool {
    match writer::append(chn, HEADER_SZ) {
        Some(mess) => {
            mess[0] = b'I';
            mess[1] = b'N';
            mess[2] = b'F';
            mess[3] = msg_id;
            if msg_id == MSG_ID_AUTH {
                mess[5] = 1;
                mess[7] = 1;
            }
            mess[11] = n_bytes as u8;
            true
        }
        None => false,
    }
}

/// The camera closes its socket after 90 seconds of inactivity; a fresh
/// connection starts with this preamble. The payload is 64 bytes plus two
/// trailing bytes the cameras insist on.
fn authenticate(chn: &mut Channel) {
    if header(chn, MSG_ID_AUTH, AUTH_SZ) {
        writer::append(chn, AUTH_SZ + 2);
    }
}

/// PTZ packets carry a second inner header.
fn ptz_header(chn: &mut Channel) -> bool {
    if header(chn, MSG_ID_PTZ, HEADER_SZ + pelco_d::SZ) {
        if let Some(mess) = writer::append(chn, HEADER_SZ) {
            mess[0] = 1;
            mess[7] = pelco_d::SZ as u8;
            return true;
        }
    }
    false
}

pub fn do_write(chn: &mut Channel, pkt: &mut CcPacket) -> u32 {
    if !chn.is_open() {
        authenticate(chn);
    }
    pelco_d::do_write_cb(chn, pkt, &mut ptz_header)
}
