//! Pelco-P protocol: 8-byte framed messages with a parity checksum.
//!
//! The PTZ payload shares its bit layout with Pelco-D; only the framing
//! and checksum differ. Receiver addresses are zero-based on the wire.

use log::info;

use super::pelco_d;
use super::{bit_is_set, bit_set, Decode};
use crate::buffer::Buffer;
use crate::channel::Channel;
use crate::packet::{CcPacket, PresetMode, WiperCommand, SPEED_MAX};
use crate::reader::{CcReader, ReaderFlags};
use crate::writer;

pub const SZ: usize = 8;
pub const GAPTIME: u64 = 80;
pub const TIMEOUT: u64 = 15000;
pub const MAX_ADDRESS: i32 = 254;

const STX: u8 = 0xa0;
const ETX: u8 = 0xaf;

/// Joystick deflections at or below this raw speed read as centered.
const DEADZONE: u8 = 3;

fn calculate_checksum(mess: &[u8]) -> u8 {
    mess[..7].iter().fold(0u8, |sum, b| sum ^ b)
}

fn decode_speed(val: u8, deadzone: bool) -> i32 {
    if deadzone && val <= DEADZONE {
        return 0;
    }
    let speed = (val as i32) << 5;
    if speed > SPEED_MAX {
        SPEED_MAX
    } else {
        speed
    }
}

/// Discard bytes up to the next frame sync, logging a hex dump.
fn discard_garbage(rxbuf: &mut Buffer, msg: &str) {
    let bytes = rxbuf.output();
    let mut n_bytes = 1;
    while n_bytes < bytes.len() && bytes[n_bytes] != STX {
        n_bytes += 1;
    }
    let mut dump = String::new();
    for b in bytes.iter().take(n_bytes.min(24)) {
        dump.push_str(&format!("{:02X} ", b));
    }
    if n_bytes > 8 {
        dump.push_str("...");
    }
    info!("Pelco(P) {}; discarding {} bytes: {}", msg, n_bytes, dump);
    rxbuf.consume(n_bytes);
}

fn decode_command(rdr: &mut CcReader, mess: &[u8], out: &mut Vec<CcPacket>) -> Decode {
    let deadzone = rdr.flags.contains(ReaderFlags::PT_DEADZONE);
    rdr.packet.set_receiver(mess[1] as i32 + 1);
    pelco_d::decode_pan_bits(&mut rdr.packet, mess, decode_speed(mess[4], deadzone));
    pelco_d::decode_tilt_bits(&mut rdr.packet, mess, decode_speed(mess[5], deadzone));
    pelco_d::decode_lens(&mut rdr.packet, mess);
    pelco_d::decode_sense(&mut rdr.packet, mess);
    rdr.process_packet(out);
    Decode::More
}

fn decode_extended_message(rdr: &mut CcReader, mess: &[u8], out: &mut Vec<CcPacket>) -> Decode {
    rdr.packet.set_receiver(mess[1] as i32 + 1);
    let ex = (mess[3] >> 1) & 0x1f;
    let p0 = mess[5] as i32;
    let p1 = mess[4] as i32;
    pelco_d::decode_extended(&mut rdr.packet, ex, p0, p1);
    rdr.process_packet(out);
    Decode::More
}

fn decode_message(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) -> Decode {
    let mut mess = [0u8; SZ];
    mess.copy_from_slice(&rxbuf.output()[..SZ]);
    if mess[0] != STX {
        discard_garbage(rxbuf, "Invalid STX");
        return Decode::More;
    }
    if mess[6] != ETX {
        discard_garbage(rxbuf, "Invalid ETX");
        return Decode::More;
    }
    if calculate_checksum(&mess) != mess[7] {
        discard_garbage(rxbuf, "Invalid checksum");
        return Decode::More;
    }
    rxbuf.consume(SZ);
    if bit_is_set(&mess, pelco_d::BIT_EXTENDED) {
        decode_extended_message(rdr, &mess, out)
    } else {
        decode_command(rdr, &mess, out)
    }
}

pub fn do_read(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) {
    while rxbuf.available() >= SZ {
        if decode_message(rdr, rxbuf, out) == Decode::Done {
            break;
        }
    }
}

fn encode_receiver(mess: &mut [u8], pkt: &CcPacket) {
    mess[0] = STX;
    mess[1] = (pkt.receiver() - 1) as u8;
}

fn seal(mess: &mut [u8]) {
    mess[6] = ETX;
    mess[7] = calculate_checksum(mess);
}

fn encode_command(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SZ) {
        encode_receiver(mess, pkt);
        pelco_d::encode_pan(mess, pkt);
        pelco_d::encode_tilt(mess, pkt);
        pelco_d::encode_lens(mess, pkt);
        pelco_d::encode_sense(mess, pkt);
        seal(mess);
    }
}

fn encode_preset(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SZ) {
        encode_receiver(mess, pkt);
        bit_set(mess, pelco_d::BIT_EXTENDED);
        match pkt.preset_mode() {
            Some(PresetMode::Recall) => mess[3] |= (pelco_d::Extended::Recall as u8) << 1,
            Some(PresetMode::Store) => mess[3] |= (pelco_d::Extended::Store as u8) << 1,
            Some(PresetMode::Clear) => mess[3] |= (pelco_d::Extended::Clear as u8) << 1,
            None => (),
        }
        mess[5] = pkt.preset_number() as u8;
        seal(mess);
    }
}

fn encode_wiper(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SZ) {
        let ex = if pkt.wiper() == Some(WiperCommand::On) {
            pelco_d::Extended::AuxSet
        } else {
            pelco_d::Extended::AuxClear
        };
        encode_receiver(mess, pkt);
        bit_set(mess, pelco_d::BIT_EXTENDED);
        mess[3] |= (ex as u8) << 1;
        mess[5] = pelco_d::AUX_WIPER as u8;
        seal(mess);
    }
}

pub fn do_write(chn: &mut Channel, pkt: &mut CcPacket) -> u32 {
    let receiver = pkt.receiver();
    if receiver < 1 || receiver > MAX_ADDRESS {
        return 0;
    }
    pelco_d::adjust_menu_commands(pkt);
    if pkt.has_command() || pkt.has_autopan() || pkt.has_power() {
        encode_command(chn, pkt);
    }
    if pkt.preset_mode().is_some() {
        encode_preset(chn, pkt);
    }
    if pkt.wiper().is_some() {
        encode_wiper(chn, pkt);
    }
    1
}
