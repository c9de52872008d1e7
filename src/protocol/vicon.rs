//! Vicon protocol: 2-byte status, 6-byte command and 10-byte extended
//! frames.

use log::info;

use super::{bit_is_set, bit_set, Decode};
use crate::buffer::Buffer;
use crate::channel::Channel;
use crate::packet::{
    AckCommand, CcPacket, FocusMode, IrisMode, LensCommand, MenuCommand, PanMode, PresetMode,
    TiltMode, WiperCommand, ZoomMode, SPEED_MAX,
};
use crate::reader::CcReader;
use crate::writer;

pub const GAPTIME: u64 = 80;
pub const TIMEOUT: u64 = 15000;
pub const MAX_ADDRESS: i32 = 255;

const FLAG: u8 = 0x80;
const SIZE_STATUS: usize = 2;
const SIZE_COMMAND: usize = 6;
const SIZE_EXTENDED: usize = 10;

const PRESET_MENU_OPEN: i32 = 94;

// packet bit positions for PTZ functions
const BIT_COMMAND: usize = 12;
const BIT_ACK_ALARM: usize = 13;
const BIT_EXTENDED: usize = 14;
const BIT_AUTO_IRIS: usize = 17;
const BIT_AUTO_PAN: usize = 18;
const BIT_TILT_DOWN: usize = 19;
const BIT_TILT_UP: usize = 20;
const BIT_PAN_RIGHT: usize = 21;
const BIT_PAN_LEFT: usize = 22;
const BIT_LENS_SPEED: usize = 24;
const BIT_IRIS_CLOSE: usize = 25;
const BIT_IRIS_OPEN: usize = 26;
const BIT_FOCUS_NEAR: usize = 27;
const BIT_FOCUS_FAR: usize = 28;
const BIT_ZOOM_IN: usize = 29;
const BIT_ZOOM_OUT: usize = 30;
const BIT_AUX_6: usize = 33;
const BIT_RECALL: usize = 45;
const BIT_STORE: usize = 46;
const BIT_EX_STORE: usize = 48;
const BIT_EX_STATUS: usize = 49;
const BIT_EX_REQUEST: usize = 52;

fn decode_receiver(pkt: &mut CcPacket, mess: &[u8]) {
    let receiver = (((mess[0] & 0x0f) as i32) << 4) | ((mess[1] & 0x0f) as i32);
    pkt.set_receiver(receiver);
}

fn is_command(mess: &[u8]) -> bool {
    bit_is_set(mess, BIT_COMMAND)
}

fn is_extended_command(mess: &[u8]) -> bool {
    bit_is_set(mess, BIT_COMMAND) && bit_is_set(mess, BIT_EXTENDED)
}

fn decode_pan(pkt: &mut CcPacket, mess: &[u8]) {
    if bit_is_set(mess, BIT_PAN_RIGHT) {
        pkt.set_pan(Some(PanMode::Right), SPEED_MAX);
    } else if bit_is_set(mess, BIT_PAN_LEFT) {
        pkt.set_pan(Some(PanMode::Left), SPEED_MAX);
    } else {
        pkt.set_pan(Some(PanMode::Left), 0);
    }
}

fn decode_tilt(pkt: &mut CcPacket, mess: &[u8]) {
    if bit_is_set(mess, BIT_TILT_UP) {
        pkt.set_tilt(Some(TiltMode::Up), SPEED_MAX);
    } else if bit_is_set(mess, BIT_TILT_DOWN) {
        pkt.set_tilt(Some(TiltMode::Down), SPEED_MAX);
    } else {
        pkt.set_tilt(Some(TiltMode::Down), 0);
    }
}

fn decode_lens(pkt: &mut CcPacket, mess: &[u8]) {
    if bit_is_set(mess, BIT_IRIS_OPEN) {
        pkt.set_iris(Some(IrisMode::Open));
    } else if bit_is_set(mess, BIT_IRIS_CLOSE) {
        pkt.set_iris(Some(IrisMode::Close));
    }
    if bit_is_set(mess, BIT_FOCUS_NEAR) {
        pkt.set_focus(Some(FocusMode::Near));
    } else if bit_is_set(mess, BIT_FOCUS_FAR) {
        pkt.set_focus(Some(FocusMode::Far));
    }
    if bit_is_set(mess, BIT_ZOOM_IN) {
        pkt.set_zoom(Some(ZoomMode::In));
    } else if bit_is_set(mess, BIT_ZOOM_OUT) {
        pkt.set_zoom(Some(ZoomMode::Out));
    }
}

fn decode_toggles(pkt: &mut CcPacket, mess: &[u8]) {
    if bit_is_set(mess, BIT_ACK_ALARM) {
        pkt.set_ack(Some(AckCommand::Alarm));
    }
    if bit_is_set(mess, BIT_AUTO_IRIS) {
        pkt.set_iris(Some(IrisMode::Auto));
    }
    if bit_is_set(mess, BIT_AUTO_PAN) {
        pkt.set_pan(Some(PanMode::Auto), 0);
    }
    if bit_is_set(mess, BIT_LENS_SPEED) {
        pkt.set_lens(Some(LensCommand::Speed));
    }
}

fn decode_aux(pkt: &mut CcPacket, mess: &[u8]) {
    if bit_is_set(mess, BIT_AUX_6) {
        pkt.set_wiper(Some(WiperCommand::On));
    }
}

fn decode_preset(pkt: &mut CcPacket, mess: &[u8]) {
    let p_num = (mess[5] & 0x0f) as i32;
    if bit_is_set(mess, BIT_RECALL) {
        pkt.set_preset(Some(PresetMode::Recall), p_num);
    } else if bit_is_set(mess, BIT_STORE) {
        pkt.set_preset(Some(PresetMode::Store), p_num);
    }
}

fn decode_ex_speed(pkt: &mut CcPacket, mess: &[u8]) {
    let pan = (((mess[6] & 0x0f) as i32) << 7) | ((mess[7] & 0x7f) as i32);
    let tilt = (((mess[8] & 0x0f) as i32) << 7) | ((mess[9] & 0x7f) as i32);
    pkt.set_pan_speed(pan);
    pkt.set_tilt_speed(tilt);
}

fn decode_ex_preset(pkt: &mut CcPacket, mess: &[u8]) {
    let p_num = (mess[7] & 0x7f) as i32;
    let pan = (mess[8] & 0x7f) as i32;
    let tilt = (mess[9] & 0x7f) as i32;
    if bit_is_set(mess, BIT_EX_STORE) {
        pkt.set_preset(Some(PresetMode::Store), p_num);
    } else {
        pkt.set_preset(Some(PresetMode::Recall), p_num);
    }
    pkt.set_pan_speed(pan);
    pkt.set_tilt_speed(tilt);
}

fn decode_extended(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) -> Decode {
    if rxbuf.available() < SIZE_EXTENDED {
        return Decode::Done;
    }
    let mut mess = [0u8; SIZE_EXTENDED];
    mess.copy_from_slice(&rxbuf.output()[..SIZE_EXTENDED]);
    decode_receiver(&mut rdr.packet, &mess);
    decode_pan(&mut rdr.packet, &mess);
    decode_tilt(&mut rdr.packet, &mess);
    decode_lens(&mut rdr.packet, &mess);
    decode_toggles(&mut rdr.packet, &mess);
    decode_aux(&mut rdr.packet, &mess);
    decode_preset(&mut rdr.packet, &mess);
    if bit_is_set(&mess, BIT_EX_REQUEST) {
        if !bit_is_set(&mess, BIT_EX_STATUS) {
            decode_ex_preset(&mut rdr.packet, &mess);
        }
        // status requests carry nothing to transcode
    } else {
        decode_ex_speed(&mut rdr.packet, &mess);
    }
    rxbuf.consume(SIZE_EXTENDED);
    rdr.process_packet(out);
    Decode::More
}

fn decode_command(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) -> Decode {
    if rxbuf.available() < SIZE_COMMAND {
        return Decode::Done;
    }
    let mut mess = [0u8; SIZE_COMMAND];
    mess.copy_from_slice(&rxbuf.output()[..SIZE_COMMAND]);
    decode_receiver(&mut rdr.packet, &mess);
    decode_pan(&mut rdr.packet, &mess);
    decode_tilt(&mut rdr.packet, &mess);
    decode_lens(&mut rdr.packet, &mess);
    decode_toggles(&mut rdr.packet, &mess);
    decode_aux(&mut rdr.packet, &mess);
    decode_preset(&mut rdr.packet, &mess);
    rxbuf.consume(SIZE_COMMAND);
    rdr.process_packet(out);
    Decode::More
}

fn decode_status(rxbuf: &mut Buffer) -> Decode {
    // ignore status messages
    rxbuf.consume(SIZE_STATUS);
    Decode::More
}

fn decode_message(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) -> Decode {
    let first = rxbuf.output()[0];
    if first & FLAG == 0 {
        info!("Vicon: unexpected byte {:02X}", first);
        rxbuf.consume(1);
        return Decode::More;
    }
    let mut head = [0u8; SIZE_STATUS];
    head.copy_from_slice(&rxbuf.output()[..SIZE_STATUS]);
    if is_extended_command(&head) {
        decode_extended(rdr, rxbuf, out)
    } else if is_command(&head) {
        decode_command(rdr, rxbuf, out)
    } else {
        decode_status(rxbuf)
    }
}

pub fn do_read(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) {
    while rxbuf.available() >= SIZE_STATUS {
        if decode_message(rdr, rxbuf, out) == Decode::Done {
            break;
        }
    }
}

fn encode_receiver(mess: &mut [u8], pkt: &CcPacket) {
    let receiver = pkt.receiver();
    mess[0] = FLAG | ((receiver >> 4) & 0x0f) as u8;
    mess[1] = (receiver & 0x0f) as u8;
}

fn encode_pan_tilt(mess: &mut [u8], pkt: &CcPacket) {
    if pkt.has_pan() {
        match pkt.pan_mode() {
            Some(PanMode::Left) => bit_set(mess, BIT_PAN_LEFT),
            Some(PanMode::Right) => bit_set(mess, BIT_PAN_RIGHT),
            _ => (),
        }
    }
    if pkt.has_tilt() {
        match pkt.tilt_mode() {
            Some(TiltMode::Up) => bit_set(mess, BIT_TILT_UP),
            Some(TiltMode::Down) => bit_set(mess, BIT_TILT_DOWN),
            None => (),
        }
    }
}

fn encode_lens(mess: &mut [u8], pkt: &CcPacket) {
    match pkt.iris() {
        Some(IrisMode::Open) => bit_set(mess, BIT_IRIS_OPEN),
        Some(IrisMode::Close) => bit_set(mess, BIT_IRIS_CLOSE),
        _ => (),
    }
    match pkt.focus() {
        Some(FocusMode::Near) => bit_set(mess, BIT_FOCUS_NEAR),
        Some(FocusMode::Far) => bit_set(mess, BIT_FOCUS_FAR),
        _ => (),
    }
    match pkt.zoom() {
        Some(ZoomMode::In) => bit_set(mess, BIT_ZOOM_IN),
        Some(ZoomMode::Out) => bit_set(mess, BIT_ZOOM_OUT),
        None => (),
    }
}

fn encode_toggles(mess: &mut [u8], pkt: &CcPacket) {
    if pkt.ack() == Some(AckCommand::Alarm) {
        bit_set(mess, BIT_ACK_ALARM);
    }
    if pkt.iris() == Some(IrisMode::Auto) {
        bit_set(mess, BIT_AUTO_IRIS);
    }
    if pkt.pan_mode() == Some(PanMode::Auto) {
        bit_set(mess, BIT_AUTO_PAN);
    }
    if pkt.lens() == Some(LensCommand::Speed) {
        bit_set(mess, BIT_LENS_SPEED);
    }
}

fn encode_aux(mess: &mut [u8], pkt: &CcPacket) {
    if pkt.wiper() == Some(WiperCommand::On) {
        bit_set(mess, BIT_AUX_6);
    }
}

fn encode_preset(mess: &mut [u8], pkt: &CcPacket) {
    match pkt.preset_mode() {
        Some(PresetMode::Recall) => bit_set(mess, BIT_RECALL),
        Some(PresetMode::Store) => bit_set(mess, BIT_STORE),
        _ => (),
    }
    mess[5] |= (pkt.preset_number() & 0x0f) as u8;
}

fn encode_command(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SIZE_COMMAND) {
        encode_receiver(mess, pkt);
        bit_set(mess, BIT_COMMAND);
        encode_pan_tilt(mess, pkt);
        encode_lens(mess, pkt);
        encode_toggles(mess, pkt);
        encode_aux(mess, pkt);
        encode_preset(mess, pkt);
    }
}

fn encode_speeds(mess: &mut [u8], pkt: &CcPacket) {
    let pan = pkt.pan_speed() & 0x7ff;
    let tilt = pkt.tilt_speed() & 0x7ff;
    mess[6] = ((pan >> 7) & 0x0f) as u8;
    mess[7] = (pan & 0x7f) as u8;
    mess[8] = ((tilt >> 7) & 0x0f) as u8;
    mess[9] = (tilt & 0x7f) as u8;
}

fn encode_extended_speed(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SIZE_EXTENDED) {
        encode_receiver(mess, pkt);
        bit_set(mess, BIT_COMMAND);
        bit_set(mess, BIT_EXTENDED);
        encode_pan_tilt(mess, pkt);
        encode_lens(mess, pkt);
        encode_toggles(mess, pkt);
        encode_aux(mess, pkt);
        encode_preset(mess, pkt);
        encode_speeds(mess, pkt);
    }
}

fn encode_extended_preset(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SIZE_EXTENDED) {
        encode_receiver(mess, pkt);
        bit_set(mess, BIT_COMMAND);
        bit_set(mess, BIT_EXTENDED);
        bit_set(mess, BIT_EX_REQUEST);
        if pkt.preset_mode() == Some(PresetMode::Store) {
            bit_set(mess, BIT_EX_STORE);
        }
        encode_lens(mess, pkt);
        encode_toggles(mess, pkt);
        encode_aux(mess, pkt);
        mess[7] |= (pkt.preset_number() & 0x7f) as u8;
        mess[8] |= (pkt.pan_speed() & 0x7f) as u8;
        mess[9] |= (pkt.tilt_speed() & 0x7f) as u8;
    }
}

fn is_extended_preset(pkt: &CcPacket) -> bool {
    match pkt.preset_mode() {
        Some(PresetMode::Recall) | Some(PresetMode::Store) => {
            pkt.preset_number() > 15 || pkt.pan_speed() != 0 || pkt.tilt_speed() != 0
        }
        _ => false,
    }
}

fn is_extended_speed(pkt: &CcPacket) -> bool {
    // NOTE: for certain receivers, it appears that auxiliary functions
    //       will not work unless they are in an extended packet.
    pkt.has_pan() || pkt.has_tilt() || pkt.wiper().is_some()
}

fn adjust_menu_commands(pkt: &mut CcPacket) {
    match pkt.menu() {
        Some(MenuCommand::Open) => pkt.set_preset(Some(PresetMode::Store), PRESET_MENU_OPEN),
        Some(MenuCommand::Enter) => pkt.set_pan(Some(PanMode::Auto), 0),
        Some(MenuCommand::Cancel) => pkt.set_iris(Some(IrisMode::Auto)),
        None => (),
    }
}

pub fn do_write(chn: &mut Channel, pkt: &mut CcPacket) -> u32 {
    let receiver = pkt.receiver();
    if receiver < 1 || receiver > MAX_ADDRESS {
        return 0;
    }
    adjust_menu_commands(pkt);
    if is_extended_preset(pkt) {
        encode_extended_preset(chn, pkt);
    } else if is_extended_speed(pkt) {
        encode_extended_speed(chn, pkt);
    } else {
        encode_command(chn, pkt);
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelFlags;

    fn test_channel() -> Channel {
        Channel::new("test", "", ChannelFlags::empty())
    }

    fn read_frames(bytes: &[u8]) -> Vec<CcPacket> {
        let mut rdr = CcReader::new("v", "vicon").unwrap();
        let mut rxbuf = Buffer::new(256);
        rxbuf.append(bytes.len()).unwrap().copy_from_slice(bytes);
        let mut out = Vec::new();
        rdr.do_read(&mut rxbuf, &mut out);
        out
    }

    #[test]
    fn extended_speed_round_trip() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(77);
        pkt.set_pan(Some(PanMode::Right), 1234);
        pkt.set_tilt(Some(TiltMode::Down), 567);
        assert_eq!(do_write(&mut chn, &mut pkt), 1);
        let mess = chn.txbuf.output().to_vec();
        assert_eq!(mess.len(), SIZE_EXTENDED);
        let pkts = read_frames(&mess);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].receiver(), 77);
        assert_eq!(pkts[0].pan_mode(), Some(PanMode::Right));
        // 11-bit speeds carry through exactly
        assert_eq!(pkts[0].pan_speed(), 1234);
        assert_eq!(pkts[0].tilt_speed(), 567);
    }

    #[test]
    fn status_frames_are_ignored() {
        let pkts = read_frames(&[0x81, 0x01]);
        assert!(pkts.is_empty());
    }

    #[test]
    fn partial_extended_frame_waits() {
        let mut rdr = CcReader::new("v", "vicon").unwrap();
        let mut rxbuf = Buffer::new(256);
        let mut mess = [0u8; SIZE_EXTENDED];
        mess[0] = FLAG;
        bit_set(&mut mess, BIT_COMMAND);
        bit_set(&mut mess, BIT_EXTENDED);
        rxbuf.append(6).unwrap().copy_from_slice(&mess[..6]);
        let mut out = Vec::new();
        rdr.do_read(&mut rxbuf, &mut out);
        assert!(out.is_empty());
        assert_eq!(rxbuf.available(), 6);
    }

    #[test]
    fn small_preset_uses_command_frame() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(5);
        pkt.set_preset(Some(PresetMode::Recall), 7);
        do_write(&mut chn, &mut pkt);
        assert_eq!(chn.txbuf.available(), SIZE_COMMAND);
        let pkts = read_frames(chn.txbuf.output());
        assert_eq!(pkts[0].preset_mode(), Some(PresetMode::Recall));
        assert_eq!(pkts[0].preset_number(), 7);
    }

    #[test]
    fn large_preset_uses_extended_frame() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(5);
        pkt.set_preset(Some(PresetMode::Store), 40);
        do_write(&mut chn, &mut pkt);
        assert_eq!(chn.txbuf.available(), SIZE_EXTENDED);
        let pkts = read_frames(chn.txbuf.output());
        assert_eq!(pkts[0].preset_mode(), Some(PresetMode::Store));
        assert_eq!(pkts[0].preset_number(), 40);
    }

    #[test]
    fn wiper_rides_the_extended_frame() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(5);
        pkt.set_wiper(Some(WiperCommand::On));
        do_write(&mut chn, &mut pkt);
        assert_eq!(chn.txbuf.available(), SIZE_EXTENDED);
        let pkts = read_frames(chn.txbuf.output());
        assert_eq!(pkts[0].wiper(), Some(WiperCommand::On));
    }

    #[test]
    fn menu_open_becomes_store_preset_94() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(5);
        pkt.set_menu(Some(MenuCommand::Open));
        do_write(&mut chn, &mut pkt);
        let pkts = read_frames(chn.txbuf.output());
        assert_eq!(pkts[0].preset_mode(), Some(PresetMode::Store));
        assert_eq!(pkts[0].preset_number(), 94);
    }
}
