//! Manchester protocol: 3-byte pan/tilt/lens frames.

use log::info;

use super::Decode;
use crate::buffer::Buffer;
use crate::channel::Channel;
use crate::packet::{
    CameraCommand, CcPacket, FocusMode, IrisMode, PanMode, PresetMode, TiltMode, WiperCommand,
    ZoomMode, SPEED_MAX,
};
use crate::reader::CcReader;
use crate::writer;

pub const GAPTIME: u64 = 0;
pub const TIMEOUT: u64 = 80;
pub const MAX_ADDRESS: i32 = 1024;

const FLAG: u8 = 0x80;
const PT_COMMAND: u8 = 0x02;
const SIZE_MSG: usize = 3;
const SPEED_FULL: usize = 7;

/// Lookup table for pan/tilt speeds 0 - 6 (or 7)
const SPEED: [i32; 8] = [
    1 << 8,
    2 << 8,
    3 << 8,
    4 << 8,
    5 << 8,
    6 << 8,
    7 << 8,
    SPEED_MAX,
];

// pan/tilt command values
const PT_TILT_DOWN: u8 = 0b00;
const PT_TILT_UP: u8 = 0b01;
const PT_PAN_LEFT: u8 = 0b10;
const PT_PAN_RIGHT: u8 = 0b11;

// extended function values
const EX_LENS: u8 = 0b00;
const EX_AUX: u8 = 0b01;
const EX_RECALL: u8 = 0b10;
const EX_STORE: u8 = 0b11;

// lens command values
const XL_TILT_DOWN: u8 = 0; // full tilt down, not really a lens function
const XL_IRIS_OPEN: u8 = 1;
const XL_FOCUS_FAR: u8 = 2;
const XL_ZOOM_IN: u8 = 3;
const XL_IRIS_CLOSE: u8 = 4;
const XL_FOCUS_NEAR: u8 = 5;
const XL_ZOOM_OUT: u8 = 6;
const XL_PAN_LEFT: u8 = 7; // full pan left

// auxiliary command values
const AUX_FULL_UP: u8 = 0; // full tilt up
const AUX_FULL_RIGHT: u8 = 1; // full pan right
const AUX_1: u8 = 2; // camera off
const AUX_4: u8 = 3; // camera on
const AUX_6: u8 = 7; // wiper on

fn is_pan_tilt_command(mess: &[u8]) -> bool {
    mess[2] & PT_COMMAND != 0
}

fn decode_receiver(mess: &[u8]) -> i32 {
    1 + ((((mess[0] & 0x0f) as i32) << 6)
        | (((mess[1] & 0x01) as i32) << 5)
        | (((mess[2] >> 2) & 0x1f) as i32))
}

fn decode_command(mess: &[u8]) -> u8 {
    (mess[1] >> 4) & 0x03
}

fn pt_extra(mess: &[u8]) -> u8 {
    (mess[1] >> 1) & 0x07
}

fn decode_speed(mess: &[u8]) -> i32 {
    SPEED[pt_extra(mess) as usize]
}

fn decode_pan_tilt(pkt: &mut CcPacket, cmnd: u8, speed: i32) {
    match cmnd {
        PT_PAN_LEFT => pkt.set_pan(Some(PanMode::Left), speed),
        PT_PAN_RIGHT => pkt.set_pan(Some(PanMode::Right), speed),
        PT_TILT_DOWN => pkt.set_tilt(Some(TiltMode::Down), speed),
        PT_TILT_UP => pkt.set_tilt(Some(TiltMode::Up), speed),
        _ => (),
    }
}

fn decode_lens(pkt: &mut CcPacket, extra: u8) {
    match extra {
        XL_ZOOM_IN => pkt.set_zoom(Some(ZoomMode::In)),
        XL_ZOOM_OUT => pkt.set_zoom(Some(ZoomMode::Out)),
        XL_FOCUS_FAR => pkt.set_focus(Some(FocusMode::Far)),
        XL_FOCUS_NEAR => pkt.set_focus(Some(FocusMode::Near)),
        XL_IRIS_OPEN => pkt.set_iris(Some(IrisMode::Open)),
        XL_IRIS_CLOSE => pkt.set_iris(Some(IrisMode::Close)),
        // weird special cases for full-speed moves
        XL_TILT_DOWN => pkt.set_tilt(Some(TiltMode::Down), SPEED_MAX),
        XL_PAN_LEFT => pkt.set_pan(Some(PanMode::Left), SPEED_MAX),
        _ => (),
    }
}

fn decode_aux(pkt: &mut CcPacket, extra: u8) {
    match extra {
        AUX_FULL_UP => pkt.set_tilt(Some(TiltMode::Up), SPEED_MAX),
        AUX_FULL_RIGHT => pkt.set_pan(Some(PanMode::Right), SPEED_MAX),
        AUX_1 => pkt.set_camera(Some(CameraCommand::Off)),
        AUX_4 => pkt.set_camera(Some(CameraCommand::On)),
        AUX_6 => pkt.set_wiper(Some(WiperCommand::On)),
        _ => (),
    }
}

fn decode_extended(pkt: &mut CcPacket, cmnd: u8, extra: u8) {
    match cmnd {
        EX_LENS => decode_lens(pkt, extra),
        EX_AUX => decode_aux(pkt, extra),
        EX_RECALL => pkt.set_preset(Some(PresetMode::Recall), extra as i32 + 1),
        EX_STORE => pkt.set_preset(Some(PresetMode::Store), extra as i32 + 1),
        _ => (),
    }
}

fn decode_packet(pkt: &mut CcPacket, mess: &[u8]) {
    let cmnd = decode_command(mess);
    if is_pan_tilt_command(mess) {
        decode_pan_tilt(pkt, cmnd, decode_speed(mess));
    } else {
        decode_extended(pkt, cmnd, pt_extra(mess));
    }
}

fn decode_message(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) -> Decode {
    let mut mess = [0u8; SIZE_MSG];
    mess.copy_from_slice(&rxbuf.output()[..SIZE_MSG]);
    if mess[0] & FLAG == 0 {
        info!("Manchester: unexpected byte {:02X}", mess[0]);
        rxbuf.consume(1);
        return Decode::More;
    }
    let receiver = decode_receiver(&mess);
    if rdr.packet.receiver() != receiver {
        rdr.process_packet(out);
    }
    rdr.packet.set_receiver(receiver);
    decode_packet(&mut rdr.packet, &mess);
    rxbuf.consume(SIZE_MSG);
    Decode::More
}

pub fn do_read(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) {
    while rxbuf.available() >= SIZE_MSG {
        if decode_message(rdr, rxbuf, out) == Decode::Done {
            break;
        }
    }
    // a partial frame in the buffer holds off processing
    if rxbuf.is_empty() {
        rdr.process_packet(out);
    }
}

fn encode_receiver(mess: &mut [u8], pkt: &CcPacket) {
    let rdr = pkt.receiver() - 1;
    mess[0] = FLAG | ((rdr >> 6) & 0x0f) as u8;
    mess[1] = ((rdr >> 5) & 0x01) as u8;
    mess[2] = ((rdr & 0x1f) << 2) as u8;
}

fn encode_pan_tilt_command(chn: &mut Channel, pkt: &CcPacket, cmnd: u8, speed: usize) {
    if let Some(mess) = writer::append(chn, SIZE_MSG) {
        encode_receiver(mess, pkt);
        mess[1] |= (cmnd << 4) | ((speed as u8) << 1);
        mess[2] |= PT_COMMAND;
    }
}

fn encode_lens_function(chn: &mut Channel, pkt: &CcPacket, func: u8) {
    if let Some(mess) = writer::append(chn, SIZE_MSG) {
        encode_receiver(mess, pkt);
        mess[1] |= (func << 1) | (EX_LENS << 4);
    }
}

fn encode_aux_function(chn: &mut Channel, pkt: &CcPacket, aux: u8) {
    if let Some(mess) = writer::append(chn, SIZE_MSG) {
        encode_receiver(mess, pkt);
        mess[1] |= (aux << 1) | (EX_AUX << 4);
    }
}

/// Round a speed up to the next bucket.
fn encode_speed(speed: i32) -> usize {
    for s in 0..SPEED_FULL {
        if SPEED[s] >= speed {
            return s;
        }
    }
    SPEED_FULL
}

fn encode_pan(chn: &mut Channel, pkt: &CcPacket) {
    let speed = encode_speed(pkt.pan_speed());
    match pkt.pan_mode() {
        Some(PanMode::Left) => {
            if speed == SPEED_FULL {
                encode_lens_function(chn, pkt, XL_PAN_LEFT);
            } else {
                encode_pan_tilt_command(chn, pkt, PT_PAN_LEFT, speed);
            }
        }
        Some(PanMode::Right) => {
            if speed == SPEED_FULL {
                encode_aux_function(chn, pkt, AUX_FULL_RIGHT);
            } else {
                encode_pan_tilt_command(chn, pkt, PT_PAN_RIGHT, speed);
            }
        }
        _ => (),
    }
}

fn encode_tilt(chn: &mut Channel, pkt: &CcPacket) {
    let speed = encode_speed(pkt.tilt_speed());
    match pkt.tilt_mode() {
        Some(TiltMode::Down) => {
            if speed == SPEED_FULL {
                encode_lens_function(chn, pkt, XL_TILT_DOWN);
            } else {
                encode_pan_tilt_command(chn, pkt, PT_TILT_DOWN, speed);
            }
        }
        Some(TiltMode::Up) => {
            if speed == SPEED_FULL {
                encode_aux_function(chn, pkt, AUX_FULL_UP);
            } else {
                encode_pan_tilt_command(chn, pkt, PT_TILT_UP, speed);
            }
        }
        None => (),
    }
}

fn encode_zoom(chn: &mut Channel, pkt: &CcPacket) {
    match pkt.zoom() {
        Some(ZoomMode::Out) => encode_lens_function(chn, pkt, XL_ZOOM_OUT),
        Some(ZoomMode::In) => encode_lens_function(chn, pkt, XL_ZOOM_IN),
        None => (),
    }
}

fn encode_focus(chn: &mut Channel, pkt: &CcPacket) {
    match pkt.focus() {
        Some(FocusMode::Near) => encode_lens_function(chn, pkt, XL_FOCUS_NEAR),
        Some(FocusMode::Far) => encode_lens_function(chn, pkt, XL_FOCUS_FAR),
        _ => (),
    }
}

fn encode_iris(chn: &mut Channel, pkt: &CcPacket) {
    match pkt.iris() {
        Some(IrisMode::Close) => encode_lens_function(chn, pkt, XL_IRIS_CLOSE),
        Some(IrisMode::Open) => encode_lens_function(chn, pkt, XL_IRIS_OPEN),
        _ => (),
    }
}

fn encode_aux(chn: &mut Channel, pkt: &CcPacket) {
    if pkt.camera() == Some(CameraCommand::Off) {
        encode_aux_function(chn, pkt, AUX_1);
    } else if pkt.camera() == Some(CameraCommand::On) {
        encode_aux_function(chn, pkt, AUX_4);
    } else if pkt.wiper() == Some(WiperCommand::On) {
        encode_aux_function(chn, pkt, AUX_6);
    }
}

fn encode_recall_function(chn: &mut Channel, pkt: &CcPacket, preset: u8) {
    if let Some(mess) = writer::append(chn, SIZE_MSG) {
        encode_receiver(mess, pkt);
        mess[1] |= (preset << 1) | (EX_RECALL << 4);
    }
}

fn encode_store_function(chn: &mut Channel, pkt: &CcPacket, preset: u8) {
    if let Some(mess) = writer::append(chn, SIZE_MSG) {
        encode_receiver(mess, pkt);
        mess[1] |= (preset << 1) | (EX_STORE << 4);
    }
}

fn encode_preset(chn: &mut Channel, pkt: &CcPacket) {
    let preset = pkt.preset_number();
    if preset < 1 || preset > 8 {
        return;
    }
    match pkt.preset_mode() {
        Some(PresetMode::Recall) => encode_recall_function(chn, pkt, (preset - 1) as u8),
        Some(PresetMode::Store) => encode_store_function(chn, pkt, (preset - 1) as u8),
        _ => (),
    }
}

pub fn do_write(chn: &mut Channel, pkt: &mut CcPacket) -> u32 {
    let receiver = pkt.receiver();
    if receiver < 1 || receiver > MAX_ADDRESS {
        return 0;
    }
    if pkt.has_pan() {
        encode_pan(chn, pkt);
    }
    if pkt.tilt_speed() > 0 {
        encode_tilt(chn, pkt);
    }
    encode_zoom(chn, pkt);
    encode_focus(chn, pkt);
    encode_iris(chn, pkt);
    encode_aux(chn, pkt);
    encode_preset(chn, pkt);
    1
}
