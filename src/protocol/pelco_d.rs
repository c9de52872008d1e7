//! Pelco-D protocol: 7-byte framed messages with a modular checksum.

use log::info;
use num_traits::FromPrimitive;

use super::{bit_is_set, bit_set, Decode};
use crate::buffer::Buffer;
use crate::channel::Channel;
use crate::packet::{
    CameraCommand, CcPacket, FocusMode, IrisMode, MenuCommand, PanMode, PresetMode, TiltMode,
    WiperCommand, ZoomMode, SPEED_MAX,
};
use crate::reader::CcReader;
use crate::writer;

pub const SZ: usize = 7;
pub const GAPTIME: u64 = 80;
pub const TIMEOUT: u64 = 15000; // tested with Pelco Esprit
pub const MAX_ADDRESS: i32 = 254;

const FLAG: u8 = 0xff;
const TURBO_SPEED: i32 = 1 << 6;

const PRESET_MENU_OPEN: i32 = 95;

// packet bit positions for PTZ functions
pub(crate) const BIT_FOCUS_NEAR: usize = 16;
pub(crate) const BIT_IRIS_OPEN: usize = 17;
pub(crate) const BIT_IRIS_CLOSE: usize = 18;
pub(crate) const BIT_CAMERA_ON_OFF: usize = 19;
pub(crate) const BIT_AUTO_PAN: usize = 20;
pub(crate) const BIT_SENSE: usize = 23;
pub(crate) const BIT_EXTENDED: usize = 24;
pub(crate) const BIT_PAN_RIGHT: usize = 25;
pub(crate) const BIT_PAN_LEFT: usize = 26;
pub(crate) const BIT_TILT_UP: usize = 27;
pub(crate) const BIT_TILT_DOWN: usize = 28;
pub(crate) const BIT_ZOOM_IN: usize = 29;
pub(crate) const BIT_ZOOM_OUT: usize = 30;
pub(crate) const BIT_FOCUS_FAR: usize = 31;

/// Extended function opcodes.
#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive)]
pub(crate) enum Extended {
    None = 0,
    Store,
    Clear,
    Recall,
    AuxSet,
    AuxClear,
    Reserved,
    Reset,
    ZoneStart,
    ZoneEnd,
    CharWrite,
    CharClear,
    AckAlarm,
    ZoneScanOn,
    ZoneScanOff,
    PatternStart,
    PatternStop,
    PatternRun,
    ZoomSpeed,
    FocusSpeed,
}

/// Auxiliary function for the wiper relay.
pub(crate) const AUX_WIPER: i32 = 1;

fn calculate_checksum(mess: &[u8]) -> u8 {
    mess[1..6].iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

fn decode_speed(val: u8) -> i32 {
    let speed = (val as i32) << 5;
    if speed > SPEED_MAX {
        SPEED_MAX
    } else {
        speed
    }
}

pub(crate) fn decode_pan_bits(pkt: &mut CcPacket, mess: &[u8], pan: i32) {
    if bit_is_set(mess, BIT_PAN_RIGHT) {
        pkt.set_pan(Some(PanMode::Right), pan);
    } else if bit_is_set(mess, BIT_PAN_LEFT) {
        pkt.set_pan(Some(PanMode::Left), pan);
    } else {
        pkt.set_pan(Some(PanMode::Left), 0);
    }
}

pub(crate) fn decode_tilt_bits(pkt: &mut CcPacket, mess: &[u8], tilt: i32) {
    if bit_is_set(mess, BIT_TILT_UP) {
        pkt.set_tilt(Some(TiltMode::Up), tilt);
    } else if bit_is_set(mess, BIT_TILT_DOWN) {
        pkt.set_tilt(Some(TiltMode::Down), tilt);
    } else {
        pkt.set_tilt(Some(TiltMode::Down), 0);
    }
}

pub(crate) fn decode_lens(pkt: &mut CcPacket, mess: &[u8]) {
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

/// The sense bit flips camera on/off and auto/manual pan.
pub(crate) fn decode_sense(pkt: &mut CcPacket, mess: &[u8]) {
    if bit_is_set(mess, BIT_SENSE) {
        if bit_is_set(mess, BIT_CAMERA_ON_OFF) {
            pkt.set_camera(Some(CameraCommand::On));
        }
        if bit_is_set(mess, BIT_AUTO_PAN) {
            pkt.set_pan(Some(PanMode::Auto), 0);
        }
    } else {
        if bit_is_set(mess, BIT_CAMERA_ON_OFF) {
            pkt.set_camera(Some(CameraCommand::Off));
        }
        if bit_is_set(mess, BIT_AUTO_PAN) {
            pkt.set_pan(Some(PanMode::Manual), 0);
        }
    }
}

pub(crate) fn decode_extended(pkt: &mut CcPacket, ex: u8, p0: i32, _p1: i32) {
    match Extended::from_u8(ex) {
        Some(Extended::Store) => pkt.set_preset(Some(PresetMode::Store), p0),
        Some(Extended::Recall) => pkt.set_preset(Some(PresetMode::Recall), p0),
        Some(Extended::Clear) => pkt.set_preset(Some(PresetMode::Clear), p0),
        Some(Extended::AuxSet) => {
            if p0 == AUX_WIPER {
                pkt.set_wiper(Some(WiperCommand::On));
            }
        }
        Some(Extended::AuxClear) => {
            if p0 == AUX_WIPER {
                pkt.set_wiper(Some(WiperCommand::Off));
            }
        }
        // the remaining extended functions are not transcoded
        _ => (),
    }
}

/// Discard bytes up to the next frame flag, logging a hex dump.
fn discard_garbage(rxbuf: &mut Buffer, msg: &str) {
    let bytes = rxbuf.output();
    let mut n_bytes = 1;
    while n_bytes < bytes.len() && bytes[n_bytes] != FLAG {
        n_bytes += 1;
    }
    let mut dump = String::new();
    for b in bytes.iter().take(n_bytes.min(24)) {
        dump.push_str(&format!("{:02X} ", b));
    }
    if n_bytes > 8 {
        dump.push_str("...");
    }
    info!("Pelco(D) {}; discarding {} bytes: {}", msg, n_bytes, dump);
    rxbuf.consume(n_bytes);
}

fn decode_command(rdr: &mut CcReader, mess: &[u8], out: &mut Vec<CcPacket>) -> Decode {
    rdr.packet.set_receiver(mess[1] as i32);
    decode_pan_bits(&mut rdr.packet, mess, decode_speed(mess[4]));
    decode_tilt_bits(&mut rdr.packet, mess, decode_speed(mess[5]));
    decode_lens(&mut rdr.packet, mess);
    decode_sense(&mut rdr.packet, mess);
    rdr.process_packet(out);
    Decode::More
}

fn decode_extended_message(rdr: &mut CcReader, mess: &[u8], out: &mut Vec<CcPacket>) -> Decode {
    rdr.packet.set_receiver(mess[1] as i32);
    let ex = (mess[3] >> 1) & 0x1f;
    let p0 = mess[5] as i32;
    let p1 = mess[4] as i32;
    decode_extended(&mut rdr.packet, ex, p0, p1);
    rdr.process_packet(out);
    Decode::More
}

fn decode_message(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) -> Decode {
    let mut mess = [0u8; SZ];
    mess.copy_from_slice(&rxbuf.output()[..SZ]);
    if mess[0] != FLAG {
        discard_garbage(rxbuf, "Invalid FLAG");
        return Decode::More;
    }
    if calculate_checksum(&mess) != mess[6] {
        discard_garbage(rxbuf, "Invalid checksum");
        return Decode::More;
    }
    rxbuf.consume(SZ);
    if bit_is_set(&mess, BIT_EXTENDED) {
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
    mess[0] = FLAG;
    mess[1] = pkt.receiver() as u8;
}

/// Round to the nearest speed level.
pub(crate) fn encode_speed(speed: i32) -> i32 {
    let s = (speed >> 5) + ((speed % 32) >> 4);
    if s < TURBO_SPEED {
        s
    } else {
        TURBO_SPEED - 1
    }
}

/// Pan gets the turbo speed for the very top of the range.
pub(crate) fn encode_pan_speed(speed: i32) -> i32 {
    if speed > SPEED_MAX - 8 {
        TURBO_SPEED
    } else {
        encode_speed(speed)
    }
}

pub(crate) fn encode_pan(mess: &mut [u8], pkt: &CcPacket) {
    let pan = encode_pan_speed(pkt.pan_speed());
    mess[4] = pan as u8;
    if pkt.has_pan() {
        match pkt.pan_mode() {
            Some(PanMode::Left) => bit_set(mess, BIT_PAN_LEFT),
            Some(PanMode::Right) => bit_set(mess, BIT_PAN_RIGHT),
            _ => mess[4] = 0,
        }
    }
}

pub(crate) fn encode_tilt(mess: &mut [u8], pkt: &CcPacket) {
    let tilt = encode_speed(pkt.tilt_speed());
    mess[5] = tilt as u8;
    if tilt != 0 {
        match pkt.tilt_mode() {
            Some(TiltMode::Up) => bit_set(mess, BIT_TILT_UP),
            Some(TiltMode::Down) => bit_set(mess, BIT_TILT_DOWN),
            None => mess[5] = 0,
        }
    }
}

pub(crate) fn encode_lens(mess: &mut [u8], pkt: &CcPacket) {
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

pub(crate) fn encode_sense(mess: &mut [u8], pkt: &CcPacket) {
    let cc = pkt.camera();
    let pm = pkt.pan_mode();
    if cc == Some(CameraCommand::On) || pm == Some(PanMode::Auto) {
        bit_set(mess, BIT_SENSE);
        if cc == Some(CameraCommand::On) {
            bit_set(mess, BIT_CAMERA_ON_OFF);
        }
        if pm == Some(PanMode::Auto) {
            bit_set(mess, BIT_AUTO_PAN);
        }
    } else if cc == Some(CameraCommand::Off) || pm == Some(PanMode::Manual) {
        if cc == Some(CameraCommand::Off) {
            bit_set(mess, BIT_CAMERA_ON_OFF);
        }
        if pm == Some(PanMode::Manual) {
            bit_set(mess, BIT_AUTO_PAN);
        }
    }
}

fn encode_checksum(mess: &mut [u8]) {
    mess[6] = calculate_checksum(mess);
}

fn encode_command(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SZ) {
        encode_receiver(mess, pkt);
        encode_pan(mess, pkt);
        encode_tilt(mess, pkt);
        encode_lens(mess, pkt);
        encode_sense(mess, pkt);
        encode_checksum(mess);
    }
}

fn encode_preset(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SZ) {
        encode_receiver(mess, pkt);
        bit_set(mess, BIT_EXTENDED);
        match pkt.preset_mode() {
            Some(PresetMode::Recall) => mess[3] |= (Extended::Recall as u8) << 1,
            Some(PresetMode::Store) => mess[3] |= (Extended::Store as u8) << 1,
            Some(PresetMode::Clear) => mess[3] |= (Extended::Clear as u8) << 1,
            None => (),
        }
        mess[5] = pkt.preset_number() as u8;
        encode_checksum(mess);
    }
}

fn encode_wiper(chn: &mut Channel, pkt: &CcPacket) {
    if let Some(mess) = writer::append(chn, SZ) {
        let ex = if pkt.wiper() == Some(WiperCommand::On) {
            Extended::AuxSet
        } else {
            Extended::AuxClear
        };
        encode_receiver(mess, pkt);
        bit_set(mess, BIT_EXTENDED);
        mess[3] |= (ex as u8) << 1;
        mess[5] = AUX_WIPER as u8;
        encode_checksum(mess);
    }
}

/// Menu commands have no frame of their own; rewrite them into commands
/// the receivers act on.
pub(crate) fn adjust_menu_commands(pkt: &mut CcPacket) {
    match pkt.menu() {
        Some(MenuCommand::Open) => pkt.set_preset(Some(PresetMode::Store), PRESET_MENU_OPEN),
        Some(MenuCommand::Enter) => pkt.set_iris(Some(IrisMode::Open)),
        Some(MenuCommand::Cancel) => pkt.set_iris(Some(IrisMode::Close)),
        None => (),
    }
}

/// Encode a packet, writing an envelope via `prepare` before each frame.
pub(crate) fn do_write_cb(
    chn: &mut Channel,
    pkt: &mut CcPacket,
    prepare: &mut dyn FnMut(&mut Channel) -> bool,
) -> u32 {
    let receiver = pkt.receiver();
    if receiver < 1 || receiver > MAX_ADDRESS {
        return 0;
    }
    adjust_menu_commands(pkt);
    if pkt.has_command() || pkt.has_autopan() || pkt.has_power() {
        if prepare(chn) {
            encode_command(chn, pkt);
        }
    }
    if pkt.preset_mode().is_some() {
        if prepare(chn) {
            encode_preset(chn, pkt);
        }
    }
    if pkt.wiper().is_some() {
        if prepare(chn) {
            encode_wiper(chn, pkt);
        }
    }
    1
}

pub fn do_write(chn: &mut Channel, pkt: &mut CcPacket) -> u32 {
    do_write_cb(chn, pkt, &mut |_| true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelFlags;
    use crate::packet::MenuCommand;

    fn test_channel() -> Channel {
        Channel::new("test", "", ChannelFlags::empty())
    }

    fn read_frames(bytes: &[u8]) -> Vec<CcPacket> {
        let mut rdr = CcReader::new("d", "pelco_d").unwrap();
        let mut rxbuf = Buffer::new(256);
        rxbuf.append(bytes.len()).unwrap().copy_from_slice(bytes);
        let mut out = Vec::new();
        rdr.do_read(&mut rxbuf, &mut out);
        out
    }

    #[test]
    fn decode_pan_right_full() {
        let pkts = read_frames(&[0xff, 0x01, 0x00, 0x02, 0x3f, 0x00, 0x42]);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].receiver(), 1);
        assert_eq!(pkts[0].pan_mode(), Some(PanMode::Right));
        assert_eq!(pkts[0].pan_speed(), 0x3f << 5);
    }

    #[test]
    fn bad_checksum_resyncs_to_flag() {
        let mut bytes = vec![0xff, 0x01, 0x00, 0x02, 0x3f, 0x00, 0x99]; // bad sum
        bytes.extend_from_slice(&[0xff, 0x01, 0x00, 0x02, 0x3f, 0x00, 0x42]);
        let pkts = read_frames(&bytes);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].pan_mode(), Some(PanMode::Right));
    }

    #[test]
    fn decode_extended_store_preset() {
        // extended bit + store opcode, preset 6
        let mut mess = [0xff, 0x05, 0x00, 0x03, 0x00, 0x06, 0x00];
        mess[6] = calculate_checksum(&mess);
        let pkts = read_frames(&mess);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].preset_mode(), Some(PresetMode::Store));
        assert_eq!(pkts[0].preset_number(), 6);
    }

    #[test]
    fn store_preset_95_stays_a_preset() {
        let mut mess = [0xff, 0x05, 0x00, 0x03, 0x00, 95, 0x00];
        mess[6] = calculate_checksum(&mess);
        let pkts = read_frames(&mess);
        assert_eq!(pkts[0].preset_mode(), Some(PresetMode::Store));
        assert_eq!(pkts[0].preset_number(), 95);
    }

    #[test]
    fn speed_quantization_round_trip() {
        for speed in [0, 1, 31, 32, 100, 1000, 2000].iter() {
            let enc = encode_speed(*speed);
            let dec = decode_speed(enc as u8);
            assert!((dec - speed).abs() < 32, "speed {} -> {} -> {}", speed, enc, dec);
        }
    }

    #[test]
    fn top_pan_speed_is_turbo() {
        assert_eq!(encode_pan_speed(SPEED_MAX), TURBO_SPEED);
        assert_eq!(encode_pan_speed(SPEED_MAX - 8), 63);
        assert_eq!(encode_speed(SPEED_MAX), 63);
    }

    #[test]
    fn menu_open_becomes_store_preset_95() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(5);
        pkt.set_menu(Some(MenuCommand::Open));
        assert_eq!(do_write(&mut chn, &mut pkt), 1);
        let mess = chn.txbuf.output();
        assert_eq!(mess.len(), SZ);
        assert_eq!(mess[0], 0xff);
        assert_eq!(mess[1], 5);
        assert!(bit_is_set(mess, BIT_EXTENDED));
        assert_eq!(mess[3] >> 1 & 0x1f, Extended::Store as u8);
        assert_eq!(mess[5], 95);
        // checksum invariant
        let sum: u32 = mess[1..6].iter().map(|b| *b as u32).sum();
        assert_eq!((sum % 256) as u8, mess[6]);
    }

    #[test]
    fn wiper_encodes_aux_set_and_clear() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(1);
        pkt.set_wiper(Some(WiperCommand::On));
        do_write(&mut chn, &mut pkt);
        let mess = chn.txbuf.output().to_vec();
        assert_eq!(mess[3] >> 1 & 0x1f, Extended::AuxSet as u8);
        assert_eq!(mess[5], AUX_WIPER as u8);
        chn.txbuf.clear();
        pkt.set_wiper(Some(WiperCommand::Off));
        do_write(&mut chn, &mut pkt);
        assert_eq!(chn.txbuf.output()[3] >> 1 & 0x1f, Extended::AuxClear as u8);
    }

    #[test]
    fn command_and_preset_frames_together() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(2);
        pkt.set_pan(Some(PanMode::Left), 640);
        pkt.set_preset(Some(PresetMode::Recall), 3);
        assert_eq!(do_write(&mut chn, &mut pkt), 1);
        assert_eq!(chn.txbuf.available(), 2 * SZ);
    }

    #[test]
    fn camera_sense_round_trip() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(9);
        pkt.set_camera(Some(CameraCommand::On));
        do_write(&mut chn, &mut pkt);
        let pkts = read_frames(chn.txbuf.output());
        assert_eq!(pkts[0].camera(), Some(CameraCommand::On));
        let mut chn = test_channel();
        pkt.set_camera(Some(CameraCommand::Off));
        do_write(&mut chn, &mut pkt);
        let pkts = read_frames(chn.txbuf.output());
        assert_eq!(pkts[0].camera(), Some(CameraCommand::Off));
    }

    #[test]
    fn autopan_sense_round_trip() {
        let mut chn = test_channel();
        let mut pkt = CcPacket::new();
        pkt.set_receiver(9);
        pkt.set_pan(Some(PanMode::Auto), 0);
        do_write(&mut chn, &mut pkt);
        let pkts = read_frames(chn.txbuf.output());
        assert_eq!(pkts[0].pan_mode(), Some(PanMode::Auto));
    }
}
