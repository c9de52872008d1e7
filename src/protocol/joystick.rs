//! Linux joystick event input.
//!
//! Event records are 8 octets long:
//!
//! - 0-3: timestamp
//! - 4-5: value (-32767 to 32767)
//! - 6: event type (0x01 button, 0x02 axis, 0x80 initial value)
//! - 7: number (button 0 - N, or axis 0: pan, 1: tilt, 2: zoom)

use crate::buffer::Buffer;
use crate::packet::{
    CameraCommand, CcPacket, FocusMode, IrisMode, PanMode, PresetMode, TiltMode, WiperCommand,
    ZoomMode, SPEED_MAX,
};
use crate::reader::CcReader;

pub const TIMEOUT: u64 = 50;

const EVENT_OCTETS: usize = 8;

const EVENT_BUTTON: u8 = 0x01;
const EVENT_AXIS: u8 = 0x02;
const EVENT_INITIAL: u8 = 0x80;

const AXIS_PAN: u8 = 0;
const AXIS_TILT: u8 = 1;
const AXIS_ZOOM: u8 = 2;

const JSPEED_MAX: i32 = 32767;

const BUTTON_FOCUS_NEAR: u8 = 0;
const BUTTON_FOCUS_FAR: u8 = 1;
const BUTTON_IRIS_CLOSE: u8 = 2;
const BUTTON_IRIS_OPEN: u8 = 3;
const BUTTON_WIPER: u8 = 4;
const BUTTON_CAMERA: u8 = 5;
const BUTTON_PRESET_1: u8 = 6;
const BUTTON_PRESET_4: u8 = 9;
const BUTTON_PREVIOUS: u8 = 10;
const BUTTON_NEXT: u8 = 11;

fn decode_value(mess: &[u8]) -> i16 {
    i16::from_ne_bytes([mess[4], mess[5]])
}

fn remap_speed(value: i16) -> i32 {
    (value as i32).abs() * SPEED_MAX / JSPEED_MAX
}

fn decode_pan_mode(speed: i16) -> PanMode {
    if speed <= 0 {
        PanMode::Left
    } else {
        PanMode::Right
    }
}

fn decode_tilt_mode(speed: i16) -> TiltMode {
    if speed < 0 {
        TiltMode::Up
    } else {
        TiltMode::Down
    }
}

fn decode_axis(rdr: &mut CcReader, mess: &[u8]) -> bool {
    let number = mess[7];
    let speed = decode_value(mess);
    match number {
        AXIS_PAN => {
            let mode = decode_pan_mode(speed);
            rdr.packet.set_pan(Some(mode), remap_speed(speed));
        }
        AXIS_TILT => {
            let mode = decode_tilt_mode(speed);
            rdr.packet.set_tilt(Some(mode), remap_speed(speed));
        }
        AXIS_ZOOM => {
            if speed < 0 {
                rdr.packet.set_zoom(Some(ZoomMode::Out));
            } else if speed > 0 {
                rdr.packet.set_zoom(Some(ZoomMode::In));
            } else {
                rdr.packet.set_zoom(None);
            }
        }
        _ => (),
    }
    // motion cancels a pending preset store
    rdr.preset_armed = None;
    rdr.packet.set_preset(None, 0);
    true
}

fn decode_button(rdr: &mut CcReader, mess: &[u8]) -> bool {
    let number = mess[7];
    let pressed = decode_value(mess) != 0;
    match number {
        BUTTON_FOCUS_NEAR => {
            let fm = if pressed { Some(FocusMode::Near) } else { None };
            rdr.packet.set_focus(fm);
            return true;
        }
        BUTTON_FOCUS_FAR => {
            let fm = if pressed { Some(FocusMode::Far) } else { None };
            rdr.packet.set_focus(fm);
            return true;
        }
        BUTTON_IRIS_CLOSE => {
            let im = if pressed { Some(IrisMode::Close) } else { None };
            rdr.packet.set_iris(im);
            return true;
        }
        BUTTON_IRIS_OPEN => {
            let im = if pressed { Some(IrisMode::Open) } else { None };
            rdr.packet.set_iris(im);
            return true;
        }
        BUTTON_WIPER => {
            let wm = if pressed { Some(WiperCommand::On) } else { None };
            rdr.packet.set_wiper(wm);
            return true;
        }
        BUTTON_CAMERA => {
            let cc = if pressed { Some(CameraCommand::On) } else { None };
            rdr.packet.set_camera(cc);
            return true;
        }
        BUTTON_PRESET_1..=BUTTON_PRESET_4 => {
            let p_num = (number - BUTTON_PRESET_1 + 1) as i32;
            if pressed {
                rdr.packet.set_preset(Some(PresetMode::Recall), p_num);
                rdr.preset_armed = Some(p_num);
                return true;
            } else if rdr.preset_armed == Some(p_num) {
                // released without motion since the press: store instead
                rdr.packet.set_preset(Some(PresetMode::Store), p_num);
                rdr.preset_armed = None;
                return true;
            }
            rdr.preset_armed = None;
        }
        BUTTON_PREVIOUS => {
            if pressed {
                rdr.previous_camera();
            }
        }
        BUTTON_NEXT => {
            if pressed {
                rdr.next_camera();
            }
        }
        _ => (),
    }
    rdr.packet.set_preset(None, 0);
    false
}

fn decode_event(rdr: &mut CcReader, mess: &[u8]) -> bool {
    let ev_type = mess[6];
    if ev_type & EVENT_AXIS != 0 {
        decode_axis(rdr, mess)
    } else if ev_type & EVENT_BUTTON != 0 && ev_type & EVENT_INITIAL == 0 {
        decode_button(rdr, mess)
    } else {
        false
    }
}

pub fn do_read(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) {
    let mut count = 0;
    while rxbuf.available() >= EVENT_OCTETS {
        let mut mess = [0u8; EVENT_OCTETS];
        mess.copy_from_slice(&rxbuf.output()[..EVENT_OCTETS]);
        if decode_event(rdr, &mess) {
            count += 1;
        }
        rxbuf.consume(EVENT_OCTETS);
    }
    // joystick state is sticky from event to event, so the packet is not
    // cleared; presets never stick past one dispatch
    if count > 0 {
        rdr.process_packet_no_clear(out);
    }
    rdr.packet.set_preset(None, 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis_event(number: u8, value: i16) -> [u8; EVENT_OCTETS] {
        let v = value.to_ne_bytes();
        [0, 0, 0, 0, v[0], v[1], EVENT_AXIS, number]
    }

    fn button_event(number: u8, value: i16) -> [u8; EVENT_OCTETS] {
        let v = value.to_ne_bytes();
        [0, 0, 0, 0, v[0], v[1], EVENT_BUTTON, number]
    }

    fn feed(rdr: &mut CcReader, events: &[[u8; EVENT_OCTETS]]) -> Vec<CcPacket> {
        let mut rxbuf = Buffer::new(256);
        for ev in events {
            rxbuf.append(EVENT_OCTETS).unwrap().copy_from_slice(ev);
        }
        let mut out = Vec::new();
        rdr.do_read(&mut rxbuf, &mut out);
        out
    }

    fn joystick_reader() -> CcReader {
        let mut rdr = CcReader::new("js", "joystick").unwrap();
        rdr.packet.set_receiver(1);
        rdr
    }

    #[test]
    fn axis_events_map_to_pan_tilt_zoom() {
        let mut rdr = joystick_reader();
        let pkts = feed(
            &mut rdr,
            &[
                axis_event(AXIS_PAN, 32767),
                axis_event(AXIS_TILT, -16384),
                axis_event(AXIS_ZOOM, 1),
            ],
        );
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].pan_mode(), Some(PanMode::Right));
        assert_eq!(pkts[0].pan_speed(), SPEED_MAX);
        assert_eq!(pkts[0].tilt_mode(), Some(TiltMode::Up));
        assert_eq!(pkts[0].zoom(), Some(ZoomMode::In));
    }

    #[test]
    fn sticky_state_and_stop() {
        let mut rdr = joystick_reader();
        let pkts = feed(&mut rdr, &[axis_event(AXIS_PAN, 8192)]);
        assert!(pkts[0].pan_speed() > 0);
        // center the stick: speed zero but mode stays
        let pkts = feed(&mut rdr, &[axis_event(AXIS_PAN, 0)]);
        assert_eq!(pkts[0].pan_speed(), 0);
        assert_eq!(pkts[0].pan_mode(), Some(PanMode::Left));
        assert!(pkts[0].is_stop());
    }

    #[test]
    fn preset_press_then_release_stores() {
        let mut rdr = joystick_reader();
        let pkts = feed(&mut rdr, &[button_event(6, 1)]);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].preset_mode(), Some(PresetMode::Recall));
        assert_eq!(pkts[0].preset_number(), 1);
        let pkts = feed(&mut rdr, &[button_event(6, 0)]);
        assert_eq!(pkts.len(), 1);
        assert_eq!(pkts[0].preset_mode(), Some(PresetMode::Store));
        assert_eq!(pkts[0].preset_number(), 1);
    }

    #[test]
    fn motion_between_press_and_release_suppresses_store() {
        let mut rdr = joystick_reader();
        feed(&mut rdr, &[button_event(7, 1)]);
        feed(&mut rdr, &[axis_event(AXIS_PAN, 1000)]);
        let pkts = feed(&mut rdr, &[button_event(7, 0)]);
        assert!(pkts.is_empty());
    }

    #[test]
    fn initial_button_events_are_ignored() {
        let mut rdr = joystick_reader();
        let mut ev = button_event(4, 1);
        ev[6] |= EVENT_INITIAL;
        let pkts = feed(&mut rdr, &[ev]);
        assert!(pkts.is_empty());
    }

    #[test]
    fn camera_stepping_buttons() {
        let mut rdr = joystick_reader();
        feed(&mut rdr, &[button_event(BUTTON_NEXT, 1)]);
        assert_eq!(rdr.packet.receiver(), 2);
        feed(&mut rdr, &[button_event(BUTTON_NEXT, 0)]);
        assert_eq!(rdr.packet.receiver(), 2);
        feed(&mut rdr, &[button_event(BUTTON_PREVIOUS, 1)]);
        assert_eq!(rdr.packet.receiver(), 1);
    }

    #[test]
    fn preset_does_not_stick_to_later_motion() {
        let mut rdr = joystick_reader();
        let pkts = feed(&mut rdr, &[button_event(6, 1)]);
        assert_eq!(pkts[0].preset_mode(), Some(PresetMode::Recall));
        let pkts = feed(&mut rdr, &[axis_event(AXIS_PAN, 4000)]);
        assert_eq!(pkts[0].preset_mode(), None);
        assert_eq!(pkts[0].preset_number(), 0);
    }
}
