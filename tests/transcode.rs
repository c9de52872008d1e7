//! Cross-protocol transcoding scenarios, wired through the dispatch path.

use protozoa::buffer::Buffer;
use protozoa::channel::{Channel, ChannelFlags};
use protozoa::mixer::Mixer;
use protozoa::packet::{CcPacket, MenuCommand, PanMode, ZoomMode};
use protozoa::protocol::WriterProtocol;
use protozoa::reader::{CcNode, CcReader};
use protozoa::writer::CcWriter;

fn channel(name: &str) -> Channel {
    Channel::new(name, "", ChannelFlags::empty())
}

/// One reader fanned out to the given writer protocols, full address
/// range, no shift.
fn build_mixer(reader_proto: &str, writer_protos: &[WriterProtocol]) -> Mixer {
    let mut mixer = Mixer::new();
    mixer.channels.push(channel("in"));
    let mut rdr = CcReader::new("in", reader_proto).unwrap();
    for (i, proto) in writer_protos.iter().enumerate() {
        let chn = mixer.channels.len();
        mixer.channels.push(channel(&format!("out{}", i)));
        mixer.writers.push(CcWriter::new(i, chn, *proto, None));
        rdr.add_node(CcNode {
            writer: i,
            range_first: 1,
            range_last: 1024,
            shift: 0,
        });
    }
    mixer.readers.push(rdr);
    mixer.channels[0].reader = Some(0);
    mixer
}

fn decode_and_dispatch(mixer: &mut Mixer, bytes: &[u8]) {
    let mut rxbuf = Buffer::new(256);
    rxbuf.append(bytes.len()).unwrap().copy_from_slice(bytes);
    let mut pkts = Vec::new();
    mixer.readers[0].do_read(&mut rxbuf, &mut pkts);
    for mut pkt in pkts {
        mixer.dispatch(0, &mut pkt);
    }
}

#[test]
fn pelco_d_pan_right_full_becomes_manchester_aux_escape() {
    let mut mixer = build_mixer("pelco_d", &[WriterProtocol::Manchester]);
    // address 1, pan right, raw speed 0x3f
    decode_and_dispatch(&mut mixer, &[0xff, 0x01, 0x00, 0x02, 0x3f, 0x00, 0x42]);
    // one 3-byte frame: full-right rides the AUX escape, not a pan/tilt
    // command
    assert_eq!(mixer.channels[1].txbuf.output(), &[0x80, 0x12, 0x00]);
}

#[test]
fn pelco_d_moderate_pan_stays_a_pan_command() {
    let mut mixer = build_mixer("pelco_d", &[WriterProtocol::Manchester]);
    // raw speed 0x10 -> 512 -> manchester bucket 1
    decode_and_dispatch(&mut mixer, &[0xff, 0x01, 0x00, 0x02, 0x10, 0x00, 0x13]);
    let mess = mixer.channels[1].txbuf.output();
    assert_eq!(mess.len(), 3);
    assert_eq!(mess[2] & 0x02, 0x02);
    // command bits 11 (pan right), speed index 1
    assert_eq!(mess[1], (0b11 << 4) | (1 << 1));
}

#[test]
fn menu_open_rewrites_per_writer_protocol() {
    let mut mixer = build_mixer("joystick", &[WriterProtocol::PelcoD, WriterProtocol::Vicon]);
    let mut pkt = CcPacket::new();
    pkt.set_receiver(5);
    pkt.set_menu(Some(MenuCommand::Open));
    assert_eq!(mixer.dispatch(0, &mut pkt), 2);

    // Pelco-D: store preset 95, checksum intact
    let mess = mixer.channels[1].txbuf.output();
    assert_eq!(mess.len(), 7);
    assert_eq!(mess[0], 0xff);
    assert_eq!(mess[1], 5);
    assert_eq!(mess[5], 95);
    let sum: u32 = mess[1..6].iter().map(|b| u32::from(*b)).sum();
    assert_eq!((sum % 256) as u8, mess[6]);

    // Vicon: extended store preset 94
    let mess = mixer.channels[2].txbuf.output();
    assert_eq!(mess.len(), 10);
    assert_eq!(mess[7] & 0x7f, 94);
}

#[test]
fn address_shift_lands_on_the_wire() {
    let mut mixer = Mixer::new();
    mixer.channels.push(channel("in"));
    mixer.channels.push(channel("out"));
    let mut rdr = CcReader::new("in", "pelco_d").unwrap();
    rdr.add_node(CcNode {
        writer: 0,
        range_first: 1,
        range_last: 16,
        shift: 9,
    });
    mixer.readers.push(rdr);
    mixer.channels[0].reader = Some(0);
    mixer
        .writers
        .push(CcWriter::new(0, 1, WriterProtocol::PelcoP, None));
    decode_and_dispatch(&mut mixer, &[0xff, 0x01, 0x00, 0x02, 0x20, 0x00, 0x23]);
    let mess = mixer.channels[1].txbuf.output();
    // receiver 1 shifted to 10; Pelco-P addresses are zero-based
    assert_eq!(mess[0], 0xa0);
    assert_eq!(mess[1], 9);
}

#[test]
fn joystick_preset_press_release_through_dispatch() {
    let mut mixer = build_mixer("joystick", &[WriterProtocol::PelcoD]);
    mixer.readers[0].packet.set_receiver(1);

    let press = [0u8, 0, 0, 0, 1, 0, 0x01, 6];
    let release = [0u8, 0, 0, 0, 0, 0, 0x01, 6];

    decode_and_dispatch(&mut mixer, &press);
    let first = mixer.channels[1].txbuf.output().to_vec();
    // extended recall preset 1
    assert_eq!(first[3] >> 1 & 0x1f, 3);
    assert_eq!(first[5], 1);

    mixer.channels[1].txbuf.clear();
    // writer pacing would defer the release frame; pretend time passed
    mixer.writers[0].deferred[0].last_sent = None;
    decode_and_dispatch(&mut mixer, &release);
    let second = mixer.channels[1].txbuf.output().to_vec();
    // extended store preset 1
    assert_eq!(second[3] >> 1 & 0x1f, 1);
    assert_eq!(second[5], 1);
}

#[test]
fn axis_writer_sees_only_its_single_address() {
    let mut mixer = build_mixer("joystick", &[WriterProtocol::Axis]);
    let mut pkt = CcPacket::new();
    pkt.set_receiver(2);
    pkt.set_zoom(Some(ZoomMode::In));
    // axis serves exactly one receiver address
    assert_eq!(mixer.dispatch(0, &mut pkt), 0);
    pkt.set_receiver(1);
    assert_eq!(mixer.dispatch(0, &mut pkt), 1);
    let req = String::from_utf8(mixer.channels[1].txbuf.output().to_vec()).unwrap();
    assert!(req.starts_with("GET /axis-cgi/com/ptz.cgi?"));
    assert!(req.contains("continuouszoommove=100"));
}

#[test]
fn pan_motion_keeps_exactly_one_refresh_scheduled() {
    let mut mixer = build_mixer("pelco_d", &[WriterProtocol::Manchester]);
    decode_and_dispatch(&mut mixer, &[0xff, 0x01, 0x00, 0x02, 0x10, 0x00, 0x13]);
    // held command scheduled for a refresh at the writer's timeout
    assert!(mixer.defer.next_deadline().is_some());
    let deadline = mixer.defer.next_deadline().unwrap();
    // the deferred copy carries the decoded command
    let held = &mixer.writers[0].deferred[0].packet;
    assert_eq!(held.pan_mode(), Some(PanMode::Right));
    assert!(deadline.millis_until() <= protozoa::protocol::manchester::TIMEOUT);
}
