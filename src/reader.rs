//! Camera control readers.
//!
//! One reader per inbound channel: it decodes framed bytes into the
//! current packet and forwards finished packets to its dispatch nodes.

use log::info;

use crate::buffer::Buffer;
use crate::error::Error;
use crate::packet::{CcPacket, RECEIVER_MAX};
use crate::protocol::{self, ReaderProtocol};
use crate::stats;

bitflags! {
    pub struct ReaderFlags: u32 {
        /// pan/tilt values skip over a joystick deadzone
        const PT_DEADZONE = 1 << 0;
    }
}

/// One outbound hop: a writer plus the receiver address window it serves.
#[derive(Debug, Copy, Clone)]
pub struct CcNode {
    pub writer: usize,
    pub range_first: i32,
    pub range_last: i32,
    pub shift: i32,
}

impl CcNode {
    /// Receiver address adjusted for this node; `None` drops the packet.
    pub fn adjusted_receiver(&self, receiver: i32) -> Option<i32> {
        if receiver < self.range_first || receiver > self.range_last {
            return None;
        }
        let receiver = receiver + self.shift;
        if receiver <= 0 {
            None
        } else {
            Some(receiver)
        }
    }
}

pub struct CcReader {
    pub protocol: ReaderProtocol,
    pub packet: CcPacket,
    /// time to hold commands (ms)
    pub timeout: u64,
    pub flags: ReaderFlags,
    pub nodes: Vec<CcNode>,
    pub name: String,
    /// preset button held with no motion since the press
    pub preset_armed: Option<i32>,
}

impl CcReader {
    pub fn new(name: &str, protocol: &str) -> Result<CcReader, Error> {
        let (protocol, flags) = ReaderProtocol::from_name(protocol)?;
        Ok(CcReader {
            protocol,
            packet: CcPacket::new(),
            timeout: protocol.timeout(),
            flags,
            nodes: Vec::new(),
            name: name.to_string(),
            preset_armed: None,
        })
    }

    /// Link a dispatch node; nodes run in the order they were added.
    pub fn add_node(&mut self, node: CcNode) {
        self.packet.set_receiver(node.range_first);
        self.nodes.push(node);
    }

    pub fn previous_camera(&mut self) {
        let receiver = self.packet.receiver();
        if receiver > 0 {
            self.packet.set_receiver(receiver - 1);
        }
    }

    pub fn next_camera(&mut self) {
        let receiver = self.packet.receiver();
        if receiver < RECEIVER_MAX {
            self.packet.set_receiver(receiver + 1);
        }
    }

    /// Decode whatever is framed in the receive buffer, pushing finished
    /// packets onto `out`. Partial frames are left in the buffer.
    pub fn do_read(&mut self, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) {
        protocol::do_read(self, rxbuf, out);
    }

    /// Stamp and forward the current packet, keeping its state for
    /// protocols where controller state is sticky.
    pub fn process_packet_no_clear(&mut self, out: &mut Vec<CcPacket>) {
        info!(
            target: "packet",
            "packet: IN {} rcv: {}{}",
            self.name,
            self.packet.receiver(),
            self.packet.describe()
        );
        stats::count(&self.packet, stats::Domain::In);
        self.packet.set_timeout(self.timeout);
        out.push(self.packet.clone());
    }

    /// Forward the current packet and reset it.
    pub fn process_packet(&mut self, out: &mut Vec<CcPacket>) {
        self.process_packet_no_clear(out);
        self.packet.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_range_and_shift() {
        let node = CcNode {
            writer: 0,
            range_first: 10,
            range_last: 20,
            shift: -9,
        };
        assert_eq!(node.adjusted_receiver(9), None);
        assert_eq!(node.adjusted_receiver(10), Some(1));
        assert_eq!(node.adjusted_receiver(20), Some(11));
        assert_eq!(node.adjusted_receiver(21), None);
    }

    #[test]
    fn shift_below_one_drops() {
        let node = CcNode {
            writer: 0,
            range_first: 1,
            range_last: 16,
            shift: -4,
        };
        assert_eq!(node.adjusted_receiver(4), None);
        assert_eq!(node.adjusted_receiver(5), Some(1));
    }

    #[test]
    fn camera_stepping_clamps() {
        let mut rdr = CcReader::new("js", "joystick").unwrap();
        rdr.packet.set_receiver(0);
        rdr.previous_camera();
        assert_eq!(rdr.packet.receiver(), 0);
        rdr.next_camera();
        assert_eq!(rdr.packet.receiver(), 1);
        rdr.packet.set_receiver(RECEIVER_MAX);
        rdr.next_camera();
        assert_eq!(rdr.packet.receiver(), RECEIVER_MAX);
    }

    #[test]
    fn unknown_protocol_is_an_error() {
        assert!(CcReader::new("x", "pelco_q").is_err());
    }

    #[test]
    fn deadzone_flag_from_protocol_name() {
        let rdr = CcReader::new("x", "pelco_p7").unwrap();
        assert!(rdr.flags.contains(ReaderFlags::PT_DEADZONE));
        let rdr = CcReader::new("x", "pelco_p").unwrap();
        assert!(!rdr.flags.contains(ReaderFlags::PT_DEADZONE));
    }
}
