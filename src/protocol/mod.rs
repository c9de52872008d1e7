//! Camera control protocol codecs.
//!
//! A reader protocol decodes framed bytes from a receive buffer into the
//! reader's current packet; a writer protocol encodes neutral packets onto
//! a channel's transmit buffer. Both sides dispatch over small closed
//! enums, and per-protocol pacing constants live with each codec.

pub mod axis;
pub mod infinova;
pub mod joystick;
pub mod manchester;
pub mod pelco_d;
pub mod pelco_p;
pub mod vicon;

use crate::buffer::Buffer;
use crate::channel::Channel;
use crate::error::Error;
use crate::packet::CcPacket;
use crate::reader::{CcReader, ReaderFlags};
use crate::writer::CcWriter;

/// Outcome of decoding one framed message.
#[derive(Debug, PartialEq)]
pub(crate) enum Decode {
    /// more buffered messages may be decoded
    More,
    /// buffered message decoding is done
    Done,
}

pub(crate) fn bit_is_set(mess: &[u8], bit: usize) -> bool {
    mess[bit / 8] & (1 << (bit % 8)) != 0
}

pub(crate) fn bit_set(mess: &mut [u8], bit: usize) {
    mess[bit / 8] |= 1 << (bit % 8);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReaderProtocol {
    Joystick,
    Manchester,
    PelcoD,
    PelcoP,
    Vicon,
}

impl ReaderProtocol {
    pub fn from_name(name: &str) -> Result<(ReaderProtocol, ReaderFlags), Error> {
        match name.to_ascii_lowercase().as_str() {
            "joystick" => Ok((ReaderProtocol::Joystick, ReaderFlags::empty())),
            "manchester" => Ok((ReaderProtocol::Manchester, ReaderFlags::empty())),
            "pelco_d" => Ok((ReaderProtocol::PelcoD, ReaderFlags::empty())),
            "pelco_p" => Ok((ReaderProtocol::PelcoP, ReaderFlags::empty())),
            "pelco_p7" => Ok((ReaderProtocol::PelcoP, ReaderFlags::PT_DEADZONE)),
            "vicon" => Ok((ReaderProtocol::Vicon, ReaderFlags::empty())),
            _ => Err(Error::UnknownProtocol(name.to_string())),
        }
    }

    /// How long a decoded command stays valid without a refresh (ms).
    pub fn timeout(self) -> u64 {
        match self {
            ReaderProtocol::Joystick => joystick::TIMEOUT,
            ReaderProtocol::Manchester => manchester::TIMEOUT,
            ReaderProtocol::PelcoD => pelco_d::TIMEOUT,
            ReaderProtocol::PelcoP => pelco_p::TIMEOUT,
            ReaderProtocol::Vicon => vicon::TIMEOUT,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriterProtocol {
    Manchester,
    PelcoD,
    PelcoP,
    Vicon,
    Axis,
    InfinovaD,
}

impl WriterProtocol {
    pub fn from_name(name: &str) -> Result<WriterProtocol, Error> {
        match name.to_ascii_lowercase().as_str() {
            "manchester" => Ok(WriterProtocol::Manchester),
            "pelco_d" => Ok(WriterProtocol::PelcoD),
            "pelco_p" => Ok(WriterProtocol::PelcoP),
            "vicon" => Ok(WriterProtocol::Vicon),
            "axis" => Ok(WriterProtocol::Axis),
            "infinova_d" => Ok(WriterProtocol::InfinovaD),
            _ => Err(Error::UnknownProtocol(name.to_string())),
        }
    }

    /// Minimum gap between frames on one writer (ms).
    pub fn gaptime(self) -> u64 {
        match self {
            WriterProtocol::Manchester => manchester::GAPTIME,
            WriterProtocol::PelcoD => pelco_d::GAPTIME,
            WriterProtocol::PelcoP => pelco_p::GAPTIME,
            WriterProtocol::Vicon => vicon::GAPTIME,
            WriterProtocol::Axis => axis::GAPTIME,
            WriterProtocol::InfinovaD => infinova::GAPTIME,
        }
    }

    /// How long an encoded command is held before a refresh re-send (ms).
    pub fn timeout(self) -> u64 {
        match self {
            WriterProtocol::Manchester => manchester::TIMEOUT,
            WriterProtocol::PelcoD => pelco_d::TIMEOUT,
            WriterProtocol::PelcoP => pelco_p::TIMEOUT,
            WriterProtocol::Vicon => vicon::TIMEOUT,
            WriterProtocol::Axis => axis::TIMEOUT,
            WriterProtocol::InfinovaD => infinova::TIMEOUT,
        }
    }

    /// Highest receiver address the protocol can express.
    pub fn max_address(self) -> i32 {
        match self {
            WriterProtocol::Manchester => manchester::MAX_ADDRESS,
            WriterProtocol::PelcoD => pelco_d::MAX_ADDRESS,
            WriterProtocol::PelcoP => pelco_p::MAX_ADDRESS,
            WriterProtocol::Vicon => vicon::MAX_ADDRESS,
            WriterProtocol::Axis => axis::MAX_ADDRESS,
            WriterProtocol::InfinovaD => infinova::MAX_ADDRESS,
        }
    }

    /// The device answers every request; the channel must hold further
    /// writes until response bytes arrive.
    pub fn resp_required(self) -> bool {
        matches!(self, WriterProtocol::Axis)
    }
}

pub(crate) fn do_read(rdr: &mut CcReader, rxbuf: &mut Buffer, out: &mut Vec<CcPacket>) {
    match rdr.protocol {
        ReaderProtocol::Joystick => joystick::do_read(rdr, rxbuf, out),
        ReaderProtocol::Manchester => manchester::do_read(rdr, rxbuf, out),
        ReaderProtocol::PelcoD => pelco_d::do_read(rdr, rxbuf, out),
        ReaderProtocol::PelcoP => pelco_p::do_read(rdr, rxbuf, out),
        ReaderProtocol::Vicon => vicon::do_read(rdr, rxbuf, out),
    }
}

pub(crate) fn do_write(wtr: &CcWriter, chn: &mut Channel, pkt: &mut CcPacket) -> u32 {
    match wtr.protocol {
        WriterProtocol::Manchester => manchester::do_write(chn, pkt),
        WriterProtocol::PelcoD => pelco_d::do_write(chn, pkt),
        WriterProtocol::PelcoP => pelco_p::do_write(chn, pkt),
        WriterProtocol::Vicon => vicon::do_write(chn, pkt),
        WriterProtocol::Axis => axis::do_write(wtr.auth.as_deref(), chn, pkt),
        WriterProtocol::InfinovaD => infinova::do_write(chn, pkt),
    }
}
