//! Camera control writers.
//!
//! One writer per outbound channel and protocol. Writers pace frames with
//! a per-protocol gap time, re-send stop commands once for reliability and
//! refresh held commands through the deferred queue.

use log::info;

use crate::channel::Channel;
use crate::clock::Timestamp;
use crate::defer::{Defer, DeferredPkt};
use crate::packet::CcPacket;
use crate::protocol::{self, WriterProtocol};
use crate::stats;

pub struct CcWriter {
    pub protocol: WriterProtocol,
    /// index of the channel to write
    pub chn: usize,
    /// one deferred slot per receiver address
    pub deferred: Vec<DeferredPkt>,
    /// minimum gap between frames (ms)
    pub gaptime: u64,
    /// time a command is held (ms)
    pub timeout: u64,
    /// HTTP Basic credential
    pub auth: Option<String>,
}

impl CcWriter {
    pub fn new(index: usize, chn: usize, protocol: WriterProtocol, auth: Option<String>) -> CcWriter {
        let n_rcv = protocol.max_address() as usize;
        CcWriter {
            protocol,
            chn,
            deferred: (0..n_rcv).map(|slot| DeferredPkt::new(index, slot)).collect(),
            gaptime: protocol.gaptime(),
            timeout: protocol.timeout(),
            auth,
        }
    }

    pub fn n_rcv(&self) -> usize {
        self.deferred.len()
    }
}

/// Reserve zero-filled space on the writer's transmit buffer.
pub fn append<'a>(chn: &'a mut Channel, n_bytes: usize) -> Option<&'a mut [u8]> {
    if chn.txbuf.space() < n_bytes {
        info!("writer ({}): output buffer full", chn.name);
        return None;
    }
    let mess = chn.txbuf.append(n_bytes)?;
    for b in mess.iter_mut() {
        *b = 0;
    }
    Some(mess)
}

fn too_soon(wtr: &CcWriter, slot: usize) -> bool {
    match wtr.deferred[slot].last_sent {
        Some(sent) => sent.millis_since() < wtr.gaptime,
        None => false,
    }
}

/// Decide the slot's next deferred action after a successful encode: stop
/// commands get one redundant re-send, held commands get a refresh, and
/// anything else cancels the slot.
fn check_deferred(wtr: &mut CcWriter, slot: usize, defer: &mut Defer, pkt: &CcPacket) {
    let gaptime = wtr.gaptime;
    let timeout = wtr.timeout;
    let dpkt = &mut wtr.deferred[slot];
    dpkt.last_sent = Some(Timestamp::now());
    if pkt.is_stop() {
        if dpkt.n_cnt < 1 {
            defer.defer_packet(dpkt, Some(pkt), gaptime);
            dpkt.n_cnt += 1;
            return;
        }
        dpkt.n_cnt = 0;
    } else if pkt.is_expired(timeout) {
        defer.defer_packet(dpkt, Some(pkt), timeout);
        return;
    }
    defer.defer_packet(dpkt, None, 0);
}

/// Process one packet for the writer: pace, encode, schedule re-sends.
pub fn do_write(wtr: &mut CcWriter, chn: &mut Channel, defer: &mut Defer, pkt: &mut CcPacket) -> u32 {
    let receiver = pkt.receiver();
    if receiver < 1 || receiver as usize > wtr.n_rcv() {
        return 0;
    }
    let slot = (receiver - 1) as usize;
    if too_soon(wtr, slot) {
        let gaptime = wtr.gaptime;
        defer.defer_packet(&mut wtr.deferred[slot], Some(pkt), gaptime);
        return 0;
    }
    let count = protocol::do_write(wtr, chn, pkt);
    if count > 0 {
        stats::count(pkt, stats::Domain::Out);
        check_deferred(wtr, slot, defer, pkt);
        info!(
            target: "packet",
            "packet: OUT {} rcv: {}{}",
            chn.name,
            pkt.receiver(),
            pkt.describe()
        );
    }
    count
}
