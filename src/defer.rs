//! Deferred packets, ordered by the time they should be sent.
//!
//! Every writer owns one deferred slot per receiver address. A slot is in
//! the queue at most once; scheduling it again removes the old entry first.
//! After each mutation the interval timer is rearmed for the head entry.

use std::collections::BTreeSet;
use std::io;
use std::os::unix::io::RawFd;

use crate::clock::Timestamp;
use crate::packet::CcPacket;
use crate::timer::Timer;

/// One per (writer, receiver) pair, preallocated when the writer is made.
pub struct DeferredPkt {
    pub writer: usize,
    pub slot: usize,
    /// queued send time, `None` while not scheduled
    pub fire_at: Option<Timestamp>,
    /// when a packet last actually went out on this slot
    pub last_sent: Option<Timestamp>,
    /// copy of the packet to re-send
    pub packet: CcPacket,
    /// deferred re-send count for stop commands
    pub n_cnt: u32,
}

impl DeferredPkt {
    pub fn new(writer: usize, slot: usize) -> DeferredPkt {
        DeferredPkt {
            writer,
            slot,
            fire_at: None,
            last_sent: None,
            packet: CcPacket::new(),
            n_cnt: 0,
        }
    }
}

pub struct Defer {
    queue: BTreeSet<(Timestamp, usize, usize)>,
    timer: Option<Timer>,
}

impl Defer {
    pub fn new() -> Defer {
        Defer {
            queue: BTreeSet::new(),
            timer: None,
        }
    }

    pub fn set_timer(&mut self, timer: Timer) {
        self.timer = Some(timer);
    }

    pub fn fd(&self) -> Option<RawFd> {
        self.timer.as_ref().map(Timer::fd)
    }

    pub fn read_event(&mut self) -> io::Result<()> {
        match &mut self.timer {
            Some(timer) => timer.read_event(),
            None => Err(io::Error::from_raw_os_error(libc::EBADF)),
        }
    }

    /// Schedule `pkt` on the slot `ms` from now, or cancel the slot when
    /// `pkt` is `None`.
    pub fn defer_packet(&mut self, dpkt: &mut DeferredPkt, pkt: Option<&CcPacket>, ms: u64) {
        if let Some(tv) = dpkt.fire_at.take() {
            self.queue.remove(&(tv, dpkt.writer, dpkt.slot));
        }
        if let Some(pkt) = pkt {
            let tv = Timestamp::now().advanced(ms);
            dpkt.packet = pkt.clone();
            dpkt.fire_at = Some(tv);
            self.queue.insert((tv, dpkt.writer, dpkt.slot));
        }
        self.rearm();
    }

    /// Remove and return the head (writer, slot). The caller clears the
    /// slot's fire time and rearms once the packet is re-sent.
    pub fn take_head(&mut self) -> Option<(usize, usize)> {
        let head = self.queue.iter().next().copied()?;
        self.queue.remove(&head);
        Some((head.1, head.2))
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.iter().next().map(|head| head.0)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn rearm(&mut self) {
        let deadline = self.next_deadline();
        if let Some(timer) = &mut self.timer {
            let _ = match deadline {
                Some(tv) => timer.arm(tv.millis_until()),
                None => timer.disarm(),
            };
        }
    }
}

impl Default for Defer {
    fn default() -> Defer {
        Defer::new()
    }
}
