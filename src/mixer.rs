//! The reader→writer switchyard.
//!
//! Owns every channel, reader, writer and the deferred queue, and moves
//! packets between them: bytes are decoded off a channel, fanned out
//! through the reader's dispatch nodes with the receiver address filtered
//! and shifted per node, and encoded onto the writers' channels.

use std::io;
use std::mem;

use crate::channel::Channel;
use crate::defer::Defer;
use crate::packet::CcPacket;
use crate::reader::CcReader;
use crate::writer::{self, CcWriter};

pub struct Mixer {
    pub channels: Vec<Channel>,
    pub readers: Vec<CcReader>,
    pub writers: Vec<CcWriter>,
    pub defer: Defer,
}

impl Mixer {
    pub fn new() -> Mixer {
        Mixer {
            channels: Vec::new(),
            readers: Vec::new(),
            writers: Vec::new(),
            defer: Defer::new(),
        }
    }

    /// Fan a packet out to every node on the reader whose address window
    /// contains its receiver. The receiver is restored afterwards.
    pub fn dispatch(&mut self, rdr: usize, pkt: &mut CcPacket) -> u32 {
        let receiver = pkt.receiver();
        let mut res = 0;
        for i in 0..self.readers[rdr].nodes.len() {
            let node = self.readers[rdr].nodes[i];
            if let Some(shifted) = node.adjusted_receiver(receiver) {
                pkt.set_receiver(shifted);
                res += self.writer_write(node.writer, pkt);
            }
        }
        pkt.set_receiver(receiver);
        res
    }

    pub fn writer_write(&mut self, w: usize, pkt: &mut CcPacket) -> u32 {
        let chn = self.writers[w].chn;
        writer::do_write(
            &mut self.writers[w],
            &mut self.channels[chn],
            &mut self.defer,
            pkt,
        )
    }

    /// Service a readable channel: accept on listeners, otherwise fill the
    /// receive buffer and run the decoder. `Ok(0)` means the channel
    /// should be closed.
    pub fn read_channel(&mut self, idx: usize) -> io::Result<usize> {
        if self.channels[idx].is_listening() {
            self.channels[idx].accept()?;
            // pretend one byte was read; zero would close the channel
            return Ok(1);
        }
        let n_bytes = self.channels[idx].fill_rx()?;
        if n_bytes == 0 {
            return Ok(0);
        }
        match self.channels[idx].reader {
            Some(rdr) => {
                let mut rxbuf = mem::take(&mut self.channels[idx].rxbuf);
                let mut pkts = Vec::new();
                self.readers[rdr].do_read(&mut rxbuf, &mut pkts);
                self.channels[idx].rxbuf = rxbuf;
                for mut pkt in pkts {
                    self.dispatch(rdr, &mut pkt);
                }
                Ok(n_bytes)
            }
            None => {
                // bytes are arriving with nobody to decode them
                self.channels[idx].rxbuf.clear();
                Ok(0)
            }
        }
    }

    /// Fire the head of the deferred queue: re-encode the held packet
    /// through its writer.
    pub fn fire_deferred(&mut self) {
        if self.defer.read_event().is_err() {
            return;
        }
        if let Some((w, slot)) = self.defer.take_head() {
            self.writers[w].deferred[slot].fire_at = None;
            let mut pkt = self.writers[w].deferred[slot].packet.clone();
            self.writer_write(w, &mut pkt);
        }
        self.defer.rearm();
    }
}

impl Default for Mixer {
    fn default() -> Mixer {
        Mixer::new()
    }
}
