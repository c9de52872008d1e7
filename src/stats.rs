//! Camera control packet statistics.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::info;

use crate::packet::CcPacket;

#[derive(Debug, Copy, Clone)]
pub enum Domain {
    In = 0,
    Out = 1,
}

const PC_PAN: usize = 0;
const PC_TILT: usize = 1;
const PC_ZOOM: usize = 2;
const PC_FOCUS: usize = 3;
const PC_IRIS: usize = 4;
const PC_WIPER: usize = 5;
const PC_PRESET: usize = 6;
const PC_TOTAL: usize = 7;

const PC_NAME: [&str; 8] = [
    "pan", "tilt", "zoom", "focus", "iris", "wiper", "preset", "total",
];

static ENABLED: AtomicBool = AtomicBool::new(false);

static N_PKTS: [[AtomicU64; 2]; 8] = [
    [AtomicU64::new(0), AtomicU64::new(0)],
    [AtomicU64::new(0), AtomicU64::new(0)],
    [AtomicU64::new(0), AtomicU64::new(0)],
    [AtomicU64::new(0), AtomicU64::new(0)],
    [AtomicU64::new(0), AtomicU64::new(0)],
    [AtomicU64::new(0), AtomicU64::new(0)],
    [AtomicU64::new(0), AtomicU64::new(0)],
    [AtomicU64::new(0), AtomicU64::new(0)],
];

pub fn init(enabled: bool) {
    for row in N_PKTS.iter() {
        row[0].store(0, Ordering::Relaxed);
        row[1].store(0, Ordering::Relaxed);
    }
    ENABLED.store(enabled, Ordering::Relaxed);
}

fn bump(pc: usize, d: Domain) -> u64 {
    N_PKTS[pc][d as usize].fetch_add(1, Ordering::Relaxed) + 1
}

fn print_class(pc: usize) {
    let n_in = N_PKTS[pc][Domain::In as usize].load(Ordering::Relaxed);
    let n_out = N_PKTS[pc][Domain::Out as usize].load(Ordering::Relaxed);
    if n_in == 0 && n_out == 0 {
        return;
    }
    let t_in = N_PKTS[PC_TOTAL][Domain::In as usize].load(Ordering::Relaxed).max(1);
    let t_out = N_PKTS[PC_TOTAL][Domain::Out as usize].load(Ordering::Relaxed).max(1);
    let prc_in = 100.0 * n_in as f32 / t_in as f32;
    let prc_out = 100.0 * n_out as f32 / t_out as f32;
    info!(
        target: "stats",
        "{:>8}: {:>10}  {:>6.2}% {:>10}  {:>6.2}%",
        PC_NAME[pc], n_in, prc_in, n_out, prc_out
    );
}

fn display() {
    info!(
        target: "stats",
        "{:>8}  {:>10} {:>8} {:>10} {:>8}",
        "Class", "Count IN", "IN %", "Count OUT", "OUT %"
    );
    for pc in 0..=PC_TOTAL {
        print_class(pc);
    }
}

/// Count one packet; a statistics table goes to the log every 100 packets.
pub fn count(pkt: &CcPacket, d: Domain) {
    if !ENABLED.load(Ordering::Relaxed) {
        return;
    }
    if pkt.has_pan() {
        bump(PC_PAN, d);
    }
    if pkt.has_tilt() {
        bump(PC_TILT, d);
    }
    if pkt.zoom().is_some() {
        bump(PC_ZOOM, d);
    }
    if pkt.focus().is_some() {
        bump(PC_FOCUS, d);
    }
    if pkt.iris().is_some() {
        bump(PC_IRIS, d);
    }
    if pkt.wiper().is_some() {
        bump(PC_WIPER, d);
    }
    if pkt.preset_mode().is_some() {
        bump(PC_PRESET, d);
    }
    if bump(PC_TOTAL, d) % 100 == 0 {
        display();
    }
}
