//! Millisecond timestamps for packet pacing and command holds.

/// A point in time, in milliseconds of `CLOCK_MONOTONIC`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    #[inline(always)]
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        Timestamp(ts.tv_sec as i64 * 1000 + ts.tv_nsec as i64 / 1_000_000)
    }

    /// Construct from a raw millisecond count (test fixtures, mostly).
    pub fn from_millis(ms: i64) -> Self {
        Timestamp(ms)
    }

    /// This timestamp advanced by `ms` milliseconds.
    pub fn advanced(self, ms: u64) -> Self {
        Timestamp(self.0 + ms as i64)
    }

    /// Milliseconds from now until this timestamp, floored at zero.
    pub fn millis_until(self) -> u64 {
        let delta = self.0 - Self::now().0;
        if delta < 0 {
            0
        } else {
            delta as u64
        }
    }

    /// Milliseconds elapsed since this timestamp, floored at zero.
    pub fn millis_since(self) -> u64 {
        let delta = Self::now().0 - self.0;
        if delta < 0 {
            0
        } else {
            delta as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_and_order() {
        let t0 = Timestamp::from_millis(1000);
        let t1 = t0.advanced(80);
        assert!(t1 > t0);
        assert_eq!(t1, Timestamp::from_millis(1080));
    }

    #[test]
    fn until_is_floored() {
        let past = Timestamp::now();
        assert_eq!(past.millis_until(), 0);
        let future = Timestamp::now().advanced(60_000);
        assert!(future.millis_until() > 59_000);
        assert_eq!(future.millis_since(), 0);
    }
}
