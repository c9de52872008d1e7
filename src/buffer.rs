//! Bounded I/O buffer with input and output cursors.
//!
//! Bytes are appended at the input cursor and consumed from the output
//! cursor; when the two meet, both snap back to the base of the buffer.

use std::ffi::c_void;
use std::io;
use std::os::unix::io::RawFd;

pub struct Buffer {
    data: Vec<u8>,
    pout: usize,
    pin: usize,
}

impl Buffer {
    pub fn new(n_bytes: usize) -> Buffer {
        Buffer {
            data: vec![0; n_bytes],
            pout: 0,
            pin: 0,
        }
    }

    /// Number of bytes available to consume.
    #[inline]
    pub fn available(&self) -> usize {
        self.pin - self.pout
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Space remaining past the input cursor.
    #[inline]
    pub fn space(&self) -> usize {
        self.data.len() - self.pin
    }

    pub fn clear(&mut self) {
        self.pout = 0;
        self.pin = 0;
    }

    /// Slide pending bytes back to the base to free up more space.
    fn compact(&mut self) {
        let a = self.available();
        self.data.copy_within(self.pout..self.pin, 0);
        self.pout = 0;
        self.pin = a;
    }

    /// Read from a file descriptor into the buffer. Returns the number of
    /// bytes read (zero at end of stream).
    pub fn read(&mut self, fd: RawFd) -> io::Result<usize> {
        if self.space() == 0 {
            self.compact();
            if self.space() == 0 {
                return Err(io::Error::from_raw_os_error(libc::ENOBUFS));
            }
        }
        let count = self.space();
        let n_bytes = loop {
            let rc = unsafe {
                libc::read(fd, self.data[self.pin..].as_mut_ptr() as *mut c_void, count)
            };
            if rc >= 0 {
                break rc as usize;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        };
        self.pin += n_bytes;
        Ok(n_bytes)
    }

    /// Write pending bytes to a file descriptor. Returns the number of
    /// bytes written.
    pub fn write(&mut self, fd: RawFd) -> io::Result<usize> {
        let count = self.available();
        if count == 0 {
            return Err(io::Error::from_raw_os_error(libc::ENOBUFS));
        }
        let n_bytes = loop {
            let rc = unsafe {
                libc::write(fd, self.data[self.pout..].as_ptr() as *const c_void, count)
            };
            if rc >= 0 {
                break rc as usize;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        };
        self.consume(n_bytes);
        Ok(n_bytes)
    }

    /// Reserve `n_bytes` at the input cursor, or `None` when the buffer is
    /// out of space.
    pub fn append(&mut self, n_bytes: usize) -> Option<&mut [u8]> {
        if self.space() < n_bytes {
            return None;
        }
        let pin = self.pin;
        self.pin += n_bytes;
        Some(&mut self.data[pin..pin + n_bytes])
    }

    /// Pending bytes, output cursor up to input cursor.
    #[inline]
    pub fn output(&self) -> &[u8] {
        &self.data[self.pout..self.pin]
    }

    /// Discard `n_bytes` from the output cursor.
    pub fn consume(&mut self, n_bytes: usize) {
        self.pout += n_bytes;
        debug_assert!(self.pout <= self.pin);
        if self.pout == self.pin {
            self.clear();
        }
    }
}

impl Default for Buffer {
    fn default() -> Buffer {
        Buffer::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_consume_reset() {
        let mut buf = Buffer::new(8);
        buf.append(3).unwrap().copy_from_slice(b"abc");
        assert_eq!(buf.available(), 3);
        assert_eq!(buf.output(), b"abc");
        buf.consume(2);
        assert_eq!(buf.output(), b"c");
        buf.consume(1);
        // cursors reset when drained
        assert_eq!(buf.available(), 0);
        assert_eq!(buf.space(), 8);
    }

    #[test]
    fn append_over_capacity_fails() {
        let mut buf = Buffer::new(4);
        assert!(buf.append(3).is_some());
        assert!(buf.append(2).is_none());
        assert!(buf.append(1).is_some());
    }

    #[test]
    fn read_compacts_when_full() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let mut buf = Buffer::new(4);
        unsafe {
            libc::write(fds[1], b"abcd".as_ptr() as *const c_void, 4);
        }
        assert_eq!(buf.read(fds[0]).unwrap(), 4);
        buf.consume(2);
        unsafe {
            libc::write(fds[1], b"ef".as_ptr() as *const c_void, 2);
        }
        // space is zero until the pending bytes slide back to the base
        assert_eq!(buf.space(), 0);
        assert_eq!(buf.read(fds[0]).unwrap(), 2);
        assert_eq!(buf.output(), b"cdef");
        let err = buf.read(fds[0]).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOBUFS));
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }

    #[test]
    fn write_drains_pending() {
        let mut fds = [0; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let mut buf = Buffer::new(8);
        buf.append(5).unwrap().copy_from_slice(b"hello");
        assert_eq!(buf.write(fds[1]).unwrap(), 5);
        assert!(buf.is_empty());
        assert!(buf.write(fds[1]).is_err());
        let mut out = [0u8; 8];
        let n = unsafe { libc::read(fds[0], out.as_mut_ptr() as *mut c_void, 8) };
        assert_eq!(&out[..n as usize], b"hello");
        unsafe {
            libc::close(fds[0]);
            libc::close(fds[1]);
        }
    }
}
