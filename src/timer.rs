//! One-shot interval timer delivering events through a self-pipe.
//!
//! `SIGALRM` writes a single byte to a non-blocking pipe; the read end is
//! polled by the event loop. Writing one byte is the only thing the signal
//! handler does.

use std::io;
use std::os::unix::io::RawFd;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

static WRITE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn alarm_handler(_signo: libc::c_int) {
    let fd = WRITE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = [0u8; 1];
        unsafe { libc::write(fd, byte.as_ptr() as *const libc::c_void, 1) };
    }
}

pub struct Timer {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl Timer {
    pub fn new() -> io::Result<Timer> {
        let mut fds = [0 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        let timer = Timer {
            read_fd: fds[0],
            write_fd: fds[1],
        };
        set_nonblocking(timer.read_fd)?;
        set_nonblocking(timer.write_fd)?;
        install_handler()?;
        WRITE_FD.store(timer.write_fd, Ordering::Relaxed);
        Ok(timer)
    }

    pub fn fd(&self) -> RawFd {
        self.read_fd
    }

    /// Program a one-shot expiration `msec` milliseconds out. Zero is too
    /// late to arm, so the event byte is written directly.
    pub fn arm(&mut self, msec: u64) -> io::Result<()> {
        if msec == 0 {
            self.write_event()?;
        }
        set_itimer(msec)
    }

    pub fn disarm(&mut self) -> io::Result<()> {
        set_itimer(0)
    }

    /// Drain one event byte from the pipe.
    pub fn read_event(&mut self) -> io::Result<()> {
        let mut byte = [0u8; 1];
        loop {
            let rc = unsafe {
                libc::read(self.read_fd, byte.as_mut_ptr() as *mut libc::c_void, 1)
            };
            if rc >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn write_event(&mut self) -> io::Result<()> {
        let byte = [0u8; 1];
        loop {
            let rc = unsafe {
                libc::write(self.write_fd, byte.as_ptr() as *const libc::c_void, 1)
            };
            if rc >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let _ = self.disarm();
        let _ = WRITE_FD.compare_exchange(
            self.write_fd,
            -1,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
        unsafe {
            libc::close(self.write_fd);
            libc::close(self.read_fd);
        }
    }
}

fn install_handler() -> io::Result<()> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = alarm_handler as libc::sighandler_t;
        sa.sa_flags = libc::SA_RESTART;
        if libc::sigfillset(&mut sa.sa_mask) < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::sigaction(libc::SIGALRM, &sa, ptr::null_mut()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn set_itimer(msec: u64) -> io::Result<()> {
    let value = libc::itimerval {
        it_interval: libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        },
        it_value: libc::timeval {
            tv_sec: (msec / 1000) as libc::time_t,
            tv_usec: (msec % 1000 * 1000) as libc::suseconds_t,
        },
    };
    if unsafe { libc::setitimer(libc::ITIMER_REAL, &value, ptr::null_mut()) } < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    if unsafe { libc::fcntl(fd, libc::F_SETFL, libc::O_NONBLOCK) } < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
