//! Readiness event loop.
//!
//! One `poll(2)` over every channel fd, the deferred-packet timer pipe and
//! an inotify watch on the configuration file. Closed channels park on a
//! `/dev/null` placeholder fd so the pollfd slots stay stable.

use std::ffi::CString;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use log::debug;

use crate::config;
use crate::error::Error;
use crate::mixer::Mixer;

pub struct Poller {
    pub mixer: Mixer,
    pollfds: Vec<libc::pollfd>,
    fd_null: RawFd,
    fd_inotify: RawFd,
    wd_inotify: libc::c_int,
}

/// What one poll round decided.
enum Round {
    Continue,
    Reload,
}

impl Poller {
    pub fn new(mixer: Mixer, config_path: &str) -> Result<Poller, Error> {
        let n_channels = mixer.channels.len();
        let fd_null = unsafe {
            libc::open(b"/dev/null\0".as_ptr() as *const libc::c_char, libc::O_RDONLY)
        };
        if fd_null < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let fd_inotify = unsafe { libc::inotify_init() };
        if fd_inotify < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd_null) };
            return Err(err.into());
        }
        let path = CString::new(config_path)
            .map_err(|_| Error::IO(io::Error::from_raw_os_error(libc::EINVAL)))?;
        let wd_inotify = unsafe {
            libc::inotify_add_watch(
                fd_inotify,
                path.as_ptr(),
                libc::IN_CLOSE_WRITE | libc::IN_MOVE_SELF,
            )
        };
        if wd_inotify < 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd_inotify);
                libc::close(fd_null);
            }
            return Err(err.into());
        }
        let pollfds = vec![
            libc::pollfd {
                fd: fd_null,
                events: 0,
                revents: 0,
            };
            n_channels + 2
        ];
        Ok(Poller {
            mixer,
            pollfds,
            fd_null,
            fd_inotify,
            wd_inotify,
        })
    }

    fn n_channels(&self) -> usize {
        self.pollfds.len() - 2
    }

    /// Register poll events for every channel, opening the ones which are
    /// waiting to work.
    fn register_events(&mut self) {
        for idx in 0..self.n_channels() {
            let chn = &mut self.mixer.channels[idx];
            if !chn.is_open() && chn.is_waiting() {
                let _ = chn.open();
            }
            let pfd = &mut self.pollfds[idx];
            pfd.revents = 0;
            match chn.fd() {
                Some(fd) => {
                    pfd.fd = fd;
                    pfd.events = libc::POLLHUP | libc::POLLERR;
                    if chn.needs_reading() {
                        pfd.events |= libc::POLLIN;
                    }
                    if chn.needs_writing() {
                        pfd.events |= libc::POLLOUT;
                    }
                }
                None => {
                    pfd.fd = self.fd_null;
                    pfd.events = 0;
                }
            }
        }
        let n = self.n_channels();
        self.pollfds[n] = libc::pollfd {
            fd: self.mixer.defer.fd().unwrap_or(self.fd_null),
            events: libc::POLLIN,
            revents: 0,
        };
        self.pollfds[n + 1] = libc::pollfd {
            fd: self.fd_inotify,
            events: libc::POLLIN,
            revents: 0,
        };
    }

    fn do_poll(&mut self) -> Result<(), Error> {
        loop {
            let rc = unsafe {
                libc::poll(self.pollfds.as_mut_ptr(), self.pollfds.len() as libc::nfds_t, -1)
            };
            if rc >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err.into());
            }
        }
    }

    fn debug_poll_events(&self, idx: usize) {
        let revents = self.pollfds[idx].revents;
        let chn = &self.mixer.channels[idx];
        for (bit, name) in [
            (libc::POLLHUP, "POLLHUP"),
            (libc::POLLERR, "POLLERR"),
            (libc::POLLIN, "POLLIN"),
            (libc::POLLOUT, "POLLOUT"),
        ]
        .iter()
        {
            if revents & bit != 0 {
                debug!("debug: {} {}:{}", name, chn.name, chn.service);
            }
        }
    }

    /// Handle the events polled for one channel.
    fn channel_events(&mut self, idx: usize) {
        self.debug_poll_events(idx);
        let revents = self.pollfds[idx].revents;
        if revents & (libc::POLLHUP | libc::POLLERR) != 0 {
            self.mixer.channels[idx].close();
            return;
        }
        if revents & libc::POLLOUT != 0 {
            if self.mixer.channels[idx].drain_tx().is_err() {
                self.mixer.channels[idx].close();
                return;
            }
        }
        if revents & libc::POLLIN != 0 {
            match self.mixer.read_channel(idx) {
                Ok(n_bytes) if n_bytes > 0 => (),
                _ => self.mixer.channels[idx].close(),
            }
        }
    }

    fn defer_events(&mut self) {
        let n = self.n_channels();
        if self.pollfds[n].revents & libc::POLLIN != 0 {
            self.mixer.fire_deferred();
        }
    }

    /// On a config-file change, verify the new file; a clean parse asks
    /// for a reload.
    fn check_config(&mut self) -> Result<Round, Error> {
        let n = self.n_channels();
        if self.pollfds[n + 1].revents & libc::POLLIN == 0 {
            return Ok(Round::Continue);
        }
        let mut buf = [0u8; 256 + mem::size_of::<libc::inotify_event>()];
        let n_bytes = unsafe {
            libc::read(
                self.fd_inotify,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        if n_bytes <= 0 {
            return Err(io::Error::last_os_error().into());
        }
        if config::verify(&config::config_file()).is_ok() {
            Ok(Round::Reload)
        } else {
            Ok(Round::Continue)
        }
    }

    /// Poll for events in a continuous loop. Returns `Ok(())` when the
    /// configuration changed and the daemon should rebuild.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            self.register_events();
            self.do_poll()?;
            for idx in 0..self.n_channels() {
                self.channel_events(idx);
            }
            self.defer_events();
            if let Round::Reload = self.check_config()? {
                return Ok(());
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        unsafe {
            libc::inotify_rm_watch(self.fd_inotify, self.wd_inotify);
            libc::close(self.fd_inotify);
            libc::close(self.fd_null);
        }
    }
}
