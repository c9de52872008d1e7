//! I/O channels over serial ports, UDP and TCP sockets.
//!
//! A channel owns one file descriptor plus bounded receive and transmit
//! buffers. Channels stay closed until something is waiting to use them and
//! are reopened by the event loop after a failure.

use std::ffi::{c_void, CString};
use std::io;
use std::mem;
use std::net::{SocketAddr, ToSocketAddrs};
use std::os::unix::io::RawFd;
use std::ptr;

use log::{debug, info, warn};

use crate::buffer::Buffer;

const BUFFER_SIZE: usize = 256;

bitflags! {
    pub struct ChannelFlags: u32 {
        /// UDP datagram transport
        const UDP = 1 << 0;
        /// TCP stream transport
        const TCP = 1 << 1;
        /// bind / listen instead of connect
        const LISTEN = 1 << 2;
        /// every request is answered by the device
        const RESP_REQUIRED = 1 << 3;
        /// a response is outstanding; hold further writes
        const NEEDS_RESP = 1 << 4;
    }
}

pub struct Channel {
    pub name: String,
    pub service: String,
    fd: Option<RawFd>,
    sfd: Option<RawFd>,
    pub flags: ChannelFlags,
    pub rxbuf: Buffer,
    pub txbuf: Buffer,
    /// index of the attached camera control reader, if any
    pub reader: Option<usize>,
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut s = String::new();
    for b in bytes {
        s.push_str(&format!(" {:02x}", b));
    }
    s
}

impl Channel {
    pub fn new(name: &str, service: &str, flags: ChannelFlags) -> Channel {
        Channel {
            name: name.to_string(),
            service: service.to_string(),
            fd: None,
            sfd: None,
            flags,
            rxbuf: Buffer::new(BUFFER_SIZE),
            txbuf: Buffer::new(BUFFER_SIZE),
            reader: None,
        }
    }

    fn log_event(&self, msg: &str) {
        info!("channel: {} {}:{}", msg, self.name, self.service);
    }

    fn log_error(&self, err: &io::Error) {
        warn!("channel: {} {}:{}", err, self.name, self.service);
    }

    /// A name starting with '/' is a serial port device node.
    fn is_sport(&self) -> bool {
        self.name.starts_with('/')
    }

    /// Flags which distinguish one transport from another on this channel.
    fn significant_flags(&self) -> ChannelFlags {
        if self.is_sport() {
            ChannelFlags::UDP | ChannelFlags::TCP
        } else {
            ChannelFlags::UDP | ChannelFlags::TCP | ChannelFlags::LISTEN
        }
    }

    /// Check whether this channel serves the given endpoint, so one socket
    /// can be shared between configuration directives.
    pub fn matches(&self, name: &str, service: &str, flags: ChannelFlags) -> bool {
        if self.name != name {
            return false;
        }
        let mask = self.significant_flags();
        self.service == service && (mask & self.flags) == (mask & flags)
    }

    fn is_localhost(&self) -> bool {
        self.name.starts_with("localhost") || self.name.starts_with("0.0.0.0")
    }

    fn should_listen(&self) -> bool {
        self.flags.contains(ChannelFlags::LISTEN) && self.is_localhost()
    }

    pub fn is_open(&self) -> bool {
        self.fd.is_some()
    }

    pub fn fd(&self) -> Option<RawFd> {
        self.fd
    }

    /// The listener socket is current (no connection accepted yet).
    pub fn is_listening(&self) -> bool {
        self.sfd.is_some() && self.fd == self.sfd
    }

    pub fn has_reader(&self) -> bool {
        self.reader.is_some()
    }

    pub fn needs_reading(&self) -> bool {
        self.has_reader() || self.flags.contains(ChannelFlags::NEEDS_RESP)
    }

    pub fn needs_writing(&self) -> bool {
        !(self.txbuf.is_empty() || self.flags.contains(ChannelFlags::NEEDS_RESP))
    }

    /// Waiting channels should be opened (or kept open).
    pub fn is_waiting(&self) -> bool {
        !self.txbuf.is_empty() || self.reader.is_some()
    }

    pub fn open(&mut self) -> io::Result<()> {
        debug_assert!(self.fd.is_none());
        self.flags.remove(ChannelFlags::NEEDS_RESP);
        if self.should_listen() {
            self.log_event("listening");
        } else {
            self.log_event("opening");
        }
        let res = if self.is_sport() {
            self.open_sport()
        } else if self.flags.contains(ChannelFlags::UDP) {
            self.open_udp()
        } else {
            self.open_tcp()
        };
        if let Err(err) = &res {
            self.log_error(err);
            self.close();
        }
        res
    }

    pub fn close(&mut self) {
        self.rxbuf.clear();
        self.txbuf.clear();
        if let Some(fd) = self.fd.take() {
            self.log_event("closing");
            if self.sfd == Some(fd) {
                // closing the listener itself
                self.sfd = None;
                unsafe { libc::close(fd) };
            } else {
                unsafe { libc::close(fd) };
                // leave the listener in place for the next connection
                self.fd = self.sfd;
            }
        }
    }

    fn baud_mask(&self) -> Option<libc::speed_t> {
        match self.service.parse::<u32>() {
            Ok(1200) => Some(libc::B1200),
            Ok(2400) => Some(libc::B2400),
            Ok(4800) => Some(libc::B4800),
            Ok(9600) => Some(libc::B9600),
            Ok(19200) => Some(libc::B19200),
            Ok(38400) => Some(libc::B38400),
            _ => None,
        }
    }

    /// Configure the serial port: 8 data bits, no parity, local mode.
    fn configure_sport(&self, fd: RawFd, baud: libc::speed_t) -> io::Result<()> {
        let mut ttyset: libc::termios = unsafe { mem::zeroed() };
        ttyset.c_cflag = libc::CREAD | libc::CS8 | libc::CLOCAL;
        ttyset.c_cc[libc::VMIN] = 0;
        ttyset.c_cc[libc::VTIME] = 1;
        unsafe {
            if libc::cfsetispeed(&mut ttyset, baud) < 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::cfsetospeed(&mut ttyset, baud) < 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::tcsetattr(fd, libc::TCSAFLUSH, &ttyset) < 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    fn open_sport(&mut self) -> io::Result<()> {
        let name = CString::new(self.name.as_str())
            .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
        let fd = loop {
            let fd = unsafe {
                libc::open(name.as_ptr(), libc::O_RDWR | libc::O_NOCTTY | libc::O_NONBLOCK)
            };
            if fd >= 0 {
                break fd;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        };
        self.fd = Some(fd);
        if let Some(baud) = self.baud_mask() {
            self.configure_sport(fd, baud)?;
        }
        Ok(())
    }

    fn resolve(&self) -> io::Result<Vec<SocketAddr>> {
        let port: u16 = self
            .service
            .parse()
            .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;
        let addrs: Vec<SocketAddr> = (self.name.as_str(), port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(io::Error::from_raw_os_error(libc::EADDRNOTAVAIL));
        }
        Ok(addrs)
    }

    fn set_keepalive(&self, fd: RawFd) -> io::Result<()> {
        // probe dead peers on channels which never write
        set_opt(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1)?;
        set_opt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, 4)?;
        set_opt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, 30)?;
        set_opt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, 10)?;
        Ok(())
    }

    fn config_socket(&self, fd: RawFd, stype: libc::c_int) -> io::Result<()> {
        set_nonblocking(fd)?;
        set_opt(fd, libc::SOL_IP, libc::IP_RECVERR, 1)?;
        set_opt(fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1)?;
        if stype == libc::SOCK_STREAM {
            self.set_keepalive(fd)?;
            set_opt(fd, libc::IPPROTO_TCP, libc::TCP_NODELAY, 1)?;
        }
        Ok(())
    }

    fn open_socket(&mut self, stype: libc::c_int, bind: bool) -> io::Result<RawFd> {
        let addrs = self.resolve()?;
        let mut last_err = io::Error::from_raw_os_error(libc::EADDRNOTAVAIL);
        for addr in addrs {
            let family = match addr {
                SocketAddr::V4(_) => libc::AF_INET,
                SocketAddr::V6(_) => libc::AF_INET6,
            };
            let fd = unsafe { libc::socket(family, stype, 0) };
            if fd < 0 {
                last_err = io::Error::last_os_error();
                self.log_error(&last_err);
                continue;
            }
            if let Err(err) = self.config_socket(fd, stype) {
                unsafe { libc::close(fd) };
                return Err(err);
            }
            let (ss, len) = sockaddr_from(&addr);
            let rc = if bind {
                unsafe { libc::bind(fd, &ss as *const _ as *const libc::sockaddr, len) }
            } else {
                unsafe { libc::connect(fd, &ss as *const _ as *const libc::sockaddr, len) }
            };
            if rc == 0 || (!bind && io::Error::last_os_error().raw_os_error() == Some(libc::EINPROGRESS)) {
                self.fd = Some(fd);
                return Ok(fd);
            }
            last_err = io::Error::last_os_error();
            self.log_error(&last_err);
            unsafe { libc::close(fd) };
            break;
        }
        Err(last_err)
    }

    fn open_udp(&mut self) -> io::Result<()> {
        let bind = self.flags.contains(ChannelFlags::LISTEN);
        self.open_socket(libc::SOCK_DGRAM, bind).map(|_| ())
    }

    fn open_tcp(&mut self) -> io::Result<()> {
        if self.should_listen() {
            let fd = self.open_socket(libc::SOCK_STREAM, true)?;
            if unsafe { libc::listen(fd, 1) } < 0 {
                return Err(io::Error::last_os_error());
            }
            self.sfd = Some(fd);
            Ok(())
        } else {
            self.open_socket(libc::SOCK_STREAM, false).map(|_| ())
        }
    }

    /// Accept a client connection, replacing the current fd while the
    /// listener is retained for later connections.
    pub fn accept(&mut self) -> io::Result<()> {
        let sfd = match self.sfd {
            Some(sfd) => sfd,
            None => return Err(io::Error::from_raw_os_error(libc::EBADF)),
        };
        let fd = loop {
            let fd = unsafe { libc::accept(sfd, ptr::null_mut(), ptr::null_mut()) };
            if fd >= 0 {
                break fd;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                self.log_error(&err);
                return Err(err);
            }
        };
        set_nonblocking(fd)?;
        self.log_event("accepting");
        self.fd = Some(fd);
        Ok(())
    }

    /// Read into the receive buffer. Returns the byte count; zero means
    /// the peer closed the stream.
    pub fn fill_rx(&mut self) -> io::Result<usize> {
        let fd = match self.fd {
            Some(fd) => fd,
            None => return Ok(0),
        };
        let n_bytes = match self.rxbuf.read(fd) {
            Ok(n) => n,
            Err(err) => {
                self.log_error(&err);
                return Err(err);
            }
        };
        if n_bytes > 0 {
            self.flags.remove(ChannelFlags::NEEDS_RESP);
            let pending = self.rxbuf.output();
            debug!(
                "debug: IN {}:{}{}",
                self.name,
                self.service,
                hex_dump(&pending[pending.len() - n_bytes..])
            );
        }
        Ok(n_bytes)
    }

    /// Drain the transmit buffer to the fd.
    pub fn drain_tx(&mut self) -> io::Result<usize> {
        let fd = match self.fd {
            Some(fd) => fd,
            None => return Ok(0),
        };
        if self.flags.contains(ChannelFlags::RESP_REQUIRED) {
            self.flags.insert(ChannelFlags::NEEDS_RESP);
        }
        debug!(
            "debug: OUT {}:{}{}",
            self.name,
            self.service,
            hex_dump(self.txbuf.output())
        );
        match self.txbuf.write(fd) {
            Ok(n) => Ok(n),
            Err(err) => {
                self.log_error(&err);
                Err(err)
            }
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
        if let Some(sfd) = self.sfd.take() {
            unsafe { libc::close(sfd) };
        }
    }
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn set_opt(fd: RawFd, level: libc::c_int, name: libc::c_int, value: libc::c_int) -> io::Result<()> {
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            &value as *const _ as *const c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sockaddr_from(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    let mut ss: libc::sockaddr_storage = unsafe { mem::zeroed() };
    match addr {
        SocketAddr::V4(a) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: a.port().to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from_ne_bytes(a.ip().octets()),
                },
                sin_zero: [0; 8],
            };
            unsafe {
                ptr::copy_nonoverlapping(
                    &sin as *const _ as *const u8,
                    &mut ss as *mut _ as *mut u8,
                    mem::size_of::<libc::sockaddr_in>(),
                );
            }
            (ss, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
        }
        SocketAddr::V6(a) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: a.port().to_be(),
                sin6_flowinfo: a.flowinfo(),
                sin6_addr: libc::in6_addr {
                    s6_addr: a.ip().octets(),
                },
                sin6_scope_id: a.scope_id(),
            };
            unsafe {
                ptr::copy_nonoverlapping(
                    &sin6 as *const _ as *const u8,
                    &mut ss as *mut _ as *mut u8,
                    mem::size_of::<libc::sockaddr_in6>(),
                );
            }
            (ss, mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_matching() {
        let chn = Channel::new("10.0.0.1", "7001", ChannelFlags::TCP);
        assert!(chn.matches("10.0.0.1", "7001", ChannelFlags::TCP));
        assert!(!chn.matches("10.0.0.1", "7002", ChannelFlags::TCP));
        assert!(!chn.matches("10.0.0.2", "7001", ChannelFlags::TCP));
        // LISTEN is significant for network endpoints
        assert!(!chn.matches("10.0.0.1", "7001", ChannelFlags::TCP | ChannelFlags::LISTEN));
        // response flags are not
        assert!(chn.matches("10.0.0.1", "7001", ChannelFlags::TCP | ChannelFlags::RESP_REQUIRED));
    }

    #[test]
    fn serial_matching_ignores_listen() {
        let chn = Channel::new("/dev/ttyS0", "9600", ChannelFlags::LISTEN);
        assert!(chn.matches("/dev/ttyS0", "9600", ChannelFlags::empty()));
    }

    #[test]
    fn waiting_and_readiness() {
        let mut chn = Channel::new("10.0.0.1", "7001", ChannelFlags::empty());
        assert!(!chn.is_waiting());
        chn.reader = Some(0);
        assert!(chn.is_waiting());
        assert!(chn.needs_reading());
        chn.reader = None;
        chn.txbuf.append(2).unwrap().copy_from_slice(b"ab");
        assert!(chn.is_waiting());
        assert!(chn.needs_writing());
        chn.flags.insert(ChannelFlags::NEEDS_RESP);
        assert!(!chn.needs_writing());
        assert!(chn.needs_reading());
    }
}
