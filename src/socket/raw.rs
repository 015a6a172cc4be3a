use super::RawTransport;
use crate::icmp::family::AddressFamily;
use socket2::{SockAddr, Type};
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Poll interval while emulating timeouts on sockets that reject the native
/// timeout options.
const EMULATION_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Destination port of the throwaway UDP connect used for source-address
/// discovery. Nothing is ever sent to it.
const DISCARD_PORT: u16 = 9;

enum TimeoutMode {
    /// SO_RCVTIMEO/SO_SNDTIMEO accepted; the applied read timeout is cached
    /// so per-call adjustments only hit the kernel when the value changes.
    Native { applied_read_timeout: Mutex<Duration> },
    /// The platform refused the timeout options for this socket type; the
    /// socket is nonblocking and deadlines are enforced by polling, with the
    /// same window applied to both directions.
    Emulated,
}

/// Raw ICMP/ICMPv6 socket. Requires raw-socket privilege to open.
pub struct RawSocket {
    socket: socket2::Socket,
    timeout: Duration,
    mode: TimeoutMode,
}

impl RawSocket {
    pub fn open(family: AddressFamily, timeout: Duration) -> io::Result<RawSocket> {
        tracing::trace!("opening raw {:?} socket", family);
        let socket = socket2::Socket::new(family.domain(), Type::RAW, Some(family.protocol()))?;
        let mode = match apply_native_timeouts(&socket, timeout) {
            Ok(()) => TimeoutMode::Native { applied_read_timeout: Mutex::new(timeout) },
            Err(e) => {
                tracing::debug!("native socket timeouts unsupported ({}), falling back to emulation", e);
                socket.set_nonblocking(true)?;
                TimeoutMode::Emulated
            }
        };
        Ok(RawSocket { socket, timeout, mode })
    }
}

fn apply_native_timeouts(socket: &socket2::Socket, timeout: Duration) -> io::Result<()> {
    socket.set_write_timeout(Some(timeout))?;
    socket.set_read_timeout(Some(timeout))
}

impl RawTransport for RawSocket {
    fn send_to(&self, buf: &[u8], destination: SocketAddr) -> io::Result<usize> {
        let addr = SockAddr::from(destination);
        match self.mode {
            TimeoutMode::Native { .. } => self.socket.send_to(buf, &addr),
            TimeoutMode::Emulated => {
                let deadline = Instant::now() + self.timeout;
                loop {
                    match self.socket.send_to(buf, &addr) {
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            if Instant::now() >= deadline {
                                return Err(io::Error::new(io::ErrorKind::TimedOut, "send timed out"));
                            }
                            std::thread::sleep(EMULATION_POLL_INTERVAL);
                        }
                        other => return other,
                    }
                }
            }
        }
    }

    fn recv_into(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)> {
        match &self.mode {
            TimeoutMode::Native { applied_read_timeout } => {
                {
                    let mut applied = applied_read_timeout.lock().expect("lock poisoned");
                    if *applied != timeout {
                        self.socket.set_read_timeout(Some(timeout))?;
                        *applied = timeout;
                    }
                }
                let (n, addr) = self
                    .socket
                    .recv_from(recv_buffer(buf))
                    .map_err(normalize_expiry)?;
                Ok((n, peer_ip(&addr)?))
            }
            TimeoutMode::Emulated => {
                let deadline = Instant::now() + timeout;
                loop {
                    match self.socket.recv_from(recv_buffer(buf)) {
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                            if Instant::now() >= deadline {
                                return Err(io::Error::new(io::ErrorKind::TimedOut, "receive timed out"));
                            }
                            std::thread::sleep(EMULATION_POLL_INTERVAL);
                        }
                        Err(e) => return Err(e),
                        Ok((n, addr)) => return Ok((n, peer_ip(&addr)?)),
                    }
                }
            }
        }
    }

    fn source_address_for(&self, destination: IpAddr) -> io::Result<IpAddr> {
        // Route lookup without sending anything: connect a throwaway UDP
        // socket and read back the local address the kernel picked.
        let bind_addr: SocketAddr = match destination {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), 0),
        };
        let udp = UdpSocket::bind(bind_addr)?;
        udp.connect(SocketAddr::new(destination, DISCARD_PORT))?;
        Ok(udp.local_addr()?.ip())
    }
}

// Socket2 gives a safety guarantee which allows us to do an unsafe cast from
// `&mut [u8]` to `&mut [std::mem::MaybeUninit<u8>]`: the implementation never
// writes uninitialized bytes into the buffer.
// https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
fn recv_buffer(buf: &mut [u8]) -> &mut [std::mem::MaybeUninit<u8>] {
    unsafe { &mut *(buf as *mut [u8] as *mut [std::mem::MaybeUninit<u8>]) }
}

fn normalize_expiry(error: io::Error) -> io::Error {
    if error.kind() == io::ErrorKind::WouldBlock {
        io::Error::new(io::ErrorKind::TimedOut, error)
    } else {
        error
    }
}

fn peer_ip(addr: &SockAddr) -> io::Result<IpAddr> {
    addr.as_socket()
        .map(|socket_addr| socket_addr.ip())
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "peer address is not an internet address"))
}
