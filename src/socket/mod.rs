use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

mod raw;
pub use raw::RawSocket;

/// Contract the echo engine requires from the OS raw-socket layer.
///
/// Implementations must normalize receive expiry to
/// `io::ErrorKind::TimedOut` so callers can tell packet loss apart from
/// transport failure.
pub trait RawTransport: Send + Sync {
    /// Transmits `buf` to `destination`. May block briefly on send
    /// buffering, never on reply arrival.
    fn send_to(&self, buf: &[u8], destination: SocketAddr) -> io::Result<usize>;

    /// Blocks until one frame lands in `buf` or `timeout` elapses. The
    /// offset-aware read of the v6 path is expressed by slicing `buf`
    /// before the call.
    fn recv_into(&self, buf: &mut [u8], timeout: Duration) -> io::Result<(usize, IpAddr)>;

    /// Local address the kernel would route toward `destination` from.
    /// Input to the ICMPv6 pseudo-header checksum.
    fn source_address_for(&self, destination: IpAddr) -> io::Result<IpAddr>;
}
