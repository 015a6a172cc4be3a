#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub use error::{PingError, PingResult};
pub use icmp::family::AddressFamily;
pub use icmp::packet::{EchoPacket, Ttl};
pub use icmp::sequence_number::SequenceNumber;
pub use resolve::{lookup_addr, lookup_host, lookup_host_v4, lookup_host_v6};
pub use session::{
    process_identifier, EchoReply, EchoReplyListener, EchoSession, SessionConfig,
};
pub use socket::{RawSocket, RawTransport};
pub use timestamp::monotonic_nanos;

mod error;
mod icmp;
mod resolve;
mod session;
mod socket;
mod timestamp;
