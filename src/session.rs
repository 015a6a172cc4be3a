use crate::error::{PingError, PingResult};
use crate::icmp::checksum;
use crate::icmp::family::AddressFamily;
use crate::icmp::packet::{EchoPacket, Ttl};
use crate::icmp::sequence_number::SequenceNumber;
use crate::socket::{RawSocket, RawTransport};
use crate::timestamp;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// Monotonic send timestamp embedded at the start of the echo payload.
const TIMESTAMP_BYTE_LENGTH: usize = 8;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Applied to both send and receive, in either timeout mode.
    pub timeout: Duration,
    /// ICMP data bytes after the echo header: the embedded timestamp plus
    /// random padding. Must hold at least the 8-byte timestamp.
    pub payload_byte_length: usize,
    /// IPv4 header length in 4-byte words. Ignored for IPv6.
    pub ip_header_words: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timeout: Duration::from_secs(10),
            payload_byte_length: 56,
            ip_header_words: 5,
        }
    }
}

/// Observer invoked for each matched reply, layered on top of the
/// synchronous return value of [`EchoSession::receive_echo_reply`].
pub trait EchoReplyListener {
    fn on_echo_reply(&mut self, packet: &EchoPacket, payload_offset: usize, source: IpAddr);
}

impl<F> EchoReplyListener for F
where
    F: FnMut(&EchoPacket, usize, IpAddr),
{
    fn on_echo_reply(&mut self, packet: &EchoPacket, payload_offset: usize, source: IpAddr) {
        self(packet, payload_offset, source);
    }
}

/// One matched echo reply.
#[derive(Debug)]
pub struct EchoReply {
    pub icmp_packet_byte_length: usize,
    pub source: IpAddr,
    pub identifier: u16,
    pub sequence_number: u16,
    /// Present for IPv4 only; the kernel keeps the IPv6 header.
    pub ttl: Option<Ttl>,
    /// Monotonic send timestamp carried back in the reply payload.
    pub timestamp_nanos: u64,
    /// Offset of the first data byte within the receive buffer.
    pub payload_offset: usize,
}

/// Ping identifier derived from the current process, the conventional
/// choice for ping programs.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn process_identifier() -> u16 {
    std::process::id() as u16
}

/// A stateful echo conversation bound to one (identifier, address-family)
/// pair.
///
/// The session owns one send and one receive buffer and a raw transport;
/// it is single-owner and performs no internal locking. `close` releases
/// the transport, after which every operation fails with
/// [`PingError::ClosedResource`].
pub struct EchoSession<T = RawSocket>
where
    T: RawTransport,
{
    family: AddressFamily,
    identifier: u16,
    sequence_number: SequenceNumber,
    timeout: Duration,
    send_packet: EchoPacket,
    recv_packet: EchoPacket,
    transport: Option<T>,
    listener: Option<Box<dyn EchoReplyListener + Send>>,
}

impl EchoSession<RawSocket> {
    /// Opens a raw socket for `family` and prepares the session buffers.
    ///
    /// Fails with [`PingError::TransportUnavailable`] when raw-socket
    /// privilege is missing.
    pub fn open(
        family: AddressFamily,
        identifier: u16,
        config: &SessionConfig,
    ) -> PingResult<Self> {
        let transport = RawSocket::open(family, config.timeout)
            .map_err(PingError::TransportUnavailable)?;
        Ok(Self::with_transport(family, identifier, config, transport))
    }
}

impl<T> EchoSession<T>
where
    T: RawTransport,
{
    pub(crate) fn with_transport(
        family: AddressFamily,
        identifier: u16,
        config: &SessionConfig,
        transport: T,
    ) -> Self {
        assert!(
            config.payload_byte_length >= TIMESTAMP_BYTE_LENGTH,
            "payload must hold the 8-byte timestamp"
        );
        let mut send_packet =
            EchoPacket::new(family, config.ip_header_words, config.payload_byte_length);
        send_packet.randomize_padding();
        let recv_packet =
            EchoPacket::new(family, config.ip_header_words, config.payload_byte_length);
        EchoSession {
            family,
            identifier,
            sequence_number: SequenceNumber::start_value(),
            timeout: config.timeout,
            send_packet,
            recv_packet,
            transport: Some(transport),
            listener: None,
        }
    }

    #[must_use]
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    #[must_use]
    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    /// Read access to the last received frame.
    #[must_use]
    pub fn reply_packet(&self) -> &EchoPacket {
        &self.recv_packet
    }

    /// Number of data bytes in an echo request.
    #[must_use]
    pub fn request_data_length(&self) -> usize {
        self.send_packet.icmp_data_byte_length()
    }

    /// Total IP packet length of an echo request as it travels the wire.
    #[must_use]
    pub fn request_packet_length(&self) -> usize {
        self.send_packet.ip_packet_byte_length()
    }

    pub fn set_reply_listener(&mut self, listener: Option<Box<dyn EchoReplyListener + Send>>) {
        self.listener = listener;
    }

    /// Builds and transmits one echo request; returns the sequence number
    /// used. Fire-and-forget: reply arrival is [`Self::receive_echo_reply`]'s
    /// business.
    pub fn send_echo_request(&mut self, destination: IpAddr) -> PingResult<SequenceNumber> {
        if self.transport.is_none() {
            return Err(PingError::ClosedResource);
        }
        if AddressFamily::of(destination) != self.family {
            return Err(PingError::AddressResolution(format!(
                "destination {} does not match session family {:?}",
                destination, self.family
            )));
        }

        let sequence = self.sequence_number.post_increment();
        self.send_packet.set_message_type(self.family.echo_request_type());
        self.send_packet.set_code(0);
        self.send_packet.set_identifier(self.identifier);
        self.send_packet.set_sequence_number(sequence.into());
        self.send_packet.write_payload_timestamp(timestamp::monotonic_nanos());

        let seed = self.checksum_seed(destination)?;
        self.send_packet.compute_checksum(seed);

        let transport = self.transport.as_ref().ok_or(PingError::ClosedResource)?;
        let sent = transport.send_to(self.send_packet.icmp_region(), SocketAddr::new(destination, 0))?;
        tracing::trace!("sent {} byte echo request {} to {}", sent, sequence, destination);
        Ok(sequence)
    }

    /// ICMP sums over the message alone; ICMPv6 folds in the pseudo-header,
    /// which needs the local source address toward the destination.
    fn checksum_seed(&self, destination: IpAddr) -> PingResult<u32> {
        match (self.family, destination) {
            (AddressFamily::V6, IpAddr::V6(destination_v6)) => {
                let transport = self.transport.as_ref().ok_or(PingError::ClosedResource)?;
                let source = transport.source_address_for(destination)?;
                let IpAddr::V6(source_v6) = source else {
                    return Err(PingError::Transport(io::Error::new(
                        io::ErrorKind::Other,
                        "resolved source address is not IPv6",
                    )));
                };
                #[allow(clippy::cast_possible_truncation)]
                let upper_layer_len = self.send_packet.icmp_packet_byte_length() as u32;
                Ok(checksum::pseudo_header_seed(&source_v6, &destination_v6, upper_layer_len))
            }
            _ => Ok(0),
        }
    }

    /// Blocks until one frame arrives in the receive buffer or the
    /// configured timeout elapses. No filtering; callers that want a
    /// matched reply use [`Self::receive_echo_reply`].
    pub fn receive(&mut self) -> PingResult<(usize, IpAddr)> {
        self.receive_frame(self.timeout)
    }

    fn receive_frame(&mut self, timeout: Duration) -> PingResult<(usize, IpAddr)> {
        let transport = self.transport.as_ref().ok_or(PingError::ClosedResource)?;
        // IPv4 delivers the full IP frame; IPv6 delivers the ICMP region
        // only, which is exactly where the v6 buffer starts.
        let (n, source) = transport.recv_into(self.recv_packet.as_bytes_mut(), timeout)?;
        Ok((n, source))
    }

    /// Receives until a frame carries the family's echo-reply type and this
    /// session's identifier, then returns it (invoking the listener first,
    /// when one is registered).
    ///
    /// One absolute deadline covers the whole matching loop, so a stream of
    /// foreign frames cannot extend the wait beyond the configured timeout.
    pub fn receive_echo_reply(&mut self) -> PingResult<EchoReply> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PingError::Timeout);
            }
            let (_, source) = self.receive_frame(remaining)?;

            if self.recv_packet.message_type() != self.family.echo_reply_type()
                || self.recv_packet.identifier() != self.identifier
            {
                tracing::trace!(
                    "discarding frame from {}: type {} identifier {}",
                    source,
                    self.recv_packet.message_type(),
                    self.recv_packet.identifier()
                );
                continue;
            }

            let payload_offset = self.recv_packet.payload_offset();
            if let Some(listener) = self.listener.as_mut() {
                listener.on_echo_reply(&self.recv_packet, payload_offset, source);
            }
            return Ok(EchoReply {
                icmp_packet_byte_length: self.recv_packet.icmp_packet_byte_length(),
                source,
                identifier: self.recv_packet.identifier(),
                sequence_number: self.recv_packet.sequence_number(),
                ttl: self.recv_packet.ttl(),
                timestamp_nanos: self.recv_packet.payload_timestamp(),
                payload_offset,
            });
        }
    }

    /// Synchronous ping: send one request, wait for the matching reply and
    /// return the round-trip time measured on the monotonic clock.
    pub fn ping(&mut self, destination: IpAddr) -> PingResult<Duration> {
        self.send_echo_request(destination)?;
        let reply = self.receive_echo_reply()?;
        let end = timestamp::monotonic_nanos();
        Ok(Duration::from_nanos(end.saturating_sub(reply.timestamp_nanos)))
    }

    /// Releases the transport. The session is unusable afterwards; every
    /// further operation, including a second `close`, fails with
    /// [`PingError::ClosedResource`].
    pub fn close(&mut self) -> PingResult<()> {
        match self.transport.take() {
            Some(transport) => {
                drop(transport);
                Ok(())
            }
            None => Err(PingError::ClosedResource),
        }
    }
}
