use crate::icmp::checksum;
use crate::icmp::family::AddressFamily;
use rand::Rng;
use std::fmt;

/// Fixed ICMP echo header: type, code, checksum, identifier, sequence.
pub(crate) const ICMP_HEADER_BYTE_LENGTH: usize = 8;

/// The kernel strips the fixed 40-byte IPv6 header before delivery, so it is
/// never stored in a buffer; it only reappears in reported packet lengths.
pub(crate) const IPV6_HEADER_BYTE_LENGTH: usize = 40;

const TYPE_OFFSET: usize = 0;
const CODE_OFFSET: usize = 1;
const CHECKSUM_OFFSET: usize = 2;
const IDENTIFIER_OFFSET: usize = 4;
const SEQUENCE_OFFSET: usize = 6;

/// TTL byte within a received IPv4 header.
const IPV4_TTL_OFFSET: usize = 8;

/// In-memory view of one ICMP or ICMPv6 echo packet.
///
/// The buffer is an IP-header region (absent for IPv6) followed by the ICMP
/// region: the 8-byte echo header and then the data bytes. All multi-byte
/// fields are big-endian. Each setter writes exactly its own field.
pub struct EchoPacket {
    family: AddressFamily,
    ip_header_len: usize,
    data_len: usize,
    buf: Vec<u8>,
}

impl EchoPacket {
    /// Allocates backing storage for one packet.
    ///
    /// `ip_header_words` is the IPv4 header length in 4-byte words (ignored
    /// for IPv6); `data_byte_length` is the ICMP data region that follows
    /// the echo header.
    #[must_use]
    pub fn new(family: AddressFamily, ip_header_words: u8, data_byte_length: usize) -> Self {
        let ip_header_len = family.ip_header_byte_length(ip_header_words);
        let buf = vec![0u8; ip_header_len + ICMP_HEADER_BYTE_LENGTH + data_byte_length];
        EchoPacket { family, ip_header_len, data_len: data_byte_length, buf }
    }

    #[must_use]
    pub fn ip_header_byte_length(&self) -> usize {
        self.ip_header_len
    }

    #[must_use]
    pub fn icmp_header_byte_length(&self) -> usize {
        ICMP_HEADER_BYTE_LENGTH
    }

    #[must_use]
    pub fn icmp_data_byte_length(&self) -> usize {
        self.data_len
    }

    /// Echo header plus data bytes.
    #[must_use]
    pub fn icmp_packet_byte_length(&self) -> usize {
        ICMP_HEADER_BYTE_LENGTH + self.data_len
    }

    /// Total IP packet length as reported to callers. The IPv6 header is not
    /// in the buffer, so its fixed length is added back in.
    #[must_use]
    pub fn ip_packet_byte_length(&self) -> usize {
        match self.family {
            AddressFamily::V4 => self.ip_header_len + self.icmp_packet_byte_length(),
            AddressFamily::V6 => self.icmp_packet_byte_length() + IPV6_HEADER_BYTE_LENGTH,
        }
    }

    /// Absolute offset of the first data byte, where the send timestamp
    /// lives.
    #[must_use]
    pub fn payload_offset(&self) -> usize {
        self.ip_header_len + ICMP_HEADER_BYTE_LENGTH
    }

    #[must_use]
    pub fn message_type(&self) -> u8 {
        self.buf[self.ip_header_len + TYPE_OFFSET]
    }

    pub(crate) fn set_message_type(&mut self, value: u8) {
        self.buf[self.ip_header_len + TYPE_OFFSET] = value;
    }

    #[must_use]
    pub fn code(&self) -> u8 {
        self.buf[self.ip_header_len + CODE_OFFSET]
    }

    pub(crate) fn set_code(&mut self, value: u8) {
        self.buf[self.ip_header_len + CODE_OFFSET] = value;
    }

    #[must_use]
    pub fn checksum(&self) -> u16 {
        self.read_u16(self.ip_header_len + CHECKSUM_OFFSET)
    }

    pub(crate) fn set_checksum(&mut self, value: u16) {
        self.write_u16(self.ip_header_len + CHECKSUM_OFFSET, value);
    }

    #[must_use]
    pub fn identifier(&self) -> u16 {
        self.read_u16(self.ip_header_len + IDENTIFIER_OFFSET)
    }

    pub(crate) fn set_identifier(&mut self, value: u16) {
        self.write_u16(self.ip_header_len + IDENTIFIER_OFFSET, value);
    }

    #[must_use]
    pub fn sequence_number(&self) -> u16 {
        self.read_u16(self.ip_header_len + SEQUENCE_OFFSET)
    }

    pub(crate) fn set_sequence_number(&mut self, value: u16) {
        self.write_u16(self.ip_header_len + SEQUENCE_OFFSET, value);
    }

    /// Time-to-live of a received IPv4 frame. `None` for IPv6, where the
    /// header never reaches the buffer.
    #[must_use]
    pub fn ttl(&self) -> Option<Ttl> {
        if self.family == AddressFamily::V4 && self.ip_header_len > IPV4_TTL_OFFSET {
            Some(Ttl(self.buf[IPV4_TTL_OFFSET]))
        } else {
            None
        }
    }

    /// Send timestamp embedded at the start of the data region.
    #[must_use]
    pub fn payload_timestamp(&self) -> u64 {
        let offset = self.payload_offset();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.buf[offset..offset + 8]);
        u64::from_be_bytes(bytes)
    }

    pub(crate) fn write_payload_timestamp(&mut self, nanos: u64) {
        let offset = self.payload_offset();
        self.buf[offset..offset + 8].copy_from_slice(&nanos.to_be_bytes());
    }

    /// Fills the data bytes after the timestamp slot with random padding.
    pub(crate) fn randomize_padding(&mut self) {
        let start = self.payload_offset() + 8;
        let end = self.payload_offset() + self.data_len;
        if start < end {
            rand::thread_rng().fill(&mut self.buf[start..end]);
        }
    }

    /// Computes and writes back the checksum over the ICMP region. The seed
    /// is zero for ICMP and the pseudo-header sum for ICMPv6.
    pub(crate) fn compute_checksum(&mut self, seed: u32) -> u16 {
        let start = self.ip_header_len;
        let len = self.icmp_packet_byte_length();
        let field = self.ip_header_len + CHECKSUM_OFFSET;
        checksum::checksum(&mut self.buf, start, len, Some(field), seed, true)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// The span that goes on the wire: echo header plus data, without any
    /// IP-header region.
    pub(crate) fn icmp_region(&self) -> &[u8] {
        &self.buf[self.ip_header_len..]
    }

    fn read_u16(&self, offset: usize) -> u16 {
        u16::from_be_bytes([self.buf[offset], self.buf[offset + 1]])
    }

    fn write_u16(&mut self, offset: usize, value: u16) {
        self.buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }
}

/// Time-to-live from a received IPv4 header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Ttl(pub u8);

impl From<u8> for Ttl {
    fn from(integer: u8) -> Self {
        Ttl(integer)
    }
}

impl From<Ttl> for u8 {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
