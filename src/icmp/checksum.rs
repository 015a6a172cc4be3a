//! Internet checksum (RFC 1071) over packet byte ranges, plus the IPv6
//! pseudo-header seed ICMPv6 requires (RFC 2460/4443).

use std::net::Ipv6Addr;

/// Next-header value for ICMPv6 inside the pseudo-header.
const NEXT_HEADER_ICMPV6: u32 = 58;

/// Ones'-complement checksum of `buf[start..start + len]`.
///
/// The range is summed as big-endian 16-bit words with 32-bit accumulation,
/// a trailing odd byte padded with a zero low byte, and carries folded until
/// none remain. The word at `checksum_field` reads as zero while the sum
/// accumulates, so the caller does not have to clear it first. When
/// `write_back` is set the result is stored at `checksum_field` in network
/// byte order.
///
/// A zero-length range with a zero seed yields `0xFFFF`. Offsets outside
/// `buf` are a programming error and fail fast on slice indexing.
pub(crate) fn checksum(
    buf: &mut [u8],
    start: usize,
    len: usize,
    checksum_field: Option<usize>,
    seed: u32,
    write_back: bool,
) -> u16 {
    let mut sum = seed;
    let mut idx = start;
    let end = start + len;
    while idx + 1 < end {
        if checksum_field != Some(idx) {
            sum += u32::from(u16::from_be_bytes([buf[idx], buf[idx + 1]]));
        }
        idx += 2;
    }
    if idx < end {
        sum += u32::from(buf[idx]) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    #[allow(clippy::cast_possible_truncation)]
    let value = !(sum as u16);
    if write_back {
        if let Some(field) = checksum_field {
            buf[field..field + 2].copy_from_slice(&value.to_be_bytes());
        }
    }
    value
}

/// Pseudo-header sum for an ICMPv6 packet of `upper_layer_len` bytes.
///
/// Folds the eight 16-bit words of each address, the upper-layer length
/// split into two 16-bit halves, and the fixed next-header value. Passed as
/// the seed of [`checksum`]. Computed in user space unconditionally because
/// at least one major OS family neither fills the ICMPv6 checksum in nor
/// honors the socket option that requests it.
pub(crate) fn pseudo_header_seed(
    source: &Ipv6Addr,
    destination: &Ipv6Addr,
    upper_layer_len: u32,
) -> u32 {
    let mut seed = 0u32;
    for word in source.segments() {
        seed += u32::from(word);
    }
    for word in destination.segments() {
        seed += u32::from(word);
    }
    seed += upper_layer_len >> 16;
    seed += upper_layer_len & 0xFFFF;
    seed += NEXT_HEADER_ICMPV6;
    seed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn rfc_1071_worked_example() {
        let mut buf = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(0x220d, checksum(&mut buf, 0, 8, None, 0, false));
    }

    #[test]
    fn zero_length_region_yields_all_ones() {
        let mut buf = [0u8; 4];
        assert_eq!(0xFFFF, checksum(&mut buf, 0, 0, None, 0, false));
    }

    #[test]
    fn echo_request_vector() {
        // type 8, code 0, identifier 0x1234, sequence 1, payload "abcdefgh"
        let mut buf = *b"\x08\x00\x00\x00\x12\x34\x00\x01abcdefgh";
        let len = buf.len();
        assert_eq!(0x5435, checksum(&mut buf, 0, len, Some(2), 0, true));
        assert_eq!([0x54, 0x35], [buf[2], buf[3]]);
    }

    #[test]
    fn checksum_field_reads_as_zero_during_summation() {
        let mut clean = *b"\x08\x00\x00\x00\x12\x34\x00\x01abcdefgh";
        let mut dirty = clean;
        dirty[2] = 0xDE;
        dirty[3] = 0xAD;
        let len = clean.len();
        assert_eq!(
            checksum(&mut clean, 0, len, Some(2), 0, false),
            checksum(&mut dirty, 0, len, Some(2), 0, false),
        );
    }

    #[test]
    fn odd_length_pads_trailing_byte() {
        let mut buf = [0x01, 0x02, 0x03];
        // 0x0102 + 0x0300 = 0x0402
        assert_eq!(!0x0402u16, checksum(&mut buf, 0, 3, None, 0, false));
    }

    #[test]
    fn written_back_checksum_self_verifies() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let mut buf = vec![0u8; 8 + rng.gen_range(0..64) * 2];
            rng.fill(&mut buf[..]);
            let len = buf.len();
            checksum(&mut buf, 0, len, Some(2), 0, true);
            // Re-summing the whole region, checksum field included, must
            // come out as zero.
            assert_eq!(0, checksum(&mut buf, 0, len, None, 0, false));
        }
    }

    #[test]
    fn single_bit_flips_change_the_checksum() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let mut buf = vec![0u8; 64];
            rng.fill(&mut buf[..]);
            let len = buf.len();
            let original = checksum(&mut buf, 0, len, Some(2), 0, false);
            let byte = rng.gen_range(0..len);
            let bit = rng.gen_range(0..8);
            if byte == 2 || byte == 3 {
                continue; // the skipped field does not participate
            }
            buf[byte] ^= 1 << bit;
            assert_ne!(original, checksum(&mut buf, 0, len, Some(2), 0, false));
        }
    }

    #[test]
    fn matches_reference_icmpv4_implementation() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let mut buf = vec![0u8; 8 + 56];
            rng.fill(&mut buf[..]);
            buf[0] = 8;
            buf[1] = 0;
            buf[2] = 0;
            buf[3] = 0;
            let len = buf.len();
            let ours = checksum(&mut buf, 0, len, Some(2), 0, false);
            let reference = pnet_packet::icmp::checksum(
                &pnet_packet::icmp::IcmpPacket::new(&buf).expect("buffer large enough"),
            );
            assert_eq!(ours, reference);
        }
    }

    #[test]
    fn pseudo_header_seed_folds_addresses_length_and_next_header() {
        let source: Ipv6Addr = "fe80::1".parse().unwrap();
        let destination: Ipv6Addr = "fe80::2".parse().unwrap();
        assert_eq!(0x0001_FD4D, pseudo_header_seed(&source, &destination, 16));
    }

    #[test]
    fn icmpv6_vector_with_pseudo_header() {
        let source: Ipv6Addr = "fe80::1".parse().unwrap();
        let destination: Ipv6Addr = "fe80::2".parse().unwrap();
        // type 128, code 0, identifier 0x1234, sequence 0, 8 payload bytes
        let mut buf = *b"\x80\x00\x00\x00\x12\x34\x00\x00\x01\x02\x03\x04\x05\x06\x07\x08";
        let len = buf.len();
        #[allow(clippy::cast_possible_truncation)]
        let seed = pseudo_header_seed(&source, &destination, len as u32);
        assert_eq!(0x6068, checksum(&mut buf, 0, len, Some(2), seed, true));
    }

    #[test]
    fn matches_reference_icmpv6_implementation() {
        let source: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let destination: Ipv6Addr = "2001:db8::2".parse().unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let mut buf = vec![0u8; 8 + 56];
            rng.fill(&mut buf[..]);
            buf[0] = 128;
            buf[1] = 0;
            buf[2] = 0;
            buf[3] = 0;
            let len = buf.len();
            #[allow(clippy::cast_possible_truncation)]
            let seed = pseudo_header_seed(&source, &destination, len as u32);
            let ours = checksum(&mut buf, 0, len, Some(2), seed, false);
            let reference = pnet_packet::icmpv6::checksum(
                &pnet_packet::icmpv6::Icmpv6Packet::new(&buf).expect("buffer large enough"),
                &source,
                &destination,
            );
            assert_eq!(ours, reference);
        }
    }
}
