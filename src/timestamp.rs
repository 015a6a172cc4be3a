use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds on a process-local monotonic clock.
///
/// The value is what gets embedded into an echo payload as eight big-endian
/// bytes, so round-trip arithmetic must stay on this clock. The epoch is the
/// first call in the process; wall-clock adjustments never affect it.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn monotonic_nanos() -> u64 {
    let epoch = *EPOCH.get_or_init(Instant::now);
    Instant::now().duration_since(epoch).as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts as ma;

    #[test]
    fn never_decreases() {
        let first = monotonic_nanos();
        let second = monotonic_nanos();
        ma::assert_le!(first, second);
    }

    #[test]
    fn round_trips_through_big_endian_bytes() {
        let nanos = monotonic_nanos();
        let bytes = nanos.to_be_bytes();
        assert_eq!(nanos, u64::from_be_bytes(bytes));
    }
}
