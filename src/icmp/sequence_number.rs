/// Echo sequence counter. Starts at 0, advances by one per request and
/// wraps at the u16 boundary.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct SequenceNumber(pub u16);

impl SequenceNumber {
    pub(crate) fn start_value() -> Self {
        SequenceNumber(0)
    }

    /// Returns the current value, then advances.
    pub(crate) fn post_increment(&mut self) -> Self {
        let current = *self;
        self.0 = self.0.wrapping_add(1);
        current
    }
}

impl From<SequenceNumber> for u16 {
    fn from(value: SequenceNumber) -> Self {
        value.0
    }
}

impl From<u16> for SequenceNumber {
    fn from(value: u16) -> Self {
        SequenceNumber(value)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(SequenceNumber(0), SequenceNumber::start_value());
    }

    #[test]
    fn post_increment_returns_the_value_before_advancing() {
        let mut sequence = SequenceNumber::start_value();
        assert_eq!(SequenceNumber(0), sequence.post_increment());
        assert_eq!(SequenceNumber(1), sequence.post_increment());
        assert_eq!(SequenceNumber(2), sequence);
    }

    #[test]
    fn wraps_at_the_u16_boundary() {
        let mut sequence = SequenceNumber(u16::MAX);
        assert_eq!(SequenceNumber(u16::MAX), sequence.post_increment());
        assert_eq!(SequenceNumber(0), sequence);
    }
}
