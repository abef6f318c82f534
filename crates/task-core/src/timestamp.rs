//! Engine clock

use std::fmt;

pub const MICROS_PER_MILLI: i64 = 1_000;
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// Packet timestamp in microseconds.
///
/// `Timestamp::unset()` marks packets the caller did not time; the task runner
/// assigns those itself in single-image mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn new(micros: i64) -> Self {
        Self(micros)
    }

    pub const fn unset() -> Self {
        Self(i64::MIN)
    }

    /// Saturating conversion from milliseconds. Never yields the unset
    /// sentinel.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(MICROS_PER_MILLI).max(i64::MIN + 1))
    }

    /// Exact conversion from milliseconds; `None` when the value does not
    /// fit the microsecond clock.
    pub fn checked_from_millis(millis: i64) -> Option<Self> {
        millis
            .checked_mul(MICROS_PER_MILLI)
            .filter(|&micros| micros != i64::MIN)
            .map(Self)
    }

    pub const fn value(self) -> i64 {
        self.0
    }

    pub const fn is_unset(self) -> bool {
        self.0 == i64::MIN
    }

    /// Truncating conversion back to the caller's millisecond clock
    pub fn to_millis(self) -> i64 {
        self.0 / MICROS_PER_MILLI
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::unset()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            write!(f, "Timestamp::Unset()")
        } else {
            write!(f, "{}us", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_scaling() {
        let ts = Timestamp::from_millis(100);
        assert_eq!(ts.value(), 100_000);
        assert_eq!(ts.to_millis(), 100);
    }

    #[test]
    fn test_unset_sentinel() {
        assert!(Timestamp::unset().is_unset());
        assert!(Timestamp::default().is_unset());
        assert!(!Timestamp::new(0).is_unset());
        assert!(Timestamp::unset() < Timestamp::new(i64::MIN + 1));
    }

    #[test]
    fn test_out_of_range_millis() {
        let too_early = i64::MIN / MICROS_PER_MILLI - 1;
        assert_eq!(Timestamp::checked_from_millis(too_early), None);
        assert_eq!(Timestamp::checked_from_millis(i64::MAX), None);
        assert!(!Timestamp::from_millis(too_early).is_unset());
        assert_eq!(
            Timestamp::checked_from_millis(-5),
            Some(Timestamp::new(-5_000))
        );
    }
}
