//! Scan-length budget applied to signature matching.

use serde::{Deserialize, Serialize};

/// How many bytes from the start (or end) of a resource a signature may inspect.
///
/// The wire representation is a signed byte count where any negative value
/// means "scan everything", so `ScanBudget::from(-1)` is [`ScanBudget::Unlimited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ScanBudget {
    /// No limit; every byte of the resource may be read.
    #[default]
    Unlimited,
    /// At most this many bytes from the anchor.
    Bytes(u64),
}

impl ScanBudget {
    /// Clamp a resource length to this budget.
    #[inline]
    pub fn limit(self, length: u64) -> u64 {
        match self {
            ScanBudget::Unlimited => length,
            ScanBudget::Bytes(max) => length.min(max),
        }
    }
}

impl From<i64> for ScanBudget {
    fn from(value: i64) -> Self {
        if value < 0 {
            ScanBudget::Unlimited
        } else {
            ScanBudget::Bytes(value as u64)
        }
    }
}

impl From<ScanBudget> for i64 {
    fn from(value: ScanBudget) -> Self {
        match value {
            ScanBudget::Unlimited => -1,
            ScanBudget::Bytes(max) => i64::try_from(max).unwrap_or(i64::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_is_unlimited() {
        assert_eq!(ScanBudget::from(-1), ScanBudget::Unlimited);
        assert_eq!(ScanBudget::from(i64::MIN), ScanBudget::Unlimited);
        assert_eq!(ScanBudget::from(0), ScanBudget::Bytes(0));
    }

    #[test]
    fn test_limit() {
        let budget = ScanBudget::Bytes(8);
        assert_eq!(budget.limit(100), 8);
        assert_eq!(budget.limit(4), 4);
        assert_eq!(ScanBudget::Unlimited.limit(100), 100);
    }

    #[test]
    fn test_round_trip_to_i64() {
        assert_eq!(i64::from(ScanBudget::Unlimited), -1);
        assert_eq!(i64::from(ScanBudget::Bytes(4096)), 4096);
    }
}
