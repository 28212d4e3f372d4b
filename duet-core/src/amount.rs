use serde::{Deserialize, Serialize};
use std::fmt;

/// A quantity of fungible sub-units.
///
/// All arithmetic on balances and allowances goes through the checked
/// operations below; overflow and underflow are surfaced to callers instead
/// of wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Amount(u128);

impl Amount {
    /// The largest representable amount. An allowance of this value is
    /// treated as unlimited and is never debited.
    pub const MAX: Amount = Amount(u128::MAX);

    pub const fn new(raw: u128) -> Self {
        Amount(raw)
    }

    pub const fn zero() -> Self {
        Amount(0)
    }

    /// Get the raw sub-unit count
    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Add, returning None on overflow
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Subtract, returning None if `rhs` exceeds `self`
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Number of whole units contained in this amount.
    ///
    /// `unit` is the sub-units-per-unit constant and must be non-zero; the
    /// ledger validates it once at construction.
    pub fn whole_units(self, unit: Amount) -> u128 {
        self.0 / unit.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(raw: u128) -> Self {
        Amount(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_add() {
        let a = Amount::new(100);
        let b = Amount::new(50);
        assert_eq!(a.checked_add(b), Some(Amount::new(150)));
        assert_eq!(Amount::MAX.checked_add(Amount::new(1)), None);
    }

    #[test]
    fn test_checked_sub() {
        let a = Amount::new(100);
        assert_eq!(a.checked_sub(Amount::new(40)), Some(Amount::new(60)));
        assert_eq!(a.checked_sub(Amount::new(101)), None);
    }

    #[test]
    fn test_whole_units_floors() {
        let unit = Amount::new(1000);
        assert_eq!(Amount::new(0).whole_units(unit), 0);
        assert_eq!(Amount::new(999).whole_units(unit), 0);
        assert_eq!(Amount::new(1000).whole_units(unit), 1);
        assert_eq!(Amount::new(2500).whole_units(unit), 2);
    }

    #[test]
    fn test_zero() {
        assert!(Amount::zero().is_zero());
        assert!(!Amount::new(1).is_zero());
    }
}
