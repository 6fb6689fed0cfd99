//! Stock quantities.

use serde::{Deserialize, Serialize};

/// Quantity on hand or in transit, in whole article units.
///
/// Unsigned by construction: a lot can never hold a negative quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u64);

impl Quantity {
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two quantities, returning None on overflow.
    pub fn checked_add(&self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    /// Subtracts, returning None if the result would be negative.
    pub fn checked_sub(&self, other: Quantity) -> Option<Quantity> {
        self.0.checked_sub(other.0).map(Quantity)
    }

    /// Returns how much `other` exceeds `self`, or zero.
    pub fn shortfall_for(&self, other: Quantity) -> Quantity {
        Quantity(other.0.saturating_sub(self.0))
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Quantity {
    fn from(units: u64) -> Self {
        Self(units)
    }
}

impl std::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        Quantity(iter.map(|q| q.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_sub_refuses_to_go_negative() {
        let on_hand = Quantity::new(2);
        assert_eq!(on_hand.checked_sub(Quantity::new(2)), Some(Quantity::zero()));
        assert_eq!(on_hand.checked_sub(Quantity::new(5)), None);
    }

    #[test]
    fn shortfall_is_the_missing_amount() {
        let on_hand = Quantity::new(2);
        assert_eq!(on_hand.shortfall_for(Quantity::new(5)), Quantity::new(3));
        assert_eq!(on_hand.shortfall_for(Quantity::new(1)), Quantity::zero());
    }

    #[test]
    fn checked_add_detects_overflow() {
        assert_eq!(Quantity::new(u64::MAX).checked_add(Quantity::new(1)), None);
        assert_eq!(
            Quantity::new(4).checked_add(Quantity::new(6)),
            Some(Quantity::new(10))
        );
    }
}
