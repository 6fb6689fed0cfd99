//! Exact currency amounts.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal places used when no precision is configured.
pub const DEFAULT_PRECISION: u32 = 2;

/// Money amount held as integer minor units (cents for a 2-decimal currency).
///
/// Amounts may be negative: a register balance can legitimately be overdrawn.
/// Overflow is an arithmetic bug and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

/// Error returned when a decimal string cannot be read as money.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("empty amount")]
    Empty,

    #[error("invalid amount: {0}")]
    Invalid(String),

    #[error("amount {amount} has more than {precision} decimal places")]
    TooPrecise { amount: String, precision: u32 },

    #[error("amount {0} is out of range")]
    OutOfRange(String),
}

impl Money {
    /// Creates an amount from minor units.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Adds another amount.
    pub fn add(&self, other: Money) -> Money {
        Money(self.0.checked_add(other.0).expect("money overflow on add"))
    }

    /// Subtracts another amount. The result may be negative.
    pub fn subtract(&self, other: Money) -> Money {
        Money(self.0.checked_sub(other.0).expect("money overflow on subtract"))
    }

    /// Adds another amount, or None on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts another amount, or None on overflow.
    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u64) -> Money {
        let quantity = i64::try_from(quantity).expect("money overflow on multiply");
        Money(self.0.checked_mul(quantity).expect("money overflow on multiply"))
    }

    /// Compares two amounts.
    pub fn compare(&self, other: &Money) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// Parses a decimal string ("100.50", "-3", "0.5") at the given precision.
    pub fn parse(input: &str, precision: u32) -> Result<Money, MoneyParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty())
            || !all_digits(whole)
            || !all_digits(fraction)
        {
            return Err(MoneyParseError::Invalid(trimmed.to_string()));
        }

        if fraction.len() > precision as usize {
            return Err(MoneyParseError::TooPrecise {
                amount: trimmed.to_string(),
                precision,
            });
        }

        let out_of_range = || MoneyParseError::OutOfRange(trimmed.to_string());
        let scale = 10i64.checked_pow(precision).ok_or_else(out_of_range)?;
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        let mut frac_units: i64 = 0;
        if !fraction.is_empty() {
            let padded = format!("{fraction:0<width$}", width = precision as usize);
            frac_units = padded.parse().map_err(|_| out_of_range())?;
        }

        let units = whole
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_units))
            .ok_or_else(out_of_range)?;

        Ok(Money(if negative { -units } else { units }))
    }

    /// Returns a formatter rendering the amount with `precision` decimals.
    pub fn display(&self, precision: u32) -> MoneyDisplay {
        MoneyDisplay {
            amount: *self,
            precision,
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.display(DEFAULT_PRECISION), f)
    }
}

/// Decimal rendering of a [`Money`] amount at a fixed precision.
#[derive(Debug, Clone, Copy)]
pub struct MoneyDisplay {
    amount: Money,
    precision: u32,
}

impl std::fmt::Display for MoneyDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let units = self.amount.0.unsigned_abs();
        let sign = if self.amount.0 < 0 { "-" } else { "" };
        if self.precision == 0 {
            return write!(f, "{sign}{units}");
        }
        let scale = 10u64.pow(self.precision);
        write!(
            f,
            "{sign}{}.{:0width$}",
            units / scale,
            units % scale,
            width = self.precision as usize
        )
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money::add(&self, rhs)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        self.subtract(rhs)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = Money::add(self, rhs);
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.subtract(rhs);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
