use std::fmt;

use thiserror::Error;

/// Errors raised when building a [`Money`] value from an untrusted float.
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("amount {0} is negative")]
    Negative(f64),
    #[error("amount {0} is not a finite number")]
    NotFinite(f64),
    #[error("amount {0} exceeds the largest supported amount")]
    TooLarge(f64),
}

/// Non-negative ZAR amount with 2 decimal places, stored as cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(u64);

impl Money {
    const SCALE: u64 = 100;

    /// One whole, expressed in basis points.
    pub const FULL_BASIS_POINTS: u32 = 10_000;

    /// Largest amount accepted from untrusted input, in whole units.
    pub const MAX_UNITS: u64 = 1_000_000_000_000;

    pub const ZERO: Money = Money(0);

    /// Whole rand amount; saturates instead of overflowing.
    pub const fn from_units(units: u64) -> Self {
        Money(units.saturating_mul(Self::SCALE))
    }

    pub const fn from_cents(cents: u64) -> Self {
        Money(cents)
    }

    pub fn try_from_float(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite(value));
        }
        if value < 0.0 {
            return Err(MoneyError::Negative(value));
        }
        if value > Self::MAX_UNITS as f64 {
            return Err(MoneyError::TooLarge(value));
        }
        Ok(Money((value * Self::SCALE as f64).round() as u64))
    }

    pub fn cents(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Take `basis_points` / 10 000 of the amount, rounded half-up to the
    /// nearest whole unit. Shares above one whole are capped at the full amount.
    pub fn share_rounded(self, basis_points: u32) -> Self {
        let basis_points = u128::from(basis_points.min(Self::FULL_BASIS_POINTS));
        let divisor = u128::from(Self::SCALE) * u128::from(Self::FULL_BASIS_POINTS);
        let units = (u128::from(self.0) * basis_points + divisor / 2) / divisor;
        Money::from_units(u64::try_from(units).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::SCALE;
        let frac = self.0 % Self::SCALE;
        write!(f, "{whole}.{frac:02}")
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

/// Saturates at zero; money never goes negative.
impl std::ops::Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}
