//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    116.00 / 1.16 = 99.99999999999999  ❌ WRONG!                         │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    11600 * 10000 / 11600 = 10000 cents, exactly                        │
//! │    Every rounding step is explicit and happens once                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mesa_core::money::Money;
//!
//! let order_total = Money::from_cents(11600); // $116.00
//! let tip = order_total.apply_bps(1000);      // 10%
//! assert_eq!(tip.cents(), 1160);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Where Money Flows
/// ```text
/// Order.total_cents ──► Partition total ──► TaxSplit ──► Ticket row
///                                                          │
///           Customer stats ◄── apply_purchase(total) ◄─────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use mesa_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// ## Example
    /// ```rust
    /// use mesa_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(200, 0).cents(), 20000);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Applies a rate in basis points, rounding half away from zero.
    ///
    /// ## Implementation
    /// Integer math in i128: `amount * bps / 10000`, rounded once.
    ///
    /// ## Example
    /// ```rust
    /// use mesa_core::money::Money;
    ///
    /// // 12.5% of $10.01 = 1.25125 → $1.25
    /// assert_eq!(Money::from_cents(1001).apply_bps(1250).cents(), 125);
    /// ```
    pub fn apply_bps(&self, bps: u32) -> Money {
        Money::from_cents(div_round_half_away(self.0 as i128 * bps as i128, 10_000) as i64)
    }
}

/// Integer division rounding half away from zero.
///
/// `denominator` must be positive.
pub(crate) fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display. The web layer does its own localized formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Summing a partition's order totals.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(11600)), "$116.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(12000);
        let b = Money::from_cents(8000);

        assert_eq!((a + b).cents(), 20000);
        assert_eq!((a - b).cents(), 4000);

        let total: Money = vec![a, b].into_iter().sum();
        assert_eq!(total, Money::from_major_minor(200, 0));
    }

    #[test]
    fn test_apply_bps() {
        // 10% of $116.00
        assert_eq!(Money::from_cents(11600).apply_bps(1000).cents(), 1160);
        // 15% of $0.10 = 0.015 → $0.02
        assert_eq!(Money::from_cents(10).apply_bps(1500).cents(), 2);
        assert_eq!(Money::from_cents(-10).apply_bps(1500).cents(), -2);
    }

    #[test]
    fn test_div_round_half_away() {
        assert_eq!(div_round_half_away(5, 10), 1);
        assert_eq!(div_round_half_away(4, 10), 0);
        assert_eq!(div_round_half_away(-5, 10), -1);
        assert_eq!(div_round_half_away(-4, 10), 0);
    }
}
