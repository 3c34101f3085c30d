//! # Tax Splitter
//!
//! Menu prices already include tax. A ticket has to show how much of the
//! total is tax, so the total is decomposed once, at billing time:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total (tax-inclusive)  =  subtotal  +  tax                             │
//! │                                                                         │
//! │  subtotal = round(total / (1 + rate), 2)                                │
//! │  tax      = total - subtotal            (never rounded separately)     │
//! │                                                                         │
//! │  $116.00 at 16%  →  subtotal $100.00, tax $16.00                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because tax is derived by subtraction, `subtotal + tax == total` holds to
//! the cent, not just within a tolerance.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{div_round_half_away, Money};

/// Tax rate in basis points. 1600 bps = 16%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// The 16% rate baked into menu prices.
    pub const STANDARD: TaxRate = TaxRate(1600);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Rate as a percentage (display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::STANDARD
    }
}

/// A tax-inclusive total decomposed into subtotal and tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxSplit {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl TaxSplit {
    /// Splits a tax-inclusive total, rejecting non-positive subtotals.
    ///
    /// ## Example
    /// ```rust
    /// use mesa_core::money::Money;
    /// use mesa_core::tax::{TaxRate, TaxSplit};
    ///
    /// let split = TaxSplit::split(Money::from_cents(11600), TaxRate::STANDARD).unwrap();
    /// assert_eq!(split.subtotal.cents(), 10000);
    /// assert_eq!(split.tax.cents(), 1600);
    /// ```
    pub fn split(total: Money, rate: TaxRate) -> CoreResult<TaxSplit> {
        let split = Self::split_unchecked(total, rate);
        if !split.subtotal.is_positive() {
            return Err(CoreError::InvalidAmount { total });
        }
        Ok(split)
    }

    /// Splits without the positivity check.
    ///
    /// Used for the per-order rows of a multi-order bill, where one order may
    /// legitimately be zero (a comped dish) while the bill as a whole is
    /// positive and has already passed [`TaxSplit::split`].
    pub fn split_unchecked(total: Money, rate: TaxRate) -> TaxSplit {
        let denominator = 10_000 + rate.bps() as i128;
        let subtotal = Money::from_cents(
            div_round_half_away(total.cents() as i128 * 10_000, denominator) as i64,
        );
        TaxSplit {
            subtotal,
            tax: total - subtotal,
            total,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_split() {
        let split = TaxSplit::split(Money::from_cents(11600), TaxRate::STANDARD).unwrap();
        assert_eq!(split.subtotal, Money::from_cents(10000));
        assert_eq!(split.tax, Money::from_cents(1600));
    }

    #[test]
    fn test_split_rounds_subtotal_to_cent() {
        // 100.00 / 1.16 = 86.2068... → 86.21, tax 13.79
        let split = TaxSplit::split(Money::from_cents(10000), TaxRate::STANDARD).unwrap();
        assert_eq!(split.subtotal.cents(), 8621);
        assert_eq!(split.tax.cents(), 1379);

        // 0.01 / 1.16 = 0.00862 → 0.01, tax 0.00
        let split = TaxSplit::split(Money::from_cents(1), TaxRate::STANDARD).unwrap();
        assert_eq!(split.subtotal.cents(), 1);
        assert_eq!(split.tax.cents(), 0);
    }

    #[test]
    fn test_split_always_reconstructs_total() {
        for cents in (1..50_000).step_by(7) {
            let total = Money::from_cents(cents);
            let split = TaxSplit::split(total, TaxRate::STANDARD).unwrap();
            assert_eq!(split.subtotal + split.tax, total, "total {}", cents);
            assert!(split.subtotal.is_positive());
            assert!(!split.tax.is_negative());
        }
    }

    #[test]
    fn test_non_positive_total_rejected() {
        let err = TaxSplit::split(Money::zero(), TaxRate::STANDARD).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));

        let err = TaxSplit::split(Money::from_cents(-500), TaxRate::STANDARD).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
    }

    #[test]
    fn test_unchecked_allows_zero_rows() {
        let split = TaxSplit::split_unchecked(Money::zero(), TaxRate::STANDARD);
        assert!(split.subtotal.is_zero());
        assert!(split.tax.is_zero());
    }

    #[test]
    fn test_custom_rate() {
        // 8% rate: 108.00 → 100.00 + 8.00
        let split = TaxSplit::split(Money::from_cents(10800), TaxRate::from_bps(800)).unwrap();
        assert_eq!(split.subtotal.cents(), 10000);
        assert_eq!(split.tax.cents(), 800);
    }
}
