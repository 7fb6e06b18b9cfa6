//! # Money Module
//!
//! Integer money for the ledger, plus the finer-grained unit cost used for
//! raw materials.
//!
//! ## Two Scales
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Money     i64 cents        journal lines, invoices, expenses, COGS    │
//! │  UnitCost  i64 millicents   cost per stocking unit of a raw item       │
//! │                                                                         │
//! │  Beans: 25.00 per kg  →  2.5 cents per g  →  UnitCost(2_500)           │
//! │                                                                         │
//! │  line cost = round_half_away(quantity × millicents / 1000)  → cents    │
//! │  COGS      = Σ line cost                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quantities are measured, so they stay `f64`. Every amount that reaches the
//! journal is whole cents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Millicents per cent.
pub const MILLICENTS_PER_CENT: i64 = 1_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed: balances and report lines can go negative even though journal
/// lines never do.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use cafe_core::money::Money;
    ///
    /// let price = Money::from_cents(450);
    /// assert_eq!(price.cents(), 450);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Calculates VAT on this amount, rounding half up on the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, widened to i128.
    ///
    /// ```rust
    /// use cafe_core::money::Money;
    /// use cafe_core::types::TaxRate;
    ///
    /// // 10.00 at 14% VAT
    /// let vat = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(1400));
    /// assert_eq!(vat.cents(), 140);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by an item count.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Cost
// =============================================================================

/// Cost of one stocking unit of a raw item, in millicents (1/1000 cent).
///
/// ## Why not cents?
/// A gram of espresso beans costs a fraction of a cent. Storing 2.5¢/g as
/// cents would either round it to 3¢ (20% error on every shot) or force
/// floats into the ledger. Millicents keep the price exact and the rounding
/// happens once per costed line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct UnitCost(i64);

impl UnitCost {
    #[inline]
    pub const fn from_millicents(millicents: i64) -> Self {
        UnitCost(millicents)
    }

    /// Unit cost of a whole number of cents per stocking unit.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        UnitCost(cents * MILLICENTS_PER_CENT)
    }

    #[inline]
    pub const fn millicents(&self) -> i64 {
        self.0
    }

    /// Cost of `quantity` stocking units, rounded half away from zero to
    /// whole cents.
    ///
    /// ```rust
    /// use cafe_core::money::{Money, UnitCost};
    ///
    /// // 18 g at 2.5 cents per gram
    /// assert_eq!(UnitCost::from_millicents(2_500).cost_of(18.0), Money::from_cents(45));
    /// // 0.3 g at 2.5 cents per gram = 0.75 cents
    /// assert_eq!(UnitCost::from_millicents(2_500).cost_of(0.3), Money::from_cents(1));
    /// ```
    pub fn cost_of(&self, quantity: f64) -> Money {
        let cents = quantity * self.0 as f64 / MILLICENTS_PER_CENT as f64;
        Money::from_cents(cents.round() as i64)
    }

    /// Unit cost from a purchase: total paid divided by units received.
    ///
    /// Returns `None` when nothing was received.
    pub fn from_purchase(total: Money, quantity: f64) -> Option<Self> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return None;
        }
        let millicents = total.cents() as f64 * MILLICENTS_PER_CENT as f64 / quantity;
        Some(UnitCost(millicents.round() as i64))
    }
}

impl fmt::Display for UnitCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}c", self.0 / MILLICENTS_PER_CENT, (self.0 % MILLICENTS_PER_CENT).abs())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(format!("{}", Money::zero()), "0.00");
        assert_eq!(format!("{}", UnitCost::from_millicents(2_500)), "2.500c");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);

        assert_eq!((a + b).cents(), 1250);
        assert_eq!((a - b).cents(), 750);
        assert_eq!((-a).cents(), -1000);
        assert_eq!((b * 4).cents(), 1000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 1500);
    }

    #[test]
    fn test_vat_calculation() {
        // 3.50 at 14% = 0.49
        let vat = Money::from_cents(350).calculate_tax(TaxRate::from_bps(1400));
        assert_eq!(vat.cents(), 49);

        // 0.25 at 14% = 0.035 → 0.04
        let vat = Money::from_cents(25).calculate_tax(TaxRate::from_bps(1400));
        assert_eq!(vat.cents(), 4);
    }

    #[test]
    fn test_unit_cost_rounds_half_away_from_zero() {
        let cost = UnitCost::from_millicents(500); // 0.5 cents per unit
        assert_eq!(cost.cost_of(1.0).cents(), 1);
        assert_eq!(cost.cost_of(3.0).cents(), 2); // 1.5 → 2
        assert_eq!(cost.cost_of(-3.0).cents(), -2);
        assert_eq!(cost.cost_of(0.0).cents(), 0);
    }

    #[test]
    fn test_unit_cost_from_purchase() {
        // 1 kg of beans for 25.00, stocked in grams
        let cost = UnitCost::from_purchase(Money::from_cents(2500), 1000.0);
        assert_eq!(cost, Some(UnitCost::from_millicents(2_500)));

        assert_eq!(UnitCost::from_purchase(Money::from_cents(2500), 0.0), None);
        assert_eq!(UnitCost::from_cents(3).millicents(), 3_000);
    }
}
