//! # Money Module
//!
//! Provides the `Money` type for Korean won amounts and the `TaxRate` used
//! to turn a subtotal into a final price.
//!
//! ## Why Integer Won?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    100000 * 1.1 = 110000.00000000001  ❌ WRONG!                         │
//! │                                                                         │
//! │  KRW has no minor unit, so every catalog price is a whole number of    │
//! │  won. We keep it that way all the way to the final price:              │
//! │    100000 won + tax(100000 won @ 1000 bps) = 110000 won  ✅             │
//! │                                                                         │
//! │  Floats only appear when converting to a foreign display currency.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use jade_core::money::{Money, TaxRate};
//!
//! let price = Money::from_won(50_000);
//! let line = price * 2_i64;
//! let tax = line.calculate_tax(TaxRate::from_bps(1000));
//!
//! assert_eq!(line.won(), 100_000);
//! assert_eq!(tax.won(), 10_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole Korean won.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Procedure.prices[tier] ──┬──► CartLine.unit_price ──► line total       │
/// │  Promotion.price ─────────┤                                             │
/// │  CustomCartEntry.price ───┘                                             │
/// │                                                                         │
/// │  line totals ──► grand total ──► tax split ──► final price              │
/// │                                      │                                  │
/// │                                      └──► CurrencyConverter (display)   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole won.
    #[inline]
    pub const fn from_won(won: i64) -> Self {
        Money(won)
    }

    /// Converts a price read from a wire record.
    ///
    /// Returns `None` for NaN/infinite input. Fractional won are rounded to
    /// the nearest whole won (the REST layer serialises numbers as floats).
    pub fn from_wire(value: f64) -> Option<Self> {
        if !value.is_finite() || value.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Money(value.round() as i64))
    }

    /// Returns the amount in won.
    #[inline]
    pub const fn won(&self) -> i64 {
        self.0
    }

    /// Returns zero won.
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

    /// Calculates tax on this amount.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, i.e. round half up for
    /// positive amounts. `i128` prevents overflow on large carts.
    ///
    /// ## Example
    /// ```rust
    /// use jade_core::money::{Money, TaxRate};
    ///
    /// let tax = Money::from_won(12_345).calculate_tax(TaxRate::from_bps(1000));
    /// // 1234.5 → 1235
    /// assert_eq!(tax.won(), 1_235);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money(tax as i64)
    }

    /// Returns this amount with tax added: `amount * (1 + rate)`.
    pub fn with_tax(&self, rate: TaxRate) -> Money {
        *self + self.calculate_tax(rate)
    }

    /// Multiplies by a quantity, saturating instead of overflowing.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

/// Renders the amount the way the configurator shows won: `₩1,234,567`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}₩{}",
            sign,
            group_digits(self.0.unsigned_abs() as u128, ',')
        )
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        self.multiply_quantity(qty as i64)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so the clinic's standard 10% VAT is `1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// The clinic's standard rate (10%).
    pub const STANDARD: TaxRate = TaxRate(1000);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (`10.0` → 1000 bps).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round().max(0.0) as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::STANDARD
    }
}

// =============================================================================
// Digit Grouping
// =============================================================================

/// Inserts a thousands separator every three digits.
///
/// Shared by the won display and the foreign-currency formatters.
pub fn group_digits(value: u128, separator: char) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let lead = digits.len() % 3;

    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - lead) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_won() {
        let money = Money::from_won(45_000);
        assert_eq!(money.won(), 45_000);
        assert!(money.is_positive());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_won(0).to_string(), "₩0");
        assert_eq!(Money::from_won(999).to_string(), "₩999");
        assert_eq!(Money::from_won(1_000).to_string(), "₩1,000");
        assert_eq!(Money::from_won(1_234_567).to_string(), "₩1,234,567");
        assert_eq!(Money::from_won(-50_000).to_string(), "-₩50,000");
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0, ','), "0");
        assert_eq!(group_digits(12, ','), "12");
        assert_eq!(group_digits(123_456, '.'), "123.456");
        assert_eq!(group_digits(1_234_567_890, ','), "1,234,567,890");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_won(100_000);
        let b = Money::from_won(30_000);

        assert_eq!((a + b).won(), 130_000);
        assert_eq!((a - b).won(), 70_000);
        assert_eq!((b * 3_i64).won(), 90_000);
        assert_eq!((b * 2_u32).won(), 60_000);

        let total: Money = [a, b].iter().sum();
        assert_eq!(total.won(), 130_000);
    }

    #[test]
    fn test_tax_calculation_standard_rate() {
        let amount = Money::from_won(100_000);
        assert_eq!(amount.calculate_tax(TaxRate::STANDARD).won(), 10_000);
        assert_eq!(amount.with_tax(TaxRate::STANDARD).won(), 110_000);
    }

    #[test]
    fn test_tax_calculation_rounds_half_up() {
        // 12,345 × 10% = 1,234.5 → 1,235
        let amount = Money::from_won(12_345);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(1000)).won(), 1_235);
    }

    #[test]
    fn test_from_wire() {
        assert_eq!(Money::from_wire(50_000.0), Some(Money::from_won(50_000)));
        assert_eq!(Money::from_wire(49_999.6), Some(Money::from_won(50_000)));
        assert_eq!(Money::from_wire(f64::NAN), None);
        assert_eq!(Money::from_wire(f64::INFINITY), None);
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        assert_eq!(TaxRate::from_percentage(10.0).bps(), 1000);
        assert_eq!(TaxRate::from_percentage(8.25).bps(), 825);
        assert!((TaxRate::from_bps(1000).percentage() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_multiply_saturates() {
        let huge = Money::from_won(i64::MAX / 2);
        assert_eq!(huge.multiply_quantity(4).won(), i64::MAX);
    }
}
