//! # Cart Math
//!
//! Line-item totals and cart aggregation with the exempt/taxable split.
//!
//! ## Final Price Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  taxable  = Σ non-exempt procedures + Σ promotions + Σ custom entries   │
//! │  exempt   = Σ exempt procedures                                         │
//! │                                                                         │
//! │  grand total = taxable + exempt                                         │
//! │  final price = taxable × (1 + rate) + exempt                            │
//! │                                                                         │
//! │  Example (rate 10%):                                                    │
//! │    Procedure A  ₩50,000 × 2   taxable   ₩100,000                        │
//! │    Procedure B  ₩30,000 × 1   exempt     ₩30,000                        │
//! │    ─────────────────────────────────────────────                        │
//! │    grand ₩130,000        final ₩100,000 × 1.1 + ₩30,000 = ₩140,000     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is a pure function of its inputs: recomputing with the
//! same lines always yields the same totals.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, TaxRate};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Quantity Coercion
// =============================================================================

/// Parses a quantity typed by staff.
///
/// Blank, non-numeric and negative input coerce to 0; large values clamp to
/// [`MAX_ITEM_QUANTITY`]. Never fails.
///
/// ```rust
/// use jade_core::cart::parse_quantity;
///
/// assert_eq!(parse_quantity("3"), 3);
/// assert_eq!(parse_quantity(" 12 "), 12);
/// assert_eq!(parse_quantity("-4"), 0);
/// assert_eq!(parse_quantity("abc"), 0);
/// assert_eq!(parse_quantity(""), 0);
/// ```
pub fn parse_quantity(input: &str) -> u32 {
    // Leading digits win: "3x" → 3.
    let trimmed = input.trim();
    let digits_end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let number = &trimmed[..digits_end];

    match number.parse::<i64>() {
        Ok(q) => clamp_quantity(q),
        // Overflowing digit runs: positive saturates, negative is still 0.
        Err(_) if number.bytes().any(|b| b.is_ascii_digit()) && !number.starts_with('-') => {
            MAX_ITEM_QUANTITY as u32
        }
        Err(_) => 0,
    }
}

/// Clamps a signed quantity into `0..=MAX_ITEM_QUANTITY`.
pub fn clamp_quantity(quantity: i64) -> u32 {
    quantity.clamp(0, MAX_ITEM_QUANTITY) as u32
}

// =============================================================================
// Line Item Calculator
// =============================================================================

/// `unit_price × max(0, quantity)`. Never negative for non-negative prices.
pub fn line_total(unit_price: Money, quantity: i64) -> Money {
    unit_price.multiply_quantity(quantity.max(0))
}

/// Line total including tax; exempt lines are returned unmodified.
pub fn taxed_line_total(
    unit_price: Money,
    quantity: i64,
    is_tax_exempt: bool,
    rate: TaxRate,
) -> Money {
    let total = line_total(unit_price, quantity);
    if is_tax_exempt {
        total
    } else {
        total.with_tax(rate)
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// Where a cart line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LineKind {
    Procedure,
    Promotion,
    Custom,
}

/// A derived cart row. Rebuilt from the selection on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub item_id: String,
    pub name: String,
    pub kind: LineKind,
    pub quantity: u32,
    pub unit_price: Money,
    pub tax_exempt: bool,
}

impl CartLine {
    pub fn procedure(
        item_id: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
        tax_exempt: bool,
    ) -> Self {
        CartLine {
            item_id: item_id.into(),
            name: name.into(),
            kind: LineKind::Procedure,
            quantity,
            unit_price,
            tax_exempt,
        }
    }

    /// Promotions are always taxable.
    pub fn promotion(
        item_id: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        CartLine {
            item_id: item_id.into(),
            name: name.into(),
            kind: LineKind::Promotion,
            quantity,
            unit_price,
            tax_exempt: false,
        }
    }

    /// Custom entries are always taxable.
    pub fn custom(
        item_id: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        CartLine {
            item_id: item_id.into(),
            name: name.into(),
            kind: LineKind::Custom,
            quantity,
            unit_price,
            tax_exempt: false,
        }
    }

    pub fn line_total(&self) -> Money {
        line_total(self.unit_price, self.quantity as i64)
    }

    /// Only procedures can be exempt, whatever the flag says.
    pub fn is_taxable(&self) -> bool {
        !(self.kind == LineKind::Procedure && self.tax_exempt)
    }
}

// =============================================================================
// Cart Aggregator
// =============================================================================

/// Cart totals for the summary panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: u64,
    pub grand_total: Money,
    pub taxable_subtotal: Money,
    pub exempt_subtotal: Money,
    pub tax: Money,
    pub final_price: Money,
}

/// Stateless aggregation over cart lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartAggregator {
    tax_rate: TaxRate,
}

impl CartAggregator {
    pub fn new(tax_rate: TaxRate) -> Self {
        CartAggregator { tax_rate }
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    /// Sum of untaxed line totals; zero-quantity lines contribute nothing.
    pub fn grand_total(&self, lines: &[CartLine]) -> Money {
        lines.iter().map(CartLine::line_total).sum()
    }

    /// `taxable × (1 + rate) + exempt`.
    pub fn final_price(&self, lines: &[CartLine]) -> Money {
        let (taxable, exempt) = self.split(lines);
        taxable.with_tax(self.tax_rate) + exempt
    }

    /// Lines with quantity > 0, in their original order.
    pub fn selected_lines<'a>(&self, lines: &'a [CartLine]) -> Vec<&'a CartLine> {
        lines.iter().filter(|line| line.quantity > 0).collect()
    }

    pub fn totals(&self, lines: &[CartLine]) -> CartTotals {
        let (taxable, exempt) = self.split(lines);
        let tax = taxable.calculate_tax(self.tax_rate);
        let selected = self.selected_lines(lines);

        CartTotals {
            item_count: selected.len(),
            total_quantity: selected.iter().map(|l| l.quantity as u64).sum(),
            grand_total: taxable + exempt,
            taxable_subtotal: taxable,
            exempt_subtotal: exempt,
            tax,
            final_price: taxable + tax + exempt,
        }
    }

    fn split(&self, lines: &[CartLine]) -> (Money, Money) {
        lines.iter().fold(
            (Money::zero(), Money::zero()),
            |(taxable, exempt), line| {
                if line.is_taxable() {
                    (taxable + line.line_total(), exempt)
                } else {
                    (taxable, exempt + line.line_total())
                }
            },
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
