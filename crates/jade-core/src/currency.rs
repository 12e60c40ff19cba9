//! # Currency Conversion
//!
//! Renders a KRW amount in a display currency using an injected rate table.
//!
//! ## Conversion Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    convert(₩140,000, USD, rates)                        │
//! │                                                                         │
//! │  target == KRW? ──yes──► "₩140,000"                                     │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  rates[USD] usable? ──no──► "₩140,000" (fallback, converted = false)    │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  140,000 × 0.00072 = 100.8 ──► "$100.80"                                │
//! │                                 + reference line "₩140,000"             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Formatting Rules
//! | Currency | Example          | Notes                                  |
//! |----------|------------------|----------------------------------------|
//! | KRW      | `₩1,234,567`     | base currency, whole won               |
//! | USD      | `$1,234.56`      |                                        |
//! | GBP      | `£1,234.56`      |                                        |
//! | CAD      | `$1,234.56`      | en-CA shows a bare `$`                 |
//! | AUD      | `$1,234.56`      | en-AU shows a bare `$`                 |
//! | EUR      | `1.234,56 €`     | de-DE grouping, trailing symbol        |
//! | QAR      | `QAR 1,234.56`   | explicit prefix, never RTL placement   |
//! | IDR      | `IDR 1.23M`      | `B` ≥ 1e9, `M` ≥ 1e6, else `IDR 12.345`|
//!
//! A missing rate is never treated as zero.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{group_digits, Money};

// =============================================================================
// Currency
// =============================================================================

/// Display currencies offered by the configurator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Currency {
    #[default]
    Krw,
    Usd,
    Eur,
    Qar,
    Idr,
    Gbp,
    Cad,
    Aud,
}

impl Currency {
    /// Selector order.
    pub const ALL: [Currency; 8] = [
        Currency::Krw,
        Currency::Usd,
        Currency::Eur,
        Currency::Qar,
        Currency::Idr,
        Currency::Gbp,
        Currency::Cad,
        Currency::Aud,
    ];

    /// ISO 4217 code.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Krw => "KRW",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Qar => "QAR",
            Currency::Idr => "IDR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }

    /// Label for the currency selector.
    pub const fn label(&self) -> &'static str {
        match self {
            Currency::Krw => "KRW (₩)",
            Currency::Usd => "USD ($)",
            Currency::Eur => "EUR (€)",
            Currency::Qar => "QAR",
            Currency::Idr => "IDR (Rp)",
            Currency::Gbp => "GBP (£)",
            Currency::Cad => "CAD (C$)",
            Currency::Aud => "AUD (A$)",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| {
                ValidationError::not_allowed("currency", Currency::ALL.iter().map(|c| c.code()))
            })
    }
}

// =============================================================================
// Rate Table
// =============================================================================

/// Exchange rates from the base currency: `1 base = rate × target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RateTable {
    pub base: Currency,
    pub rates: BTreeMap<Currency, f64>,

    /// When the rates were fetched; `None` for hand-built tables.
    #[ts(as = "Option<String>")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl RateTable {
    /// A table with no rates: every conversion falls back to the base.
    pub fn empty(base: Currency) -> Self {
        RateTable {
            base,
            rates: BTreeMap::new(),
            fetched_at: None,
        }
    }

    pub fn new(base: Currency, rates: BTreeMap<Currency, f64>, fetched_at: DateTime<Utc>) -> Self {
        RateTable {
            base,
            rates,
            fetched_at: Some(fetched_at),
        }
    }

    /// The usable rate for `currency`.
    ///
    /// Zero, negative and non-finite entries count as missing.
    pub fn rate(&self, currency: Currency) -> Option<f64> {
        if currency == self.base {
            return Some(1.0);
        }
        self.rates
            .get(&currency)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    /// True when the table is older than `max_age` at `now`.
    ///
    /// Tables without a timestamp never go stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.fetched_at
            .map(|fetched| now.signed_duration_since(fetched) > max_age)
            .unwrap_or(false)
    }
}

// =============================================================================
// Display Value
// =============================================================================

/// A rendered amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DisplayValue {
    /// Currency the user asked for.
    pub requested: Currency,

    /// Currency `text` is actually in.
    pub currency: Currency,

    pub text: String,

    /// Base-currency line shown under a converted amount.
    pub base_reference: Option<String>,

    /// False when the amount is shown in the base currency (either requested
    /// or because no rate was available).
    pub converted: bool,
}

impl DisplayValue {
    /// True when a foreign currency was requested but no rate was usable.
    pub fn is_fallback(&self) -> bool {
        self.requested != self.currency
    }
}

// =============================================================================
// Currency Converter
// =============================================================================

/// Presentation transform from base-currency amounts to display strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrencyConverter {
    base: Currency,
}

impl CurrencyConverter {
    pub fn new(base: Currency) -> Self {
        CurrencyConverter { base }
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    /// Converts and formats `amount`. Never fails.
    pub fn convert(&self, amount: Money, target: Currency, rates: &RateTable) -> DisplayValue {
        let base_text = format_amount(amount.won() as f64, self.base);

        if target == self.base {
            return DisplayValue {
                requested: target,
                currency: self.base,
                text: base_text,
                base_reference: None,
                converted: false,
            };
        }

        let rate = if rates.base == self.base {
            rates.rate(target)
        } else {
            None
        };

        match rate {
            Some(rate) => DisplayValue {
                requested: target,
                currency: target,
                text: format_amount(amount.won() as f64 * rate, target),
                base_reference: Some(base_text),
                converted: true,
            },
            None => DisplayValue {
                requested: target,
                currency: self.base,
                text: base_text,
                base_reference: None,
                converted: false,
            },
        }
    }
}

/// Formats a value already expressed in `currency`.
pub fn format_amount(value: f64, currency: Currency) -> String {
    match currency {
        Currency::Krw => with_sign(value, |v| format!("₩{}", fixed(v, 0, ',', '.'))),
        Currency::Usd | Currency::Cad | Currency::Aud => {
            with_sign(value, |v| format!("${}", fixed(v, 2, ',', '.')))
        }
        Currency::Gbp => with_sign(value, |v| format!("£{}", fixed(v, 2, ',', '.'))),
        Currency::Eur => with_sign(value, |v| format!("{} €", fixed(v, 2, '.', ','))),
        Currency::Qar => with_sign(value, |v| format!("QAR {}", fixed(v, 2, ',', '.'))),
        Currency::Idr => format_idr(value),
    }
}

/// The suffix is picked after rounding, so a value that rounds up to the
/// next unit is shown in that unit.
fn format_idr(value: f64) -> String {
    const BILLION: f64 = 1_000_000_000.0;
    const MILLION: f64 = 1_000_000.0;

    let rupiah = value.round();
    let millions_x100 = (rupiah / 10_000.0).round();

    if millions_x100 >= 100_000.0 {
        format!("IDR {:.2}B", rupiah / BILLION)
    } else if rupiah >= MILLION {
        format!("IDR {:.2}M", millions_x100 / 100.0)
    } else {
        with_sign(value, |v| format!("IDR {}", fixed(v, 0, '.', ',')))
    }
}

fn with_sign(value: f64, render: impl Fn(f64) -> String) -> String {
    let body = render(value.abs());
    if value < 0.0 && rounds_nonzero(value) {
        format!("-{body}")
    } else {
        body
    }
}

fn rounds_nonzero(value: f64) -> bool {
    (value.abs() * 100.0).round() != 0.0
}

/// Fixed-point rendering with grouping. Input must be non-negative.
fn fixed(value: f64, decimals: u32, thousands: char, decimal: char) -> String {
    let scale = 10u128.pow(decimals);
    // `as` saturates, so absurd magnitudes cannot wrap.
    let scaled = (value * scale as f64).round() as u128;
    let mut out = group_digits(scaled / scale, thousands);

    if decimals > 0 {
        out.push(decimal);
        out.push_str(&format!(
            "{:0width$}",
            scaled % scale,
            width = decimals as usize
        ));
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(Currency, f64)]) -> RateTable {
        RateTable {
            base: Currency::Krw,
            rates: entries.iter().copied().collect(),
            fetched_at: None,
        }
    }

    #[test]
    fn test_base_currency_passthrough() {
        let converter = CurrencyConverter::new(Currency::Krw);
        let value = converter.convert(Money::from_won(140_000), Currency::Krw, &table(&[]));

        assert_eq!(value.text, "₩140,000");
        assert_eq!(value.base_reference, None);
        assert!(!value.converted);
        assert!(!value.is_fallback());
    }

    #[test]
    fn test_converted_amount_carries_base_reference() {
        let converter = CurrencyConverter::new(Currency::Krw);
        let value = converter.convert(
            Money::from_won(140_000),
            Currency::Usd,
            &table(&[(Currency::Usd, 0.00072)]),
        );

        assert_eq!(value.text, "$100.80");
        assert_eq!(value.base_reference.as_deref(), Some("₩140,000"));
        assert_eq!(value.currency, Currency::Usd);
        assert!(value.converted);
    }

    #[test]
    fn test_missing_rate_falls_back_to_base() {
        let converter = CurrencyConverter::new(Currency::Krw);
        let amount = Money::from_won(1_234_567);

        for rates in [
            table(&[]),
            table(&[(Currency::Usd, 0.0)]),
            table(&[(Currency::Usd, f64::NAN)]),
            table(&[(Currency::Usd, -1.0)]),
        ] {
            let value = converter.convert(amount, Currency::Usd, &rates);
            assert_eq!(value.text, "₩1,234,567");
            assert_eq!(value.currency, Currency::Krw);
            assert_eq!(value.requested, Currency::Usd);
            assert!(value.is_fallback());
            assert!(!value.converted);
        }
    }

    #[test]
    fn test_rate_table_for_other_base_is_unusable() {
        let converter = CurrencyConverter::new(Currency::Krw);
        let mut rates = table(&[(Currency::Eur, 0.9)]);
        rates.base = Currency::Usd;

        let value = converter.convert(Money::from_won(10_000), Currency::Eur, &rates);
        assert!(value.is_fallback());
    }

    #[test]
    fn test_format_rules() {
        assert_eq!(format_amount(1234.5, Currency::Usd), "$1,234.50");
        assert_eq!(format_amount(1234.567, Currency::Gbp), "£1,234.57");
        assert_eq!(format_amount(1234.5, Currency::Cad), "$1,234.50");
        assert_eq!(format_amount(0.004, Currency::Aud), "$0.00");
        assert_eq!(format_amount(1234.56, Currency::Eur), "1.234,56 €");
        assert_eq!(format_amount(1234.56, Currency::Qar), "QAR 1,234.56");
        assert_eq!(format_amount(1_234_567.0, Currency::Krw), "₩1,234,567");
        assert_eq!(format_amount(-12.5, Currency::Usd), "-$12.50");
    }

    #[test]
    fn test_idr_abbreviation_thresholds() {
        assert_eq!(format_amount(12_345.4, Currency::Idr), "IDR 12.345");
        assert_eq!(format_amount(999_999.0, Currency::Idr), "IDR 999.999");
        assert_eq!(format_amount(1_000_000.0, Currency::Idr), "IDR 1.00M");
        assert_eq!(format_amount(12_345_678.0, Currency::Idr), "IDR 12.35M");
        assert_eq!(format_amount(2_500_000_000.0, Currency::Idr), "IDR 2.50B");
    }

    #[test]
    fn test_idr_suffix_follows_rounding() {
        assert_eq!(format_amount(999_999.4, Currency::Idr), "IDR 999.999");
        assert_eq!(format_amount(999_999.6, Currency::Idr), "IDR 1.00M");
        assert_eq!(format_amount(999_994_999.0, Currency::Idr), "IDR 999.99M");
        assert_eq!(format_amount(999_995_000.0, Currency::Idr), "IDR 1.00B");
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" IDR ".parse::<Currency>().unwrap(), Currency::Idr);
        assert!("JPY".parse::<Currency>().is_err());
        assert_eq!(Currency::Qar.to_string(), "QAR");
    }

    #[test]
    fn test_rate_table_staleness() {
        let fetched = Utc::now();
        let rates = RateTable::new(Currency::Krw, BTreeMap::new(), fetched);

        assert!(!rates.is_stale(fetched + Duration::minutes(5), Duration::minutes(15)));
        assert!(rates.is_stale(fetched + Duration::minutes(16), Duration::minutes(15)));
        assert!(!RateTable::empty(Currency::Krw).is_stale(fetched, Duration::zero()));
    }

    #[test]
    fn test_currency_serializes_as_code() {
        assert_eq!(serde_json::to_string(&Currency::Krw).unwrap(), "\"KRW\"");
        let parsed: Currency = serde_json::from_str("\"AUD\"").unwrap();
        assert_eq!(parsed, Currency::Aud);
    }
}
