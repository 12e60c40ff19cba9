//! # jade-core: Pure Pricing Logic for Jade Pricing
//!
//! This crate holds every pricing rule of the clinic configurator as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Jade Pricing Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 jade-quote CLI / UI bindings                    │   │
//! │  │   tiers ──► procedure & promotion tables ──► cart summary       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                jade-session (boundary)                          │   │
//! │  │   config, catalog/rate fetch, CSV import, fetch guards          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ jade-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  rules   │ │ pricing  │ │   cart   │ │    currency      │  │   │
//! │  │   │ tiers &  │ │ resolver │ │  lines & │ │  converter &     │  │   │
//! │  │   │ agencies │ │ tax-free │ │  totals  │ │  formatting      │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO CLOCK READS • PURE FUNCTIONS        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Procedure, Promotion, tier codes)
//! - [`money`] - Whole-won `Money` and basis-point `TaxRate`
//! - [`rules`] - Category rules: agencies, promotion suppression
//! - [`pricing`] - Per-tier price resolution and tax exemptions
//! - [`cart`] - Line totals, quantity coercion, cart aggregation
//! - [`currency`] - Display-currency conversion and formatting
//! - [`catalog`] - Validated catalog and wire-record decoding
//! - [`selection`] - Selection state and quote derivation
//! - [`error`] - Domain error types
//! - [`validation`] - Boundary validation
//!
//! ## Example Usage
//!
//! ```rust
//! use jade_core::cart::{CartAggregator, CartLine};
//! use jade_core::money::{Money, TaxRate};
//!
//! let lines = vec![
//!     CartLine::procedure("a", "Botox", 2, Money::from_won(50_000), false),
//!     CartLine::procedure("b", "Numbing cream", 1, Money::from_won(30_000), true),
//! ];
//! let totals = CartAggregator::new(TaxRate::STANDARD).totals(&lines);
//!
//! assert_eq!(totals.grand_total, Money::from_won(130_000));
//! assert_eq!(totals.final_price, Money::from_won(140_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod currency;
pub mod error;
pub mod money;
pub mod pricing;
pub mod rules;
pub mod selection;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports
// =============================================================================

pub use cart::{CartAggregator, CartLine, CartTotals, LineKind};
pub use catalog::Catalog;
pub use currency::{Currency, CurrencyConverter, DisplayValue, RateTable};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use pricing::{PriceResolver, TaxExemptions};
pub use rules::{AgencyRule, CategoryRules};
pub use selection::{Quote, QuoteEngine, SelectionState};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single item.
///
/// Typed quantities above this clamp to it rather than erroring.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of an item or custom entry name, in characters.
pub const MAX_NAME_LEN: usize = 200;
