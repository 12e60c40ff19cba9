//! # Domain Types
//!
//! Core domain types used throughout Jade Pricing.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Procedure     │   │   Promotion     │   │ CustomCartEntry │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id / code      │   │  id / code      │   │  id (UUID v4)   │       │
//! │  │  procedure_type │   │  description    │   │  name           │       │
//! │  │  prices[tier]   │   │  price          │   │  price          │       │
//! │  │  sort_order     │   │  availability   │   │  quantity       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CustomerTier   │   │ CommissionTier  │   │   AgencyCode    │       │
//! │  │  "K0".."K30"    │   │ "C0".."NO EVENT"│   │  "PARTNER"      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tier Codes Are Data
//! Tier and commission spellings have changed between catalog versions, so
//! they are string newtypes validated against the configured
//! [`CategoryRules`](crate::rules::CategoryRules) rather than a fixed enum.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tier Codes
// =============================================================================

macro_rules! tier_code {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export)]
        pub struct $name(String);

        impl $name {
            /// Wraps a code without checking it against the rules.
            ///
            /// Boundary input should go through `CategoryRules` instead.
            pub fn new(code: impl Into<String>) -> Self {
                $name(code.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

tier_code!(
    /// Customer category; selects the procedure price column and the
    /// promotion availability flag.
    CustomerTier
);

tier_code!(
    /// Commission category; affects promotion eligibility only.
    CommissionTier
);

tier_code!(
    /// Referral agency. Some agencies force a fixed tier pair.
    AgencyCode
);

/// A customer tier together with a commission tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TierPair {
    pub customer: CustomerTier,
    pub commission: CommissionTier,
}

impl TierPair {
    pub fn new(customer: CustomerTier, commission: CommissionTier) -> Self {
        TierPair {
            customer,
            commission,
        }
    }
}

impl fmt::Display for TierPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.customer, self.commission)
    }
}

// =============================================================================
// Procedure
// =============================================================================

/// A clinic procedure with a price per customer tier.
///
/// ## Invariant
/// A tier whose price is missing or `None` is not purchasable under that
/// tier: the UI shows "-" and no quantity control. A price of zero is a
/// valid free item and is NOT the same as unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Procedure {
    /// Unique identifier.
    pub id: String,

    /// Business code (e.g. `PROBOTOX1`), unique within the catalog.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Type tag used for the catalog tabs (`MAIN`, `BOTOX`, ...).
    pub procedure_type: String,

    /// Unit price per customer tier.
    pub prices: BTreeMap<CustomerTier, Option<Money>>,

    /// Display order; lower sorts first.
    pub sort_order: i64,
}

impl Procedure {
    /// Price for `tier`, or `None` when the procedure is not offered to it.
    pub fn price_for(&self, tier: &CustomerTier) -> Option<Money> {
        self.prices.get(tier).copied().flatten()
    }
}

// =============================================================================
// Promotion
// =============================================================================

/// A promotional package.
///
/// Promotions carry a single price; the customer tier only decides whether
/// the promotion is visible at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Promotion {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub price: Money,

    /// Per-tier availability. Missing tiers are unavailable.
    pub availability: BTreeMap<CustomerTier, bool>,
}

impl Promotion {
    pub fn is_available_for(&self, tier: &CustomerTier) -> bool {
        self.availability.get(tier).copied().unwrap_or(false)
    }
}

// =============================================================================
// Custom Cart Entry
// =============================================================================

/// An ad-hoc line item added by staff.
///
/// Construct through [`validation::validate_custom_entry`](crate::validation::validate_custom_entry);
/// always taxed at the standard rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomCartEntry {
    /// Generated identity (UUID v4).
    pub id: String,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(code: &str) -> CustomerTier {
        CustomerTier::new(code)
    }

    #[test]
    fn test_procedure_price_for_distinguishes_zero_and_missing() {
        let procedure = Procedure {
            id: "p1".into(),
            code: "PROP1".into(),
            name: "Consultation".into(),
            procedure_type: "MAIN".into(),
            prices: BTreeMap::from([
                (tier("K10"), Some(Money::zero())),
                (tier("K20"), None),
            ]),
            sort_order: 0,
        };

        assert_eq!(procedure.price_for(&tier("K10")), Some(Money::zero()));
        assert_eq!(procedure.price_for(&tier("K20")), None);
        assert_eq!(procedure.price_for(&tier("K30")), None);
    }

    #[test]
    fn test_promotion_missing_tier_is_unavailable() {
        let promotion = Promotion {
            id: "promo1".into(),
            code: "PROMOTH".into(),
            name: "Monthly Thermage Special".into(),
            description: "Thermage 300 shots".into(),
            price: Money::from_won(1_800_000),
            availability: BTreeMap::from([(tier("K0"), true), (tier("K20"), false)]),
        };

        assert!(promotion.is_available_for(&tier("K0")));
        assert!(!promotion.is_available_for(&tier("K20")));
        assert!(!promotion.is_available_for(&tier("K25")));
    }

    #[test]
    fn test_tier_code_serializes_as_plain_string() {
        let json = serde_json::to_string(&TierPair::new(
            tier("K10"),
            CommissionTier::new("NO EVENT"),
        ))
        .unwrap();
        assert_eq!(json, r#"{"customer":"K10","commission":"NO EVENT"}"#);
    }
}
