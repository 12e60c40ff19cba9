//! # Price Resolution
//!
//! Picks the unit price for a catalog item under the active customer tier
//! and flags tax-exempt procedures.
//!
//! ```text
//! Procedure.prices ──► resolve_procedure_price(K10) ──► Some(₩50,000)
//!                                      (K30, no price) ──► None  → "-"
//!
//! Promotion.price  ──► resolve_promotion_price(any tier) ──► ₩350,000
//!
//! procedure id     ──► is_tax_exempt ──► TaxExemptions (configured set)
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{CustomerTier, Procedure, Promotion};

// =============================================================================
// Tax Exemptions
// =============================================================================

/// Procedure ids excluded from the tax multiplier.
///
/// Loaded from configuration; the reference catalog exempts its two
/// anesthesia procedures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxExemptions(BTreeSet<String>);

impl TaxExemptions {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TaxExemptions(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Price Resolver
// =============================================================================

/// Resolves unit prices and tax treatment for catalog items.
#[derive(Debug, Clone, Default)]
pub struct PriceResolver {
    exemptions: TaxExemptions,
}

impl PriceResolver {
    pub fn new(exemptions: TaxExemptions) -> Self {
        PriceResolver { exemptions }
    }

    /// Unit price for `tier`; `None` when the procedure is not offered.
    ///
    /// Zero is a valid price and is returned as `Some(₩0)`.
    pub fn resolve_procedure_price(
        &self,
        procedure: &Procedure,
        tier: &CustomerTier,
    ) -> Option<Money> {
        procedure.price_for(tier)
    }

    /// Promotions have one price for every tier.
    ///
    /// Visibility is decided by [`CategoryRules`](crate::rules::CategoryRules),
    /// not here.
    pub fn resolve_promotion_price(&self, promotion: &Promotion, _tier: &CustomerTier) -> Money {
        promotion.price
    }

    pub fn is_tax_exempt(&self, procedure_id: &str) -> bool {
        self.exemptions.contains(procedure_id)
    }

    pub fn exemptions(&self) -> &TaxExemptions {
        &self.exemptions
    }
}
