//! # Selection & Quote Derivation
//!
//! Holds what staff have picked and derives everything else from it.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SelectionState (the only mutable input)                               │
//! │  ├── manual tiers  ─┐                                                   │
//! │  ├── agency        ─┴─► CategoryRules::effective_tiers ──► TierPair    │
//! │  ├── quantities[item id]                                                │
//! │  ├── custom entries                                                     │
//! │  └── generation (bumped by reset)                                       │
//! │           │                                                             │
//! │           ▼  QuoteEngine::build_cart_lines(catalog, selection)          │
//! │                                                                         │
//! │  procedures (catalog order, priced for tier)                           │
//! │    + visible promotions                                                │
//! │    + custom entries                                                    │
//! │           │                                                             │
//! │           ▼  CartAggregator::totals                                     │
//! │                                                                         │
//! │  Quote { tiers, lines, totals }                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here caches derived values, so a tier change can never leave a
//! stale price or a hidden promotion in the totals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{line_total, CartAggregator, CartLine, CartTotals};
use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::PriceResolver;
use crate::rules::CategoryRules;
use crate::types::{AgencyCode, CustomCartEntry, TierPair};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Selection State
// =============================================================================

/// The user's current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SelectionState {
    manual_tiers: TierPair,
    agency: Option<AgencyCode>,
    quantities: BTreeMap<String, u32>,
    custom_entries: Vec<CustomCartEntry>,
    generation: u64,
}

impl SelectionState {
    /// A fresh selection on the configured default tiers.
    pub fn new(rules: &CategoryRules) -> Self {
        SelectionState {
            manual_tiers: rules.default_tiers.clone(),
            agency: None,
            quantities: BTreeMap::new(),
            custom_entries: Vec::new(),
            generation: 0,
        }
    }

    pub fn manual_tiers(&self) -> &TierPair {
        &self.manual_tiers
    }

    pub fn agency(&self) -> Option<&AgencyCode> {
        self.agency.as_ref()
    }

    /// Incremented by every [`reset`](Self::reset).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Changes the manual tier pair.
    ///
    /// ## Errors
    /// - `TiersLockedByAgency` while a constrained agency is selected
    /// - `Validation` when either code is not configured
    pub fn set_manual_tiers(&mut self, tiers: TierPair, rules: &CategoryRules) -> CoreResult<()> {
        if let Some(agency) = self.agency.as_ref().filter(|a| rules.is_agency_constrained(Some(*a))) {
            return Err(CoreError::TiersLockedByAgency {
                agency: agency.to_string(),
            });
        }

        let customer = rules.customer_tier(tiers.customer.as_str())?;
        let commission = rules.commission_tier(tiers.commission.as_str())?;
        self.manual_tiers = TierPair::new(customer, commission);
        Ok(())
    }

    /// Selects or clears the agency. The manual pair is left untouched.
    pub fn set_agency(&mut self, agency: Option<AgencyCode>, rules: &CategoryRules) -> CoreResult<()> {
        self.agency = match agency {
            Some(code) => rules.agency(code.as_str())?,
            None => None,
        };
        Ok(())
    }

    /// The tier pair in effect: the agency's forced pair, else the manual one.
    pub fn effective_tiers(&self, rules: &CategoryRules) -> TierPair {
        rules.effective_tiers(&self.manual_tiers, self.agency.as_ref())
    }

    /// True while manual tier edits would be rejected.
    pub fn tiers_locked(&self, rules: &CategoryRules) -> bool {
        rules.is_agency_constrained(self.agency.as_ref())
    }

    pub fn quantity(&self, item_id: &str) -> u32 {
        self.quantities.get(item_id).copied().unwrap_or(0)
    }

    pub fn quantities(&self) -> &BTreeMap<String, u32> {
        &self.quantities
    }

    /// Sets a catalog item quantity, clamped to the item maximum.
    /// Zero removes the entry.
    pub fn set_quantity(&mut self, item_id: &str, quantity: u32) {
        let quantity = quantity.min(MAX_ITEM_QUANTITY as u32);
        if quantity == 0 {
            self.quantities.remove(item_id);
        } else {
            self.quantities.insert(item_id.to_string(), quantity);
        }
    }

    /// Keeps only the quantities whose id passes `keep`.
    ///
    /// Returns the dropped ids.
    pub fn retain_quantities(&mut self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let stale: Vec<String> = self
            .quantities
            .keys()
            .filter(|id| !keep(id.as_str()))
            .cloned()
            .collect();
        for id in &stale {
            self.quantities.remove(id);
        }
        stale
    }

    pub fn custom_entries(&self) -> &[CustomCartEntry] {
        &self.custom_entries
    }

    pub fn add_custom_entry(&mut self, entry: CustomCartEntry) {
        self.custom_entries.push(entry);
    }

    pub fn remove_custom_entry(&mut self, entry_id: &str) -> CoreResult<CustomCartEntry> {
        let index = self
            .custom_entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| CoreError::CustomEntryNotFound(entry_id.to_string()))?;
        Ok(self.custom_entries.remove(index))
    }

    /// Zeroes every quantity and removes custom entries in one step.
    ///
    /// Tiers and agency are kept.
    pub fn reset(&mut self) {
        self.quantities.clear();
        self.custom_entries.clear();
        self.generation += 1;
    }
}

// =============================================================================
// Display Rows
// =============================================================================

/// One row of the procedure table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProcedureRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub procedure_type: String,

    /// `None` when the procedure is not offered to the active tier.
    pub unit_price: Option<Money>,

    pub quantity: u32,
    pub line_total: Money,
    pub tax_exempt: bool,
}

impl ProcedureRow {
    /// Unavailable rows get no quantity control.
    pub fn is_purchasable(&self) -> bool {
        self.unit_price.is_some()
    }

    /// Unit price text; `-` when unavailable.
    pub fn price_text(&self) -> String {
        self.unit_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// One row of the promotion table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PromotionRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

// =============================================================================
// Quote
// =============================================================================

/// Everything the summary panel shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Quote {
    pub tiers: TierPair,
    pub agency: Option<AgencyCode>,
    pub promotions_suppressed: bool,

    /// Every priced line, including quantity-zero ones.
    pub lines: Vec<CartLine>,

    pub totals: CartTotals,
}

impl Quote {
    /// Lines with quantity > 0.
    pub fn selected_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|l| l.quantity > 0)
    }
}

/// Pricing rules bundled for derivation.
#[derive(Debug, Clone, Default)]
pub struct QuoteEngine {
    rules: CategoryRules,
    resolver: PriceResolver,
    aggregator: CartAggregator,
}

impl QuoteEngine {
    pub fn new(rules: CategoryRules, resolver: PriceResolver, aggregator: CartAggregator) -> Self {
        QuoteEngine {
            rules,
            resolver,
            aggregator,
        }
    }

    pub fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    pub fn resolver(&self) -> &PriceResolver {
        &self.resolver
    }

    pub fn aggregator(&self) -> &CartAggregator {
        &self.aggregator
    }

    /// True when the item can take a quantity at the selection's effective
    /// tiers: a procedure priced for the customer tier, or a visible promotion.
    pub fn is_purchasable(&self, catalog: &Catalog, selection: &SelectionState, item_id: &str) -> bool {
        let tiers = selection.effective_tiers(&self.rules);
        self.purchasable_at(catalog, &tiers, item_id)
    }

    /// Drops quantities for items that cannot be bought at the effective tiers.
    ///
    /// Returns the dropped ids.
    pub fn retain_purchasable(&self, catalog: &Catalog, selection: &mut SelectionState) -> Vec<String> {
        let tiers = selection.effective_tiers(&self.rules);
        selection.retain_quantities(|id| self.purchasable_at(catalog, &tiers, id))
    }

    fn purchasable_at(&self, catalog: &Catalog, tiers: &TierPair, item_id: &str) -> bool {
        if let Some(procedure) = catalog.procedure(item_id) {
            return self
                .resolver
                .resolve_procedure_price(procedure, &tiers.customer)
                .is_some();
        }
        catalog.promotion(item_id).is_some_and(|promotion| {
            self.rules
                .promotion_visible(promotion, &tiers.customer, &tiers.commission)
        })
    }

    /// Builds the cart lines for the current selection.
    ///
    /// ## Order
    /// 1. procedures in catalog order, skipping those unpriced for the tier
    /// 2. promotions visible under the effective tiers
    /// 3. custom entries in insertion order
    pub fn build_cart_lines(&self, catalog: &Catalog, selection: &SelectionState) -> Vec<CartLine> {
        let tiers = selection.effective_tiers(&self.rules);
        let mut lines = Vec::new();

        for procedure in catalog.procedures() {
            if let Some(price) = self.resolver.resolve_procedure_price(procedure, &tiers.customer) {
                lines.push(CartLine::procedure(
                    &procedure.id,
                    &procedure.name,
                    selection.quantity(&procedure.id),
                    price,
                    self.resolver.is_tax_exempt(&procedure.id),
                ));
            }
        }

        for promotion in
            self.rules
                .visible_promotions(catalog.promotions(), &tiers.customer, &tiers.commission)
        {
            lines.push(CartLine::promotion(
                &promotion.id,
                &promotion.name,
                selection.quantity(&promotion.id),
                self.resolver.resolve_promotion_price(promotion, &tiers.customer),
            ));
        }

        for entry in selection.custom_entries() {
            lines.push(CartLine::custom(&entry.id, &entry.name, entry.quantity, entry.price));
        }

        lines
    }

    pub fn derive_quote(&self, catalog: &Catalog, selection: &SelectionState) -> Quote {
        let tiers = selection.effective_tiers(&self.rules);
        let lines = self.build_cart_lines(catalog, selection);
        let totals = self.aggregator.totals(&lines);

        Quote {
            promotions_suppressed: self
                .rules
                .promotions_suppressed(&tiers.customer, &tiers.commission),
            agency: selection.agency().cloned(),
            tiers,
            lines,
            totals,
        }
    }

    /// Procedure table rows, optionally limited to one type tab.
    pub fn procedure_rows(
        &self,
        catalog: &Catalog,
        selection: &SelectionState,
        procedure_type: Option<&str>,
    ) -> Vec<ProcedureRow> {
        let tiers = selection.effective_tiers(&self.rules);

        catalog
            .procedures()
            .iter()
            .filter(|p| procedure_type.map_or(true, |t| p.procedure_type.eq_ignore_ascii_case(t)))
            .map(|p| {
                let unit_price = self.resolver.resolve_procedure_price(p, &tiers.customer);
                let quantity = if unit_price.is_some() {
                    selection.quantity(&p.id)
                } else {
                    0
                };

                ProcedureRow {
                    id: p.id.clone(),
                    code: p.code.clone(),
                    name: p.name.clone(),
                    procedure_type: p.procedure_type.clone(),
                    unit_price,
                    quantity,
                    line_total: unit_price
                        .map(|price| line_total(price, quantity as i64))
                        .unwrap_or_default(),
                    tax_exempt: self.resolver.is_tax_exempt(&p.id),
                }
            })
            .collect()
    }

    /// Promotion table rows; empty when promotions are suppressed.
    pub fn promotion_rows(&self, catalog: &Catalog, selection: &SelectionState) -> Vec<PromotionRow> {
        let tiers = selection.effective_tiers(&self.rules);

        self.rules
            .visible_promotions(catalog.promotions(), &tiers.customer, &tiers.commission)
            .into_iter()
            .map(|p| {
                let price = self.resolver.resolve_promotion_price(p, &tiers.customer);
                let quantity = selection.quantity(&p.id);
                PromotionRow {
                    id: p.id.clone(),
                    code: p.code.clone(),
                    name: p.name.clone(),
                    description: p.description.clone(),
                    price,
                    quantity,
                    line_total: line_total(price, quantity as i64),
                }
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
