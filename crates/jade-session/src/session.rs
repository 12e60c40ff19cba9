//! # Pricing Session
//!
//! The controller the UI talks to: one selection, one catalog, one rate
//! table, and the guards that keep late fetch responses from overwriting
//! newer state.
//!
//! ## Stale Response Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  t0  tiers K10/C0 ──► begin_promotions_fetch() ──► ticket #1           │
//! │  t1  staff picks K20/C0 ──► guard re-issued     ──► ticket #2          │
//! │  t2  response for #2 arrives ──► applied                               │
//! │  t3  response for #1 arrives ──► ticket not current ──► Stale, dropped │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! [`SharedSession`] is an `Arc<tokio::sync::Mutex<_>>`. The `reload_*`
//! helpers take a ticket under the lock, release it for the network call,
//! and lock again to apply. The lock is never held across an await on I/O.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use jade_core::catalog::{Decoded, ProcedureRecord, PromotionRecord};
use jade_core::selection::{ProcedureRow, PromotionRow};
use jade_core::validation::{validate_custom_entry, validate_uuid};
use jade_core::{
    AgencyCode, Catalog, CoreError, CoreResult, Currency, CurrencyConverter, DisplayValue, Money,
    Quote, QuoteEngine, RateTable, SelectionState, TierPair, ValidationError,
};

use crate::catalog::CatalogSource;
use crate::config::PricingConfig;
use crate::error::SessionResult;
use crate::rates::{RateSource, RateStatus};

// =============================================================================
// Fetch Guard
// =============================================================================

/// Generation counter for one fetch stream.
#[derive(Debug, Default)]
pub struct FetchGuard {
    generation: u64,
}

/// Proof that a fetch was started at a given generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

impl FetchGuard {
    /// Starts a new fetch. Earlier tickets stop being current.
    pub fn issue(&mut self) -> FetchTicket {
        self.generation += 1;
        FetchTicket {
            generation: self.generation,
        }
    }

    /// Invalidates outstanding tickets without starting a fetch.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.generation == self.generation
    }
}

/// What happened to a fetch response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Response applied; carries the item count.
    Applied(usize),

    /// A newer fetch superseded this one; nothing changed.
    Stale,

    /// Fetch or decode failed; notice recorded. Catalog lists are emptied,
    /// the last good rate table is kept.
    Failed,

    /// No fetch was needed (promotions suppressed).
    Skipped,
}

/// A promotions fetch to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionFetch {
    pub ticket: FetchTicket,
    pub tiers: TierPair,
}

// =============================================================================
// Notices & Summary
// =============================================================================

/// Inline error notices for the UI. `None` means "no problem".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotices {
    pub catalog_error: Option<String>,
    pub promotions_error: Option<String>,
    pub rates_error: Option<String>,
}

/// The cart summary panel in the selected display currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    pub quote: Quote,
    pub grand_total: DisplayValue,
    pub final_price: DisplayValue,
}

// =============================================================================
// Pricing Session
// =============================================================================

/// Session state for one configurator screen.
#[derive(Debug)]
pub struct PricingSession {
    engine: QuoteEngine,
    converter: CurrencyConverter,
    display_currency: Currency,
    stale_after: chrono::Duration,

    catalog: Catalog,
    selection: SelectionState,
    rates: RateTable,

    procedures_guard: FetchGuard,
    promotions_guard: FetchGuard,
    rates_guard: FetchGuard,

    notices: SessionNotices,
}

/// Session shared between the UI and background tasks.
pub type SharedSession = Arc<Mutex<PricingSession>>;

impl PricingSession {
    pub fn new(config: &PricingConfig) -> Self {
        let engine = config.quote_engine();
        let selection = SelectionState::new(engine.rules());

        PricingSession {
            engine,
            converter: CurrencyConverter::new(config.currency.base),
            display_currency: config.currency.display,
            stale_after: config.stale_after(),
            catalog: Catalog::default(),
            selection,
            rates: RateTable::empty(config.currency.base),
            procedures_guard: FetchGuard::default(),
            promotions_guard: FetchGuard::default(),
            rates_guard: FetchGuard::default(),
            notices: SessionNotices::default(),
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn engine(&self) -> &QuoteEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn notices(&self) -> &SessionNotices {
        &self.notices
    }

    pub fn display_currency(&self) -> Currency {
        self.display_currency
    }

    pub fn effective_tiers(&self) -> TierPair {
        self.selection.effective_tiers(self.engine.rules())
    }

    pub fn promotions_suppressed(&self) -> bool {
        let tiers = self.effective_tiers();
        self.engine
            .rules()
            .promotions_suppressed(&tiers.customer, &tiers.commission)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Changes the manual tiers.
    ///
    /// Returns true when the effective tiers changed, meaning promotions
    /// should be reloaded. Any in-flight promotions fetch becomes stale.
    pub fn set_manual_tiers(&mut self, tiers: TierPair) -> CoreResult<bool> {
        let before = self.effective_tiers();
        self.selection.set_manual_tiers(tiers, self.engine.rules())?;
        Ok(self.after_tier_change(before))
    }

    /// Selects or clears the agency. Same return contract as
    /// [`set_manual_tiers`](Self::set_manual_tiers).
    pub fn set_agency(&mut self, agency: Option<AgencyCode>) -> CoreResult<bool> {
        let before = self.effective_tiers();
        self.selection.set_agency(agency, self.engine.rules())?;
        Ok(self.after_tier_change(before))
    }

    fn after_tier_change(&mut self, before: TierPair) -> bool {
        let after = self.effective_tiers();
        if after == before {
            return false;
        }

        info!(from = %before, to = %after, "Effective tiers changed");
        self.promotions_guard.invalidate();
        if self.promotions_suppressed() {
            self.catalog.clear_promotions();
            self.notices.promotions_error = None;
        }

        // Promotion picks belong to one tier pair and start over on the next.
        let catalog = &self.catalog;
        let zeroed = self
            .selection
            .retain_quantities(|id| catalog.promotion(id).is_none());
        if !zeroed.is_empty() {
            debug!(?zeroed, "Cleared promotion quantities");
        }
        self.prune_selection();
        true
    }

    /// Sets the quantity of a catalog item.
    ///
    /// ## Errors
    /// - `ItemNotFound` for ids outside the loaded catalog
    /// - `ItemNotPurchasable` for a non-zero quantity on a procedure with no
    ///   price, or a promotion not shown, at the effective tiers
    pub fn set_quantity(&mut self, item_id: &str, quantity: u32) -> CoreResult<()> {
        if !self.catalog.contains_item(item_id) {
            return Err(CoreError::ItemNotFound(item_id.to_string()));
        }
        if quantity > 0 && !self.engine.is_purchasable(&self.catalog, &self.selection, item_id) {
            return Err(CoreError::ItemNotPurchasable(item_id.to_string()));
        }
        self.selection.set_quantity(item_id, quantity);
        Ok(())
    }

    /// Sets a quantity from typed text; bad input becomes 0.
    pub fn set_quantity_text(&mut self, item_id: &str, text: &str) -> CoreResult<()> {
        self.set_quantity(item_id, jade_core::cart::parse_quantity(text))
    }

    /// Adds a custom entry and returns its id.
    pub fn add_custom_entry(
        &mut self,
        name: &str,
        price_won: i64,
        quantity: i64,
    ) -> Result<String, ValidationError> {
        let entry = validate_custom_entry(name, price_won, quantity)?;
        let id = entry.id.clone();
        debug!(id = %id, name = %entry.name, "Custom entry added");
        self.selection.add_custom_entry(entry);
        Ok(id)
    }

    pub fn remove_custom_entry(&mut self, entry_id: &str) -> CoreResult<()> {
        validate_uuid(entry_id)?;
        self.selection.remove_custom_entry(entry_id).map(|_| ())
    }

    /// Clears quantities and custom entries. Tiers, agency and currency stay.
    pub fn reset(&mut self) {
        self.selection.reset();
        info!(generation = self.selection.generation(), "Selection reset");
    }

    pub fn set_display_currency(&mut self, currency: Currency) {
        self.display_currency = currency;
    }

    // =========================================================================
    // Derived Views
    // =========================================================================

    pub fn quote(&self) -> Quote {
        self.engine.derive_quote(&self.catalog, &self.selection)
    }

    pub fn procedure_rows(&self, procedure_type: Option<&str>) -> Vec<ProcedureRow> {
        self.engine
            .procedure_rows(&self.catalog, &self.selection, procedure_type)
    }

    pub fn promotion_rows(&self) -> Vec<PromotionRow> {
        self.engine.promotion_rows(&self.catalog, &self.selection)
    }

    pub fn procedure_types(&self) -> Vec<&str> {
        self.catalog.procedure_types()
    }

    /// Renders `amount` in the display currency as of `now`.
    pub fn display_at(&self, amount: Money, now: DateTime<Utc>) -> DisplayValue {
        if self.rates.is_stale(now, self.stale_after) {
            let empty = RateTable::empty(self.rates.base);
            return self.converter.convert(amount, self.display_currency, &empty);
        }
        self.converter
            .convert(amount, self.display_currency, &self.rates)
    }

    pub fn display(&self, amount: Money) -> DisplayValue {
        self.display_at(amount, Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> CartSummary {
        let quote = self.quote();
        CartSummary {
            grand_total: self.display_at(quote.totals.grand_total, now),
            final_price: self.display_at(quote.totals.final_price, now),
            quote,
        }
    }

    pub fn summary(&self) -> CartSummary {
        self.summary_at(Utc::now())
    }

    pub fn rate_status_at(&self, now: DateTime<Utc>) -> RateStatus {
        RateStatus {
            fetched_at: self.rates.fetched_at,
            available: Currency::ALL
                .into_iter()
                .filter(|c| *c != self.rates.base && self.rates.rate(*c).is_some())
                .collect(),
            stale: self.rates.is_stale(now, self.stale_after),
            last_error: self.notices.rates_error.clone(),
        }
    }

    // =========================================================================
    // Fetch Lifecycle
    // =========================================================================

    pub fn begin_procedures_fetch(&mut self) -> FetchTicket {
        self.procedures_guard.issue()
    }

    /// Applies a procedures response if its ticket is still current.
    ///
    /// A failed fetch empties the procedure list and records a notice.
    pub fn apply_procedures(
        &mut self,
        ticket: FetchTicket,
        result: SessionResult<Vec<ProcedureRecord>>,
    ) -> ApplyOutcome {
        if !self.procedures_guard.is_current(ticket) {
            debug!("Discarding stale procedures response");
            return ApplyOutcome::Stale;
        }

        let applied = result.and_then(|records| {
            let rules = self.engine.rules();
            let procedures = decode_all(records, |r| r.into_procedure(rules))?;
            let count = procedures.len();
            self.catalog.replace_procedures(procedures, rules)?;
            Ok(count)
        });

        match applied {
            Ok(count) => {
                info!(count, "Procedures loaded");
                self.notices.catalog_error = None;
                self.prune_selection();
                ApplyOutcome::Applied(count)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "Failed to load procedures, showing none");
                self.notices.catalog_error = Some(e.to_string());
                self.catalog.clear_procedures();
                self.prune_selection();
                ApplyOutcome::Failed
            }
        }
    }

    /// Starts a promotions fetch, or `None` when promotions are suppressed
    /// for the effective tiers (the list is cleared instead).
    pub fn begin_promotions_fetch(&mut self) -> Option<PromotionFetch> {
        if self.promotions_suppressed() {
            self.promotions_guard.invalidate();
            self.catalog.clear_promotions();
            self.notices.promotions_error = None;
            self.prune_selection();
            return None;
        }

        Some(PromotionFetch {
            ticket: self.promotions_guard.issue(),
            tiers: self.effective_tiers(),
        })
    }

    pub fn apply_promotions(
        &mut self,
        ticket: FetchTicket,
        result: SessionResult<Vec<PromotionRecord>>,
    ) -> ApplyOutcome {
        if !self.promotions_guard.is_current(ticket) {
            debug!("Discarding stale promotions response");
            return ApplyOutcome::Stale;
        }

        let applied = result.and_then(|records| {
            let rules = self.engine.rules();
            let promotions = decode_all(records, |r| r.into_promotion(rules))?;
            let count = promotions.len();
            self.catalog.replace_promotions(promotions, rules)?;
            Ok(count)
        });

        match applied {
            Ok(count) => {
                info!(count, "Promotions loaded");
                self.notices.promotions_error = None;
                self.prune_selection();
                ApplyOutcome::Applied(count)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "Failed to load promotions, showing none");
                self.notices.promotions_error = Some(e.to_string());
                self.catalog.clear_promotions();
                self.prune_selection();
                ApplyOutcome::Failed
            }
        }
    }

    pub fn begin_rates_fetch(&mut self) -> (FetchTicket, Currency) {
        (self.rates_guard.issue(), self.rates.base)
    }

    /// Applies a rate table. On failure the last good table stays in use.
    pub fn apply_rates(&mut self, ticket: FetchTicket, result: SessionResult<RateTable>) -> ApplyOutcome {
        if !self.rates_guard.is_current(ticket) {
            debug!("Discarding stale rates response");
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(table) if table.base == self.rates.base => {
                let count = table.rates.len();
                info!(count, "Exchange rates updated");
                self.rates = table;
                self.notices.rates_error = None;
                ApplyOutcome::Applied(count)
            }
            Ok(table) => {
                warn!(expected = %self.rates.base, got = %table.base, "Rate table has wrong base");
                self.notices.rates_error = Some(format!("rates are based on {}", table.base));
                ApplyOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "Failed to fetch exchange rates");
                self.notices.rates_error = Some(e.to_string());
                ApplyOutcome::Failed
            }
        }
    }

    /// Drops quantities for items that are gone from the catalog, unpriced
    /// for the customer tier, or hidden promotions.
    fn prune_selection(&mut self) {
        let dropped = self
            .engine
            .retain_purchasable(&self.catalog, &mut self.selection);
        if !dropped.is_empty() {
            debug!(?dropped, "Dropped quantities for items not purchasable");
        }
    }
}

/// Decodes wire records, logging tier keys that matched nothing.
fn decode_all<R, T>(
    records: Vec<R>,
    decode: impl Fn(R) -> Result<Decoded<T>, ValidationError>,
) -> SessionResult<Vec<T>> {
    records
        .into_iter()
        .map(|record| {
            let decoded = decode(record)?;
            if !decoded.ignored_keys.is_empty() {
                warn!(keys = ?decoded.ignored_keys, "Ignoring fields for unconfigured tiers");
            }
            Ok(decoded.item)
        })
        .collect()
}

// =============================================================================
// Shared Session Helpers
// =============================================================================

/// Fetches procedures and applies them if still current.
pub async fn reload_procedures(session: &SharedSession, source: &dyn CatalogSource) -> ApplyOutcome {
    let ticket = session.lock().await.begin_procedures_fetch();
    let result = source.procedures().await;
    session.lock().await.apply_procedures(ticket, result)
}

/// Fetches promotions for the current tiers and applies them if still
/// current. Does not touch the network while promotions are suppressed.
pub async fn reload_promotions(session: &SharedSession, source: &dyn CatalogSource) -> ApplyOutcome {
    let fetch = match session.lock().await.begin_promotions_fetch() {
        Some(fetch) => fetch,
        None => {
            debug!("Promotions suppressed for current tiers, not fetching");
            return ApplyOutcome::Skipped;
        }
    };

    let result = source
        .promotions(&fetch.tiers.customer, &fetch.tiers.commission)
        .await;
    session.lock().await.apply_promotions(fetch.ticket, result)
}

/// Fetches a fresh rate table and applies it if still current.
pub async fn reload_rates(session: &SharedSession, source: &dyn RateSource) -> ApplyOutcome {
    let (ticket, base) = session.lock().await.begin_rates_fetch();
    let result = source.fetch_rates(base).await;
    session.lock().await.apply_rates(ticket, result)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use async_trait::async_trait;
    use jade_core::{CommissionTier, CustomerTier};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn tiers(customer: &str, commission: &str) -> TierPair {
        TierPair::new(CustomerTier::new(customer), CommissionTier::new(commission))
    }

    fn config() -> PricingConfig {
        let mut config = PricingConfig::default();
        config.pricing.tax_exempt_ids = vec!["b".into()];
        config.currency.display = Currency::Usd;
        config
    }

    fn procedure_records() -> Vec<ProcedureRecord> {
        serde_json::from_value(json!([
            { "id": "a", "name": "Procedure A", "sort_order": 1, "priceK10": 50000, "priceK20": 45000 },
            { "id": "b", "name": "Numbing cream", "sort_order": 2, "priceK10": 30000, "priceK20": 30000 }
        ]))
        .unwrap()
    }

    fn promotion_records() -> Vec<PromotionRecord> {
        serde_json::from_value(json!([
            { "id": "p", "name": "Bundle", "price": 350000, "available_k10": true, "available_k20": true }
        ]))
        .unwrap()
    }

    /// Serves fixed records and counts promotion requests.
    #[derive(Default)]
    struct FakeCatalog {
        promotion_calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn procedures(&self) -> SessionResult<Vec<ProcedureRecord>> {
            if self.fail {
                return Err(SessionError::HttpStatus {
                    url: "http://test/procedures".into(),
                    status: 500,
                });
            }
            Ok(procedure_records())
        }

        async fn promotions(
            &self,
            _customer: &CustomerTier,
            _commission: &CommissionTier,
        ) -> SessionResult<Vec<PromotionRecord>> {
            self.promotion_calls.fetch_add(1, Ordering::SeqCst);
            Ok(promotion_records())
        }
    }

    /// Blocks each promotions request until released.
    #[derive(Default)]
    struct GatedCatalog {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CatalogSource for GatedCatalog {
        async fn procedures(&self) -> SessionResult<Vec<ProcedureRecord>> {
            Ok(procedure_records())
        }

        async fn promotions(
            &self,
            _customer: &CustomerTier,
            _commission: &CommissionTier,
        ) -> SessionResult<Vec<PromotionRecord>> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(promotion_records())
        }
    }

    struct FixedRates(SessionResult<f64>);

    #[async_trait]
    impl RateSource for FixedRates {
        async fn fetch_rates(&self, base: Currency) -> SessionResult<RateTable> {
            match &self.0 {
                Ok(rate) => Ok(RateTable::new(
                    base,
                    BTreeMap::from([(Currency::Usd, *rate)]),
                    Utc::now(),
                )),
                Err(_) => Err(SessionError::InvalidResponse("rate service down".into())),
            }
        }
    }

    async fn loaded_session() -> SharedSession {
        let session = PricingSession::new(&config()).into_shared();
        let source = FakeCatalog::default();
        assert_eq!(reload_procedures(&session, &source).await, ApplyOutcome::Applied(2));
        assert_eq!(reload_promotions(&session, &source).await, ApplyOutcome::Applied(1));
        session
    }

    #[test]
    fn test_fetch_guard() {
        let mut guard = FetchGuard::default();
        let first = guard.issue();
        assert!(guard.is_current(first));

        let second = guard.issue();
        assert!(!guard.is_current(first));
        assert!(guard.is_current(second));

        guard.invalidate();
        assert!(!guard.is_current(second));
    }

    #[tokio::test]
    async fn test_end_to_end_quote_through_session() {
        let session = loaded_session().await;
        let mut s = session.lock().await;

        s.set_quantity("a", 2).unwrap();
        s.set_quantity_text("b", "1").unwrap();

        let quote = s.quote();
        assert_eq!(quote.totals.grand_total, Money::from_won(130_000));
        assert_eq!(quote.totals.final_price, Money::from_won(140_000));
    }

    #[tokio::test]
    async fn test_unknown_item_rejected() {
        let session = loaded_session().await;
        let mut s = session.lock().await;

        assert!(matches!(
            s.set_quantity("missing", 1),
            Err(CoreError::ItemNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_promotions_response_is_discarded() {
        let session = PricingSession::new(&config()).into_shared();
        let source = Arc::new(GatedCatalog::default());
        reload_procedures(&session, source.as_ref()).await;

        let task = tokio::spawn({
            let session = session.clone();
            let source = source.clone();
            async move { reload_promotions(&session, source.as_ref()).await }
        });

        source.started.notified().await;
        let changed = session
            .lock()
            .await
            .set_manual_tiers(tiers("K20", "C0"))
            .unwrap();
        assert!(changed);
        source.release.notify_one();

        assert_eq!(task.await.unwrap(), ApplyOutcome::Stale);
        assert!(session.lock().await.catalog().promotions().is_empty());
    }

    #[tokio::test]
    async fn test_suppressed_tiers_do_not_fetch() {
        let session = loaded_session().await;
        let source = FakeCatalog::default();

        {
            let mut s = session.lock().await;
            s.set_quantity("p", 1).unwrap();
            assert!(s.set_manual_tiers(tiers("K30", "C0")).unwrap());
            assert!(s.catalog().promotions().is_empty());
        }

        assert_eq!(reload_promotions(&session, &source).await, ApplyOutcome::Skipped);
        assert_eq!(source.promotion_calls.load(Ordering::SeqCst), 0);

        let s = session.lock().await;
        assert!(s.promotion_rows().is_empty());
        assert_eq!(s.quote().totals.grand_total, Money::zero());
    }

    #[tokio::test]
    async fn test_agency_change_reports_tier_change() {
        let session = loaded_session().await;
        let mut s = session.lock().await;

        assert!(s.set_agency(Some(AgencyCode::new("PARTNER"))).unwrap());
        assert!(s.promotions_suppressed());
        assert!(matches!(
            s.set_manual_tiers(tiers("K20", "C0")),
            Err(CoreError::TiersLockedByAgency { .. })
        ));

        assert!(!s.set_agency(Some(AgencyCode::new("PARTNER"))).unwrap());
        assert!(s.set_agency(None).unwrap());
        assert_eq!(s.effective_tiers(), tiers("K10", "C0"));
    }

    #[tokio::test]
    async fn test_failed_fetch_empties_list_and_records_notice() {
        let session = loaded_session().await;
        let failing = FakeCatalog {
            fail: true,
            ..Default::default()
        };

        assert_eq!(reload_procedures(&session, &failing).await, ApplyOutcome::Failed);

        let mut s = session.lock().await;
        assert!(s.notices().catalog_error.is_some());
        assert!(s.catalog().procedures().is_empty());
        assert!(s.procedure_rows(None).is_empty());
        assert!(s.set_quantity("a", 1).is_err());
        assert_eq!(s.catalog().promotions().len(), 1);
    }

    #[tokio::test]
    async fn test_rates_conversion_and_fallback() {
        let session = loaded_session().await;
        session.lock().await.set_quantity("a", 2).unwrap();

        let before = session.lock().await.summary();
        assert!(before.final_price.is_fallback());
        assert_eq!(before.final_price.text, "₩110,000");

        let good = FixedRates(Ok(0.001));
        assert_eq!(reload_rates(&session, &good).await, ApplyOutcome::Applied(1));

        let summary = session.lock().await.summary();
        assert_eq!(summary.final_price.text, "$110.00");
        assert_eq!(summary.final_price.base_reference.as_deref(), Some("₩110,000"));

        let bad = FixedRates(Err(SessionError::InvalidResponse(String::new())));
        assert_eq!(reload_rates(&session, &bad).await, ApplyOutcome::Failed);

        let s = session.lock().await;
        assert_eq!(s.summary().final_price.text, "$110.00");
        assert!(s.rate_status_at(Utc::now()).last_error.is_some());
    }

    #[tokio::test]
    async fn test_stale_rates_fall_back_to_base() {
        let session = loaded_session().await;
        reload_rates(&session, &FixedRates(Ok(0.001))).await;

        let s = session.lock().await;
        let later = Utc::now() + chrono::Duration::seconds(901);

        let value = s.display_at(Money::from_won(10_000), later);
        assert!(value.is_fallback());
        assert!(s.rate_status_at(later).stale);
        assert_eq!(s.rate_status_at(Utc::now()).available, [Currency::Usd]);
    }

    #[tokio::test]
    async fn test_reset_keeps_tiers() {
        let session = loaded_session().await;
        let mut s = session.lock().await;

        s.set_manual_tiers(tiers("K20", "C2")).unwrap();
        s.set_quantity("a", 1).unwrap();
        let id = s.add_custom_entry("Kit", 10_000, 1).unwrap();
        assert!(s.add_custom_entry("", 10_000, 1).is_err());

        s.reset();

        assert_eq!(s.quote().totals.final_price, Money::zero());
        assert_eq!(s.effective_tiers(), tiers("K20", "C2"));
        assert!(matches!(
            s.remove_custom_entry(&id),
            Err(CoreError::CustomEntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unpriced_items_take_no_quantity() {
        let session = loaded_session().await;
        let mut s = session.lock().await;

        s.set_manual_tiers(tiers("K25", "C0")).unwrap();
        assert!(matches!(
            s.set_quantity("a", 3),
            Err(CoreError::ItemNotPurchasable(_))
        ));
        assert!(matches!(
            s.set_quantity_text("p", "1"),
            Err(CoreError::ItemNotPurchasable(_))
        ));
        s.set_quantity("a", 0).unwrap();

        s.set_manual_tiers(tiers("K10", "C0")).unwrap();
        assert_eq!(s.selection().quantity("a"), 0);
        assert_eq!(s.quote().totals.grand_total, Money::zero());
    }

    #[tokio::test]
    async fn test_tier_change_drops_quantities_that_lose_their_price() {
        let session = loaded_session().await;
        let mut s = session.lock().await;

        s.set_quantity("a", 2).unwrap();
        s.set_quantity("b", 1).unwrap();
        s.set_manual_tiers(tiers("K20", "C0")).unwrap();
        assert_eq!(s.quote().totals.grand_total, Money::from_won(120_000));

        s.set_manual_tiers(tiers("K25", "C0")).unwrap();
        assert!(s.selection().quantities().is_empty());

        s.set_manual_tiers(tiers("K10", "C0")).unwrap();
        assert_eq!(s.quote().totals.grand_total, Money::zero());
    }

    #[tokio::test]
    async fn test_promotion_quantities_do_not_return_after_suppression() {
        let session = loaded_session().await;
        let source = FakeCatalog::default();

        {
            let mut s = session.lock().await;
            s.set_quantity("p", 2).unwrap();
            assert_eq!(s.quote().totals.grand_total, Money::from_won(700_000));

            s.set_manual_tiers(tiers("K30", "C0")).unwrap();
            assert_eq!(s.selection().quantity("p"), 0);
            s.set_manual_tiers(tiers("K10", "C0")).unwrap();
        }

        assert_eq!(reload_promotions(&session, &source).await, ApplyOutcome::Applied(1));

        let s = session.lock().await;
        assert_eq!(s.selection().quantity("p"), 0);
        assert_eq!(s.quote().totals.grand_total, Money::zero());
    }

    #[tokio::test]
    async fn test_tier_change_zeroes_promotion_picks() {
        let session = loaded_session().await;
        let mut s = session.lock().await;

        s.set_quantity("a", 1).unwrap();
        s.set_quantity("p", 1).unwrap();
        assert!(s.set_manual_tiers(tiers("K20", "C0")).unwrap());

        assert_eq!(s.selection().quantity("p"), 0);
        assert_eq!(s.selection().quantity("a"), 1);
        assert_eq!(s.quote().totals.grand_total, Money::from_won(45_000));
    }

    #[tokio::test]
    async fn test_remove_custom_entry_checks_id_format() {
        let session = loaded_session().await;
        let mut s = session.lock().await;

        assert!(matches!(
            s.remove_custom_entry("not-a-uuid"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            s.remove_custom_entry("550e8400-e29b-41d4-a716-446655440000"),
            Err(CoreError::CustomEntryNotFound(_))
        ));

        let id = s.add_custom_entry("Kit", 10_000, 2).unwrap();
        s.remove_custom_entry(&id).unwrap();
        assert!(s.selection().custom_entries().is_empty());
    }
}
