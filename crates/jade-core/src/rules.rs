//! # Category Rules
//!
//! Encodes which customer/commission/agency combinations are valid, which
//! agencies force a tier pair, and when promotions are suppressed.
//!
//! ## Rule Summary
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Promotion Suppression                                │
//! │                                                                         │
//! │  customer == top tier (K30)                         ──► no promotions   │
//! │  customer == restricted tier (K20) AND                                  │
//! │      commission == restricted tag (C3)              ──► no promotions   │
//! │  commission == "NO EVENT"                           ──► no promotions   │
//! │                                                                         │
//! │  otherwise: promotion visible iff availability[customer] == true        │
//! └─────────────────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Agency Precedence                                    │
//! │                                                                         │
//! │  agency = None / unconstrained ──► effective tiers = manual tiers       │
//! │  agency = constrained          ──► effective tiers = forced pair        │
//! │                                                                         │
//! │  The manual pair is never overwritten, so leaving a constrained agency  │
//! │  restores the last manual choice instead of resetting to defaults.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All codes are configured data; [`CategoryRules::default`] mirrors the
//! clinic's current tier sheet.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{AgencyCode, CommissionTier, CustomerTier, Promotion, TierPair};

// =============================================================================
// Agency Rule
// =============================================================================

/// A referral agency and the tier pair it forces, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyRule {
    pub code: AgencyCode,

    /// Forced tier pair. `None` leaves the manual selection in effect.
    #[serde(default)]
    pub forces: Option<TierPair>,
}

// =============================================================================
// Category Rules
// =============================================================================

/// The configured tier scheme and the eligibility rules over it.
///
/// Missing fields take the [`Default`] value, so a config file only has to
/// list what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRules {
    /// Customer tiers, lowest first.
    pub customer_tiers: Vec<CustomerTier>,

    /// Commission tiers in display order.
    pub commission_tiers: Vec<CommissionTier>,

    /// Customer tier that never sees promotions.
    pub top_tier: CustomerTier,

    /// Customer tier that loses promotions under `restricted_commission`.
    pub restricted_tier: CustomerTier,

    /// Commission tag that suppresses promotions for `restricted_tier`.
    pub restricted_commission: CommissionTier,

    /// "No event" sentinel; suppresses promotions for every customer tier.
    pub no_event: CommissionTier,

    /// Known agencies.
    #[serde(default)]
    pub agencies: Vec<AgencyRule>,

    /// Tier pair a fresh session starts with.
    pub default_tiers: TierPair,
}

impl Default for CategoryRules {
    fn default() -> Self {
        let customer = |c: &str| CustomerTier::new(c);
        let commission = |c: &str| CommissionTier::new(c);

        CategoryRules {
            customer_tiers: ["K0", "K10", "K20", "K25", "K30"]
                .into_iter()
                .map(customer)
                .collect(),
            commission_tiers: ["C0", "C2", "C3", "NO EVENT"]
                .into_iter()
                .map(commission)
                .collect(),
            top_tier: customer("K30"),
            restricted_tier: customer("K20"),
            restricted_commission: commission("C3"),
            no_event: commission("NO EVENT"),
            agencies: vec![
                AgencyRule {
                    code: AgencyCode::new("PARTNER"),
                    forces: Some(TierPair::new(customer("K10"), commission("NO EVENT"))),
                },
                AgencyRule {
                    code: AgencyCode::new("REFERRAL"),
                    forces: None,
                },
            ],
            default_tiers: TierPair::new(customer("K10"), commission("C0")),
        }
    }
}

impl CategoryRules {
    // =========================================================================
    // Boundary Parsing
    // =========================================================================

    /// Parses a customer tier, rejecting codes outside the configured set.
    ///
    /// Matching is case-insensitive; the configured spelling is returned.
    pub fn customer_tier(&self, code: &str) -> Result<CustomerTier, ValidationError> {
        find_code(&self.customer_tiers, code)
            .ok_or_else(|| ValidationError::not_allowed("customer tier", &self.customer_tiers))
    }

    pub fn commission_tier(&self, code: &str) -> Result<CommissionTier, ValidationError> {
        find_code(&self.commission_tiers, code)
            .ok_or_else(|| ValidationError::not_allowed("commission tier", &self.commission_tiers))
    }

    /// Parses an agency code. An empty string means "no agency".
    pub fn agency(&self, code: &str) -> Result<Option<AgencyCode>, ValidationError> {
        if code.trim().is_empty() {
            return Ok(None);
        }

        self.agencies
            .iter()
            .find(|rule| rule.code.as_str().eq_ignore_ascii_case(code.trim()))
            .map(|rule| Some(rule.code.clone()))
            .ok_or_else(|| {
                ValidationError::not_allowed("agency", self.agencies.iter().map(|a| &a.code))
            })
    }

    // =========================================================================
    // Agency Rules
    // =========================================================================

    /// True for agencies that force a fixed tier pair.
    pub fn is_agency_constrained(&self, agency: Option<&AgencyCode>) -> bool {
        self.required_tiers(agency).is_some()
    }

    /// The forced pair for a constrained agency, `None` otherwise.
    pub fn required_tiers(&self, agency: Option<&AgencyCode>) -> Option<TierPair> {
        let agency = agency?;
        self.agencies
            .iter()
            .find(|rule| &rule.code == agency)
            .and_then(|rule| rule.forces.clone())
    }

    /// Resolves the tier pair in effect: the agency wins over manual tiers.
    pub fn effective_tiers(&self, manual: &TierPair, agency: Option<&AgencyCode>) -> TierPair {
        self.required_tiers(agency).unwrap_or_else(|| manual.clone())
    }

    // =========================================================================
    // Promotion Rules
    // =========================================================================

    /// True when no promotion may be shown for this tier combination.
    pub fn promotions_suppressed(&self, customer: &CustomerTier, commission: &CommissionTier) -> bool {
        customer == &self.top_tier
            || (customer == &self.restricted_tier && commission == &self.restricted_commission)
            || commission == &self.no_event
    }

    pub fn promotion_visible(
        &self,
        promotion: &Promotion,
        customer: &CustomerTier,
        commission: &CommissionTier,
    ) -> bool {
        !self.promotions_suppressed(customer, commission) && promotion.is_available_for(customer)
    }

    /// Filters promotions down to the selectable list, preserving order.
    pub fn visible_promotions<'a>(
        &self,
        promotions: &'a [Promotion],
        customer: &CustomerTier,
        commission: &CommissionTier,
    ) -> Vec<&'a Promotion> {
        if self.promotions_suppressed(customer, commission) {
            return Vec::new();
        }
        promotions
            .iter()
            .filter(|p| p.is_available_for(customer))
            .collect()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Checks that every role tier is a member of the configured lists.
    pub fn validate(&self) -> CoreResult<()> {
        if self.customer_tiers.is_empty() || self.commission_tiers.is_empty() {
            return Err(CoreError::InvalidRules(
                "customer and commission tier lists must not be empty".into(),
            ));
        }

        let customer_roles = [
            ("top_tier", &self.top_tier),
            ("restricted_tier", &self.restricted_tier),
            ("default_tiers.customer", &self.default_tiers.customer),
        ];
        for (role, tier) in customer_roles {
            if !self.customer_tiers.contains(tier) {
                return Err(CoreError::InvalidRules(format!(
                    "{role} '{tier}' is not a configured customer tier"
                )));
            }
        }

        let commission_roles = [
            ("restricted_commission", &self.restricted_commission),
            ("no_event", &self.no_event),
            ("default_tiers.commission", &self.default_tiers.commission),
        ];
        for (role, tier) in commission_roles {
            if !self.commission_tiers.contains(tier) {
                return Err(CoreError::InvalidRules(format!(
                    "{role} '{tier}' is not a configured commission tier"
                )));
            }
        }

        for (i, rule) in self.agencies.iter().enumerate() {
            if self.agencies[..i].iter().any(|other| other.code == rule.code) {
                return Err(CoreError::InvalidRules(format!(
                    "agency '{}' is listed twice",
                    rule.code
                )));
            }
            if let Some(forced) = &rule.forces {
                if !self.customer_tiers.contains(&forced.customer)
                    || !self.commission_tiers.contains(&forced.commission)
                {
                    return Err(CoreError::InvalidRules(format!(
                        "agency '{}' forces unknown tiers {}",
                        rule.code, forced
                    )));
                }
            }
        }

        Ok(())
    }
}

fn find_code<T: AsRef<str> + Clone>(codes: &[T], code: &str) -> Option<T> {
    let code = code.trim();
    codes
        .iter()
        .find(|c| c.as_ref().eq_ignore_ascii_case(code))
        .cloned()
}

// =============================================================================
// Unit Tests
// =============================================================================
