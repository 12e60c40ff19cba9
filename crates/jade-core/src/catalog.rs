//! # Catalog
//!
//! The loaded procedure and promotion lists, plus the decoding of flat wire
//! records into tier-keyed maps.
//!
//! ## Wire Decoding
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  { "id": "p1", "name": "Botox", "priceK10": 50000, "priceK30": null,   │
//! │    "price_k99": 1, "created_at": "..." }                                │
//! │       │                                                                 │
//! │       ▼  ProcedureRecord::into_procedure(&rules)                        │
//! │                                                                         │
//! │  prices = { K10: Some(₩50,000), K30: None }                             │
//! │  ignored = ["price_k99"]          ← tier not configured, caller logs    │
//! │  "created_at"                     ← not tier-shaped, dropped silently   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tier keys are matched case-insensitively as `price<TIER>`,
//! `price_<tier>`, `available<TIER>` or `available_<tier>`.
//!
//! ## Invariants
//! Enforced whenever a list is loaded or replaced:
//! - item ids are unique across procedures AND promotions (quantities are
//!   keyed by id)
//! - codes are unique within each list
//! - prices are non-negative
//! - names are non-blank
//! - procedures are kept in `sort_order`, ties in load order

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::rules::CategoryRules;
use crate::types::{CustomerTier, Procedure, Promotion};
use crate::validation::validate_item_name;

/// Prefix for generated business codes.
pub const CODE_PREFIX: &str = "PRO";

/// Alphanumerics taken from the name when generating a code.
const CODE_NAME_CHARS: usize = 7;

// =============================================================================
// Catalog
// =============================================================================

/// Validated catalog contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    procedures: Vec<Procedure>,
    promotions: Vec<Promotion>,
}

impl Catalog {
    /// Validates and orders a full catalog.
    pub fn new(
        procedures: Vec<Procedure>,
        promotions: Vec<Promotion>,
        rules: &CategoryRules,
    ) -> CoreResult<Self> {
        let mut catalog = Catalog::default();
        catalog.replace_procedures(procedures, rules)?;
        catalog.replace_promotions(promotions, rules)?;
        Ok(catalog)
    }

    /// Procedures in display order.
    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    pub fn promotions(&self) -> &[Promotion] {
        &self.promotions
    }

    pub fn procedure(&self, id: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.id == id)
    }

    pub fn promotion(&self, id: &str) -> Option<&Promotion> {
        self.promotions.iter().find(|p| p.id == id)
    }

    /// True when `id` names a procedure or promotion.
    pub fn contains_item(&self, id: &str) -> bool {
        self.procedure(id).is_some() || self.promotion(id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty() && self.promotions.is_empty()
    }

    /// Replaces the procedure list. On error the catalog is unchanged.
    pub fn replace_procedures(
        &mut self,
        mut procedures: Vec<Procedure>,
        rules: &CategoryRules,
    ) -> CoreResult<()> {
        validate_items(&procedures, &self.promotions, rules)?;
        // sort_by_key is stable, so equal sort_order keeps load order.
        procedures.sort_by_key(|p| p.sort_order);
        self.procedures = procedures;
        Ok(())
    }

    /// Replaces the promotion list. On error the catalog is unchanged.
    pub fn replace_promotions(
        &mut self,
        promotions: Vec<Promotion>,
        rules: &CategoryRules,
    ) -> CoreResult<()> {
        validate_items(&self.procedures, &promotions, rules)?;
        self.promotions = promotions;
        Ok(())
    }

    pub fn clear_procedures(&mut self) {
        self.procedures.clear();
    }

    pub fn clear_promotions(&mut self) {
        self.promotions.clear();
    }

    /// Distinct procedure types in catalog order (the type tabs).
    pub fn procedure_types(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.procedures
            .iter()
            .map(|p| p.procedure_type.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }
}

fn validate_items(
    procedures: &[Procedure],
    promotions: &[Promotion],
    rules: &CategoryRules,
) -> Result<(), ValidationError> {
    let mut ids = BTreeSet::new();
    let mut codes = BTreeSet::new();

    for procedure in procedures {
        check_identity(&procedure.id, &procedure.code, &procedure.name, &mut ids, &mut codes)?;

        for (tier, price) in &procedure.prices {
            check_tier(rules, tier)?;
            if price.is_some_and(|p| p.is_negative()) {
                return Err(negative_price(&procedure.id));
            }
        }
    }

    codes.clear();
    for promotion in promotions {
        check_identity(&promotion.id, &promotion.code, &promotion.name, &mut ids, &mut codes)?;

        if promotion.price.is_negative() {
            return Err(negative_price(&promotion.id));
        }
        for tier in promotion.availability.keys() {
            check_tier(rules, tier)?;
        }
    }

    Ok(())
}

fn check_identity(
    id: &str,
    code: &str,
    name: &str,
    ids: &mut BTreeSet<String>,
    codes: &mut BTreeSet<String>,
) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }
    validate_item_name(name)?;

    if !ids.insert(id.to_string()) {
        return Err(ValidationError::Duplicate {
            field: "id".to_string(),
            value: id.to_string(),
        });
    }
    if !code.is_empty() && !codes.insert(code.to_string()) {
        return Err(ValidationError::Duplicate {
            field: "code".to_string(),
            value: code.to_string(),
        });
    }

    Ok(())
}

fn check_tier(rules: &CategoryRules, tier: &CustomerTier) -> Result<(), ValidationError> {
    if rules.customer_tiers.contains(tier) {
        Ok(())
    } else {
        Err(ValidationError::not_allowed("customer tier", &rules.customer_tiers))
    }
}

fn negative_price(id: &str) -> ValidationError {
    ValidationError::InvalidFormat {
        field: "price".to_string(),
        reason: format!("item '{id}' has a negative price"),
    }
}

/// Generates a business code from an item name: `PRO` followed by the first
/// seven alphanumerics, upper-cased.
///
/// ```rust
/// use jade_core::catalog::default_code;
///
/// assert_eq!(default_code("Botox (Forehead) 50u"), "PROBOTOXFO");
/// ```
pub fn default_code(name: &str) -> String {
    let tail: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(CODE_NAME_CHARS)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("{CODE_PREFIX}{tail}")
}

// =============================================================================
// Wire Records
// =============================================================================

/// A procedure as returned by the catalog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureRecord {
    pub id: String,

    #[serde(default)]
    pub code: String,

    pub name: String,

    #[serde(default, alias = "type", alias = "procedureType")]
    pub procedure_type: Option<String>,

    #[serde(default, alias = "sortOrder")]
    pub sort_order: Option<i64>,

    /// Tier price columns and anything else the API sends.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// A promotion as returned by the catalog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub id: String,

    #[serde(default)]
    pub code: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub price: Value,

    /// Tier availability flags and anything else the API sends.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// A decoded item plus the tier-shaped keys that matched no configured tier.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub item: T,
    pub ignored_keys: Vec<String>,
}

/// Default procedure type when the record has none.
pub const DEFAULT_PROCEDURE_TYPE: &str = "MAIN";

impl ProcedureRecord {
    pub fn into_procedure(self, rules: &CategoryRules) -> Result<Decoded<Procedure>, ValidationError> {
        let mut prices = BTreeMap::new();
        let mut ignored_keys = Vec::new();

        for (key, value) in &self.fields {
            let Some(suffix) = tier_suffix(key, "price") else {
                continue;
            };
            match find_tier(rules, suffix) {
                Some(tier) => {
                    prices.insert(tier, decode_price(key, value)?);
                }
                None => ignored_keys.push(key.clone()),
            }
        }

        let code = if self.code.trim().is_empty() {
            default_code(&self.name)
        } else {
            self.code.trim().to_string()
        };

        Ok(Decoded {
            item: Procedure {
                id: self.id,
                code,
                name: self.name.trim().to_string(),
                procedure_type: self
                    .procedure_type
                    .filter(|t| !t.trim().is_empty())
                    .map(|t| t.trim().to_uppercase())
                    .unwrap_or_else(|| DEFAULT_PROCEDURE_TYPE.to_string()),
                prices,
                sort_order: self.sort_order.unwrap_or(0),
            },
            ignored_keys,
        })
    }
}

impl PromotionRecord {
    pub fn into_promotion(self, rules: &CategoryRules) -> Result<Decoded<Promotion>, ValidationError> {
        let mut availability = BTreeMap::new();
        let mut ignored_keys = Vec::new();

        for (key, value) in &self.fields {
            let Some(suffix) = tier_suffix(key, "available") else {
                continue;
            };
            match find_tier(rules, suffix) {
                Some(tier) => {
                    availability.insert(tier, decode_flag(key, value)?);
                }
                None => ignored_keys.push(key.clone()),
            }
        }

        let price = decode_price("price", &self.price)?.ok_or_else(|| ValidationError::required("price"))?;

        let code = if self.code.trim().is_empty() {
            default_code(&self.name)
        } else {
            self.code.trim().to_string()
        };

        Ok(Decoded {
            item: Promotion {
                id: self.id,
                code,
                name: self.name.trim().to_string(),
                description: self.description.unwrap_or_default(),
                price,
                availability,
            },
            ignored_keys,
        })
    }
}

/// Strips `prefix` (and an optional `_`) from a key, case-insensitively.
fn tier_suffix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let head = key.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &key[prefix.len()..];
    let rest = rest.strip_prefix('_').unwrap_or(rest);
    (!rest.is_empty()).then_some(rest)
}

fn find_tier(rules: &CategoryRules, suffix: &str) -> Option<CustomerTier> {
    rules
        .customer_tiers
        .iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(suffix))
        .cloned()
}

/// `null` is "not offered"; numbers and numeric strings are prices.
fn decode_price(key: &str, value: &Value) -> Result<Option<Money>, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: key.to_string(),
        reason: reason.to_string(),
    };

    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .and_then(Money::from_wire)
            .map(Some)
            .ok_or_else(|| invalid("not a finite number")),
        Value::String(s) => parse_price_text(s).map_err(|_| invalid("not a number")),
        _ => Err(invalid("expected a number or null")),
    }
}

/// Parses a price cell: commas are stripped, blank means "not offered".
pub fn parse_price_text(text: &str) -> Result<Option<Money>, ValidationError> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Ok(None);
    }

    cleaned
        .parse::<f64>()
        .ok()
        .and_then(Money::from_wire)
        .map(Some)
        .ok_or_else(|| ValidationError::InvalidFormat {
            field: "price".to_string(),
            reason: format!("'{}' is not a number", text.trim()),
        })
}

fn decode_flag(key: &str, value: &Value) -> Result<bool, ValidationError> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Value::String(s) => parse_flag_text(s).ok_or_else(|| ValidationError::InvalidFormat {
            field: key.to_string(),
            reason: format!("'{s}' is not a boolean"),
        }),
        _ => Err(ValidationError::InvalidFormat {
            field: key.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Parses an availability cell. Blank is unavailable.
pub fn parse_flag_text(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" | "" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
