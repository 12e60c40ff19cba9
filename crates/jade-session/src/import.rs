//! # CSV Catalog Import
//!
//! Turns the clinic's spreadsheet exports into catalog records.
//!
//! ## Accepted Layouts
//! ```text
//! procedures.csv
//!   Procedure, K10 Price (₩), K20 Price (₩), K30 Price (₩)
//!   Botox,     "50,000",      "45,000",      ""            ◄── blank = not offered
//!
//!   optional: id, code, type, sort_order
//!   price columns may also be spelled priceK10 / price_k10
//!
//! promotions.csv
//!   name,   package,    price (₩),  available_k10, available_k20
//!   Bundle, 3 sessions, "350,000",  true,          false
//!
//!   optional: id, code
//! ```
//!
//! Codes default to `PRO` + the first seven letters/digits of the name, and
//! ids default to the code, so re-importing the same sheet yields the same
//! ids. Every tier column must name a configured customer tier.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use jade_core::catalog::{default_code, parse_flag_text, parse_price_text, ProcedureRecord, PromotionRecord};
use jade_core::CategoryRules;

use crate::catalog::CatalogDocument;
use crate::error::{SessionError, SessionResult};

// =============================================================================
// Column Mapping
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Id,
    Code,
    Name,
    Description,
    ProcedureType,
    SortOrder,
    Price,
    TierPrice(String),
    TierAvailable(String),
    Ignored,
}

fn normalize(header: &str) -> String {
    header.trim().to_ascii_lowercase()
}

/// `K10 Price (₩)` or `priceK10` / `price_k10`.
fn tier_price_column(header: &str) -> Option<String> {
    if let Some((tier, rest)) = header.split_once(char::is_whitespace) {
        if !tier.is_empty() && rest.trim_start().starts_with("price") {
            return Some(tier.to_ascii_uppercase());
        }
    }

    tier_suffix(header, "price")
}

/// `available_k10` / `availableK10` / `available k10`.
fn tier_available_column(header: &str) -> Option<String> {
    tier_suffix(header, "available")
}

fn tier_suffix(header: &str, prefix: &str) -> Option<String> {
    let rest = header.strip_prefix(prefix)?;
    let rest = rest.trim_start_matches(['_', ' ']);
    (!rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| rest.to_ascii_uppercase())
}

fn procedure_column(header: &str) -> Column {
    let h = normalize(header);
    match h.as_str() {
        "id" => Column::Id,
        "code" => Column::Code,
        "procedure" | "name" => Column::Name,
        "type" | "procedure type" | "procedure_type" => Column::ProcedureType,
        "sort_order" | "sort order" | "sortorder" => Column::SortOrder,
        _ => tier_price_column(&h).map_or(Column::Ignored, Column::TierPrice),
    }
}

fn promotion_column(header: &str) -> Column {
    let h = normalize(header);
    match h.as_str() {
        "id" => Column::Id,
        "code" => Column::Code,
        "name" | "promotion" => Column::Name,
        "package" | "description" => Column::Description,
        _ if h == "price" || h.starts_with("price ") || h.starts_with("price(") => Column::Price,
        _ => tier_available_column(&h).map_or(Column::Ignored, Column::TierAvailable),
    }
}

fn map_headers(
    headers: &csv::StringRecord,
    classify: fn(&str) -> Column,
    required: &[(Column, &str)],
    rules: &CategoryRules,
) -> SessionResult<Vec<Column>> {
    let known_tier = |header: &str, tier: &str| {
        rules
            .customer_tier(tier)
            .map(|t| t.as_str().to_string())
            .map_err(|_| row_error(1, format!("column '{header}' names unknown tier '{tier}'")))
    };

    let columns = headers
        .iter()
        .map(|header| match classify(header) {
            Column::TierPrice(tier) => known_tier(header, &tier).map(Column::TierPrice),
            Column::TierAvailable(tier) => known_tier(header, &tier).map(Column::TierAvailable),
            column => Ok(column),
        })
        .collect::<SessionResult<Vec<_>>>()?;

    for (column, label) in required {
        if !columns.contains(column) {
            return Err(SessionError::Import {
                line: 1,
                reason: format!("missing '{label}' column"),
            });
        }
    }
    Ok(columns)
}

// =============================================================================
// Row Helpers
// =============================================================================

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source)
}

fn row_error(line: u64, reason: impl Into<String>) -> SessionError {
    SessionError::Import {
        line,
        reason: reason.into(),
    }
}

fn price_cell(line: u64, label: &str, text: &str) -> SessionResult<Value> {
    match parse_price_text(text).map_err(|e| row_error(line, format!("{label}: {e}")))? {
        Some(price) if price.is_negative() => Err(row_error(line, format!("{label} is negative"))),
        Some(price) => Ok(Value::from(price.won())),
        None => Ok(Value::Null),
    }
}

/// Tracks ids and codes already seen in one file.
#[derive(Default)]
struct SeenKeys {
    ids: HashSet<String>,
    codes: HashSet<String>,
}

impl SeenKeys {
    fn check(&mut self, line: u64, id: &str, code: &str) -> SessionResult<()> {
        if !self.ids.insert(id.to_string()) {
            return Err(row_error(line, format!("duplicate id '{id}'")));
        }
        if !self.codes.insert(code.to_string()) {
            return Err(row_error(line, format!("duplicate code '{code}'")));
        }
        Ok(())
    }
}

/// Id, code and name for one row, with defaults filled in.
fn identity(
    line: u64,
    id: Option<String>,
    code: Option<String>,
    name: Option<String>,
) -> SessionResult<(String, String, String)> {
    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| row_error(line, "name is required"))?;
    let code = code
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| default_code(&name));
    let id = id.filter(|i| !i.is_empty()).unwrap_or_else(|| code.clone());
    Ok((id, code, name))
}

// =============================================================================
// Procedures
// =============================================================================

/// Reads procedure records from CSV.
pub fn import_procedures<R: Read>(
    source: R,
    rules: &CategoryRules,
) -> SessionResult<Vec<ProcedureRecord>> {
    let mut csv_reader = reader(source);
    let columns = map_headers(
        csv_reader.headers()?,
        procedure_column,
        &[(Column::Name, "Procedure")],
        rules,
    )?;

    let mut seen = SeenKeys::default();
    let mut records = Vec::new();

    for result in csv_reader.records() {
        let row = result?;
        let line = row.position().map_or(0, |p| p.line());

        let mut id = None;
        let mut code = None;
        let mut name = None;
        let mut procedure_type = None;
        let mut sort_order = None;
        let mut fields = BTreeMap::new();

        for (column, cell) in columns.iter().zip(row.iter()) {
            match column {
                Column::Id => id = Some(cell.to_string()),
                Column::Code => code = Some(cell.to_string()),
                Column::Name => name = Some(cell.to_string()),
                Column::ProcedureType => {
                    procedure_type = Some(cell.to_string()).filter(|t| !t.is_empty())
                }
                Column::SortOrder if !cell.is_empty() => {
                    let order = cell
                        .parse::<i64>()
                        .map_err(|_| row_error(line, format!("sort_order '{cell}' is not a whole number")))?;
                    sort_order = Some(order);
                }
                Column::TierPrice(tier) => {
                    let label = format!("{tier} price");
                    fields.insert(format!("price{tier}"), price_cell(line, &label, cell)?);
                }
                _ => {}
            }
        }

        let (id, code, name) = identity(line, id, code, name)?;
        seen.check(line, &id, &code)?;

        records.push(ProcedureRecord {
            id,
            code,
            name,
            procedure_type,
            sort_order,
            fields,
        });
    }

    info!(count = records.len(), "Procedures imported from CSV");
    Ok(records)
}

// =============================================================================
// Promotions
// =============================================================================

/// Reads promotion records from CSV.
pub fn import_promotions<R: Read>(
    source: R,
    rules: &CategoryRules,
) -> SessionResult<Vec<PromotionRecord>> {
    let mut csv_reader = reader(source);
    let columns = map_headers(
        csv_reader.headers()?,
        promotion_column,
        &[(Column::Name, "name"), (Column::Price, "price")],
        rules,
    )?;

    let mut seen = SeenKeys::default();
    let mut records = Vec::new();

    for result in csv_reader.records() {
        let row = result?;
        let line = row.position().map_or(0, |p| p.line());

        let mut id = None;
        let mut code = None;
        let mut name = None;
        let mut description = None;
        let mut price = Value::Null;
        let mut fields = BTreeMap::new();

        for (column, cell) in columns.iter().zip(row.iter()) {
            match column {
                Column::Id => id = Some(cell.to_string()),
                Column::Code => code = Some(cell.to_string()),
                Column::Name => name = Some(cell.to_string()),
                Column::Description => description = Some(cell.to_string()),
                Column::Price => price = price_cell(line, "price", cell)?,
                Column::TierAvailable(tier) => {
                    let flag = parse_flag_text(cell).ok_or_else(|| {
                        row_error(line, format!("available_{tier}: '{cell}' is not true/false"))
                    })?;
                    fields.insert(format!("available_{tier}"), Value::Bool(flag));
                }
                _ => {}
            }
        }

        if price.is_null() {
            return Err(row_error(line, "price is required"));
        }

        let (id, code, name) = identity(line, id, code, name)?;
        seen.check(line, &id, &code)?;

        records.push(PromotionRecord {
            id,
            code,
            name,
            description,
            price,
            fields,
        });
    }

    info!(count = records.len(), "Promotions imported from CSV");
    Ok(records)
}

// =============================================================================
// Files
// =============================================================================

pub fn import_procedures_file(
    path: impl AsRef<Path>,
    rules: &CategoryRules,
) -> SessionResult<Vec<ProcedureRecord>> {
    import_procedures(File::open(path)?, rules)
}

pub fn import_promotions_file(
    path: impl AsRef<Path>,
    rules: &CategoryRules,
) -> SessionResult<Vec<PromotionRecord>> {
    import_promotions(File::open(path)?, rules)
}

/// Builds a catalog document from either or both CSV exports.
pub fn import_catalog(
    procedures: Option<&Path>,
    promotions: Option<&Path>,
    rules: &CategoryRules,
) -> SessionResult<CatalogDocument> {
    Ok(CatalogDocument {
        procedures: procedures
            .map(|path| import_procedures_file(path, rules))
            .transpose()?
            .unwrap_or_default(),
        promotions: promotions
            .map(|path| import_promotions_file(path, rules))
            .transpose()?
            .unwrap_or_default(),
    })
}
