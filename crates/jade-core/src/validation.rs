//! # Validation Module
//!
//! Boundary validation for Jade Pricing.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Input edge (CLI args, CSV cells, wire records)               │
//! │  ├── Quantity text  → coerced by cart::parse_quantity, never rejected  │
//! │  └── Tier codes     → CategoryRules::customer_tier / commission_tier   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Custom entries (name, price, quantity)                            │
//! │  └── Catalog fields (names, prices, tax rate)                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Catalog::validate                                            │
//! │  └── Cross-record invariants (unique ids/codes, known tiers)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use jade_core::validation::validate_custom_entry;
//!
//! let entry = validate_custom_entry("Aftercare kit", 25_000, 2).unwrap();
//! assert_eq!(entry.quantity, 2);
//!
//! assert!(validate_custom_entry("", 25_000, 1).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::CustomCartEntry;
use crate::{MAX_ITEM_QUANTITY, MAX_NAME_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name for a catalog item or custom entry.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_NAME_LEN`] characters
///
/// ## Returns
/// The trimmed name.
pub fn validate_item_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the quantity of a custom entry.
///
/// Catalog quantities are coerced instead; a custom entry is an explicit
/// staff action, so a bad value is reported back.
pub fn validate_custom_quantity(qty: i64) -> ValidationResult<u32> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(qty as u32)
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10_000,
        });
    }

    Ok(())
}

// =============================================================================
// Custom Entries
// =============================================================================

/// Builds a custom cart entry from staff input.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Custom Item                                                  │
/// │                                                                         │
/// │  name "Aftercare kit", price 25000, qty 2                              │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_custom_entry ← THIS FUNCTION                                 │
/// │       │                                                                 │
/// │       ├── blank name?  → Required { field: "name" }                    │
/// │       ├── price <= 0?  → MustBePositive { field: "price" }             │
/// │       ├── qty ∉ 1..999 → MustBePositive / OutOfRange { "quantity" }    │
/// │       │                                                                 │
/// │       └── OK → CustomCartEntry with a fresh UUID v4                    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_custom_entry(
    name: &str,
    price_won: i64,
    quantity: i64,
) -> ValidationResult<CustomCartEntry> {
    let name = validate_item_name(name)?;

    if price_won <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    let quantity = validate_custom_quantity(quantity)?;

    Ok(CustomCartEntry {
        id: uuid::Uuid::new_v4().to_string(),
        name,
        price: Money::from_won(price_won),
        quantity,
    })
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string (custom entry ids).
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_item_name() {
        assert_eq!(validate_item_name("  Botox 100u ").unwrap(), "Botox 100u");
        assert!(validate_item_name("").is_err());
        assert!(validate_item_name("   ").is_err());
        assert!(validate_item_name(&"가".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_item_name(&"가".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_custom_quantity() {
        assert_eq!(validate_custom_quantity(1).unwrap(), 1);
        assert_eq!(validate_custom_quantity(999).unwrap(), 999);

        assert!(matches!(
            validate_custom_quantity(0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_custom_quantity(1000),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_custom_entry() {
        let entry = validate_custom_entry(" Aftercare kit ", 25_000, 2).unwrap();
        assert_eq!(entry.name, "Aftercare kit");
        assert_eq!(entry.price, Money::from_won(25_000));
        assert_eq!(entry.quantity, 2);
        assert!(validate_uuid(&entry.id).is_ok());

        let other = validate_custom_entry("Aftercare kit", 25_000, 2).unwrap();
        assert_ne!(entry.id, other.id);
    }

    #[test]
    fn test_invalid_custom_entry_names_field() {
        assert_eq!(
            validate_custom_entry("", 1_000, 1).unwrap_err(),
            ValidationError::Required {
                field: "name".into()
            }
        );
        assert_eq!(
            validate_custom_entry("Kit", 0, 1).unwrap_err(),
            ValidationError::MustBePositive {
                field: "price".into()
            }
        );
        assert_eq!(
            validate_custom_entry("Kit", 1_000, 0).unwrap_err(),
            ValidationError::MustBePositive {
                field: "quantity".into()
            }
        );
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(0).is_ok());
        assert!(validate_tax_rate_bps(1000).is_ok());
        assert!(validate_tax_rate_bps(10_000).is_ok());
        assert!(validate_tax_rate_bps(10_001).is_err());
    }
}
