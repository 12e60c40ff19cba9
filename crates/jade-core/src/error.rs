//! # Error Types
//!
//! Domain-specific error types for jade-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  jade-core errors (this file)                                          │
//! │  ├── CoreError        - Rule/state violations                          │
//! │  └── ValidationError  - Boundary input failures                        │
//! │                                                                         │
//! │  jade-session errors (separate crate)                                  │
//! │  └── SessionError     - Config, HTTP, CSV, JSON failures               │
//! │                                                                         │
//! │  NOT errors (handled by value):                                        │
//! │  • Unavailable price  → Option::None, rendered "-"                     │
//! │  • Bad quantity input → coerced to 0                                   │
//! │  • Missing rate       → base-currency display                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Pricing rule and selection-state errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Catalog item id is not part of the loaded catalog.
    #[error("Catalog item not found: {0}")]
    ItemNotFound(String),

    /// The item has no price, or is hidden, at the active tiers.
    #[error("Catalog item not available at the current tiers: {0}")]
    ItemNotPurchasable(String),

    /// A custom cart entry id is unknown.
    #[error("Custom entry not found: {0}")]
    CustomEntryNotFound(String),

    /// Manual tier edits are disabled while a constrained agency is selected.
    ///
    /// ## User Workflow
    /// ```text
    /// Select agency PARTNER ──► tiers forced to K10 / NO EVENT
    ///      │
    ///      ▼
    /// Staff picks K20 ──► TiersLockedByAgency { agency: "PARTNER" }
    ///      │
    ///      ▼
    /// UI keeps the tier dropdowns disabled
    /// ```
    #[error("Tiers are fixed by agency {agency}")]
    TiersLockedByAgency { agency: String },

    /// The configured tier rules are inconsistent.
    #[error("Invalid tier rules: {0}")]
    InvalidRules(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the boundary (tier codes, custom entries, imported catalog
/// records) before any pricing logic runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. non-numeric price cell).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in the configured set (unknown tier, agency, currency).
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g. two procedures with the same code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    pub(crate) fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub(crate) fn not_allowed<I, S>(field: &str, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ValidationError::NotAllowed {
            field: field.to_string(),
            allowed: allowed.into_iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::TiersLockedByAgency {
            agency: "PARTNER".to_string(),
        };
        assert_eq!(err.to_string(), "Tiers are fixed by agency PARTNER");

        let err = CoreError::ItemNotFound("proc-1".to_string());
        assert_eq!(err.to_string(), "Catalog item not found: proc-1");

        let err = CoreError::ItemNotPurchasable("proc-1".to_string());
        assert_eq!(
            err.to_string(),
            "Catalog item not available at the current tiers: proc-1"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(ValidationError::required("name").to_string(), "name is required");

        let err = ValidationError::not_allowed("customer tier", ["K0", "K10"]);
        assert_eq!(
            err.to_string(),
            "customer tier must be one of: [\"K0\", \"K10\"]"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("price").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
