//! # jade-session: Session Controller for Jade Pricing
//!
//! This crate connects the pure pricing rules in `jade-core` to the outside
//! world: configuration, the catalog API, the exchange-rate service and the
//! clinic's spreadsheet exports.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Session Architecture                               │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                PricingSession (one per screen)                   │  │
//! │  │                                                                  │  │
//! │  │  selection ──► QuoteEngine ──► quote, rows, summary             │  │
//! │  │  fetch guards drop responses that arrive out of order           │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ CatalogSource  │  │  RateSource    │  │  CSV import            │    │
//! │  │                │  │                │  │                        │    │
//! │  │ REST API or    │  │ v4 rates API   │  │ procedures.csv         │    │
//! │  │ JSON document  │  │ + RateRefresher│  │ promotions.csv         │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  Fetch failures never reach the caller as errors: they become inline   │
//! │  notices and the last good data stays on screen.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Session error types
//! - [`catalog`] - Catalog sources (HTTP, JSON file)
//! - [`rates`] - Exchange-rate source and background refresher
//! - [`import`] - CSV import of procedures and promotions
//! - [`session`] - `PricingSession` and the shared-session reload helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jade_session::{HttpCatalogSource, PricingConfig, PricingSession};
//! use jade_session::session::{reload_procedures, reload_promotions};
//!
//! let config = PricingConfig::load_or_default(None);
//! let source = HttpCatalogSource::new(&config.catalog)?;
//! let session = PricingSession::new(&config).into_shared();
//!
//! reload_procedures(&session, &source).await;
//! reload_promotions(&session, &source).await;
//!
//! let summary = session.lock().await.summary();
//! println!("Final price: {}", summary.final_price.text);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod error;
pub mod import;
pub mod rates;
pub mod session;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{CatalogDocument, CatalogSource, FileCatalogSource, HttpCatalogSource};
pub use config::{CatalogSettings, CurrencySettings, PricingConfig, PricingSettings};
pub use error::{SessionError, SessionResult};
pub use rates::{HttpRateSource, RateRefresher, RateRefresherHandle, RateSource, RateStatus};
pub use session::{
    ApplyOutcome, CartSummary, FetchGuard, FetchTicket, PricingSession, SessionNotices,
    SharedSession,
};
