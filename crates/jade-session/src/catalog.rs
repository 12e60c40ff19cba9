//! # Catalog Sources
//!
//! Where procedures and promotions come from.
//!
//! ```text
//! ┌──────────────────────┐
//! │   CatalogSource      │  async trait
//! │  procedures()        │
//! │  promotions(K, C)    │
//! └──────────┬───────────┘
//!            │
//!     ┌──────┴───────────────┐
//!     ▼                      ▼
//! HttpCatalogSource     FileCatalogSource
//! GET {api}/procedures  { "procedures": [...],
//! GET {api}/promotions    "promotions": [...] }
//!   ?customerCategory=K10  (also built by CSV import)
//!   &commissionCategory=C0
//! ```
//!
//! Sources return raw wire records. The session decodes them against the
//! configured tiers and re-applies the promotion visibility rules, so a
//! source that filters loosely (or not at all) is still safe.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use jade_core::catalog::{ProcedureRecord, PromotionRecord};
use jade_core::{CommissionTier, CustomerTier};

use crate::config::CatalogSettings;
use crate::error::{SessionError, SessionResult};

// =============================================================================
// Catalog Source Trait
// =============================================================================

/// Supplies catalog records.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn procedures(&self) -> SessionResult<Vec<ProcedureRecord>>;

    /// Promotions for a tier pair. Callers never ask while promotions are
    /// suppressed for that pair.
    async fn promotions(
        &self,
        customer: &CustomerTier,
        commission: &CommissionTier,
    ) -> SessionResult<Vec<PromotionRecord>>;
}

// =============================================================================
// HTTP Source
// =============================================================================

/// The clinic's catalog REST API.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: reqwest::Client,
    api_url: String,
}

impl HttpCatalogSource {
    pub fn new(settings: &CatalogSettings) -> SessionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(HttpCatalogSource {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn procedures(&self) -> SessionResult<Vec<ProcedureRecord>> {
        let url = format!("{}/procedures", self.api_url);
        get_json(&self.client, &url, &[]).await
    }

    async fn promotions(
        &self,
        customer: &CustomerTier,
        commission: &CommissionTier,
    ) -> SessionResult<Vec<PromotionRecord>> {
        let url = format!("{}/promotions", self.api_url);
        get_json(
            &self.client,
            &url,
            &[
                ("customerCategory", customer.as_str()),
                ("commissionCategory", commission.as_str()),
            ],
        )
        .await
    }
}

/// GETs `url` and decodes a JSON body, mapping non-2xx to `HttpStatus`.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> SessionResult<T> {
    debug!(url = %url, "GET");
    let resp = client.get(url).query(query).send().await?;

    if !resp.status().is_success() {
        return Err(SessionError::HttpStatus {
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }

    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

// =============================================================================
// File Source
// =============================================================================

/// A whole catalog in one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub procedures: Vec<ProcedureRecord>,

    #[serde(default)]
    pub promotions: Vec<PromotionRecord>,
}

/// Serves a catalog held in memory (from a JSON file or a CSV import).
#[derive(Debug, Clone, Default)]
pub struct FileCatalogSource {
    document: CatalogDocument,
}

impl FileCatalogSource {
    pub fn from_document(document: CatalogDocument) -> Self {
        FileCatalogSource { document }
    }

    /// Reads a catalog JSON document.
    pub async fn open(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        let document: CatalogDocument = serde_json::from_slice(&contents)?;

        debug!(
            ?path,
            procedures = document.procedures.len(),
            promotions = document.promotions.len(),
            "Catalog file loaded"
        );
        Ok(Self::from_document(document))
    }

    pub fn document(&self) -> &CatalogDocument {
        &self.document
    }
}

#[async_trait]
impl CatalogSource for FileCatalogSource {
    async fn procedures(&self) -> SessionResult<Vec<ProcedureRecord>> {
        Ok(self.document.procedures.clone())
    }

    /// Every promotion; the session applies visibility.
    async fn promotions(
        &self,
        _customer: &CustomerTier,
        _commission: &CommissionTier,
    ) -> SessionResult<Vec<PromotionRecord>> {
        Ok(self.document.promotions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "procedures": [
            { "id": "p1", "code": "PROBOTOX", "name": "Botox", "sort_order": 1,
              "priceK10": 50000, "priceK20": 45000, "priceK30": null }
        ],
        "promotions": [
            { "id": "promo1", "name": "Bundle", "description": "3 sessions",
              "price": 350000, "available_k10": true }
        ]
    }"#;

    #[tokio::test]
    async fn test_file_source_serves_document() {
        let document: CatalogDocument = serde_json::from_str(DOCUMENT).unwrap();
        let source = FileCatalogSource::from_document(document);

        let procedures = source.procedures().await.unwrap();
        assert_eq!(procedures.len(), 1);
        assert_eq!(procedures[0].code, "PROBOTOX");

        let promotions = source
            .promotions(&CustomerTier::new("K30"), &CommissionTier::new("C0"))
            .await
            .unwrap();
        assert_eq!(promotions.len(), 1);
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let result = FileCatalogSource::open("/nonexistent/jade-catalog.json").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_document_sections_are_optional() {
        let document: CatalogDocument = serde_json::from_str(r#"{ "procedures": [] }"#).unwrap();
        assert!(document.promotions.is_empty());
    }

    #[test]
    fn test_http_source_trims_trailing_slash() {
        let source = HttpCatalogSource::new(&CatalogSettings {
            api_url: "http://localhost:3000/api/".into(),
            request_timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(source.api_url, "http://localhost:3000/api");
    }
}
