//! # Pricing Configuration
//!
//! Tax, tier rules, currency and catalog settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     JADE_TAX_RATE=10                                                   │
//! │     JADE_API_URL=https://clinic.example/api                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/jade-pricing/jade.toml (Linux)                           │
//! │     ~/Library/Application Support/com.jade.pricing/jade.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     10% tax, no exempt ids, K0..K30 tiers, KRW display                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [pricing]
//! tax_rate_bps = 1000
//! tax_exempt_ids = ["proc-anesthesia-cream", "proc-sleep-anesthesia"]
//!
//! [tiers]
//! customer_tiers = ["K0", "K10", "K20", "K25", "K30"]
//! top_tier = "K30"
//!
//! [[tiers.agencies]]
//! code = "PARTNER"
//! forces = { customer = "K10", commission = "NO EVENT" }
//!
//! [currency]
//! display = "USD"
//! refresh_interval_secs = 300
//!
//! [catalog]
//! api_url = "http://localhost:3000/api"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use jade_core::validation::validate_tax_rate_bps;
use jade_core::{
    CartAggregator, CategoryRules, Currency, PriceResolver, QuoteEngine, TaxExemptions, TaxRate,
};

use crate::error::{SessionError, SessionResult};

// =============================================================================
// Pricing Settings
// =============================================================================

/// Tax settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Tax rate in basis points (1000 = 10%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// Procedure ids excluded from tax.
    #[serde(default)]
    pub tax_exempt_ids: Vec<String>,
}

fn default_tax_rate_bps() -> u32 {
    TaxRate::STANDARD.bps()
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            tax_rate_bps: default_tax_rate_bps(),
            tax_exempt_ids: Vec::new(),
        }
    }
}

// =============================================================================
// Currency Settings
// =============================================================================

/// Display currency and exchange-rate refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencySettings {
    /// Currency every catalog amount is stored in.
    #[serde(default)]
    pub base: Currency,

    /// Currency selected at startup.
    #[serde(default)]
    pub display: Currency,

    /// Rate endpoint; the base code is appended as the last path segment.
    #[serde(default = "default_rates_url")]
    pub rates_url: String,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Rates older than this are treated as unavailable.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_rates_url() -> String {
    "https://api.exchangerate-api.com/v4/latest".to_string()
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_stale_after() -> u64 {
    900
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            base: Currency::Krw,
            display: Currency::Krw,
            rates_url: default_rates_url(),
            refresh_interval_secs: default_refresh_interval(),
            stale_after_secs: default_stale_after(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Catalog Settings
// =============================================================================

/// Where the catalog comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSettings {
    /// REST base URL serving `/procedures` and `/promotions`.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:3000/api".to_string()
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Main Pricing Configuration
// =============================================================================

/// Complete configurator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub pricing: PricingSettings,

    /// Tier scheme and agency rules.
    #[serde(default)]
    pub tiers: CategoryRules,

    #[serde(default)]
    pub currency: CurrencySettings,

    #[serde(default)]
    pub catalog: CatalogSettings,
}

impl PricingConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (jade.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SessionResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading pricing config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load pricing config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SessionResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SessionError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Pricing config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SessionResult<()> {
        validate_tax_rate_bps(self.pricing.tax_rate_bps)?;
        self.tiers.validate()?;

        // Money is whole won; any other base would misprice every item.
        if self.currency.base != Currency::Krw {
            return Err(SessionError::InvalidConfig(format!(
                "base currency must be KRW, got {}",
                self.currency.base
            )));
        }

        for (name, url) in [
            ("currency.rates_url", &self.currency.rates_url),
            ("catalog.api_url", &self.catalog.api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SessionError::InvalidConfig(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        for (name, secs) in [
            ("currency.refresh_interval_secs", self.currency.refresh_interval_secs),
            ("currency.stale_after_secs", self.currency.stale_after_secs),
            ("currency.request_timeout_secs", self.currency.request_timeout_secs),
            ("catalog.request_timeout_secs", self.catalog.request_timeout_secs),
        ] {
            if secs == 0 {
                return Err(SessionError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }

    /// Applies `JADE_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Tax rate, given as a percentage
        if let Some(rate) = var("JADE_TAX_RATE") {
            match rate.trim().parse::<f64>() {
                Ok(pct) if pct.is_finite() && pct >= 0.0 => {
                    debug!(tax_rate = pct, "Overriding tax rate from environment");
                    self.pricing.tax_rate_bps = TaxRate::from_percentage(pct).bps();
                }
                _ => warn!(value = %rate, "Ignoring invalid JADE_TAX_RATE"),
            }
        }

        // Tax-exempt procedure ids, comma separated
        if let Some(ids) = var("JADE_TAX_EXEMPT_IDS") {
            self.pricing.tax_exempt_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
            debug!(count = self.pricing.tax_exempt_ids.len(), "Overriding tax-exempt ids from environment");
        }

        if let Some(url) = var("JADE_API_URL") {
            debug!(url = %url, "Overriding catalog API URL from environment");
            self.catalog.api_url = url;
        }

        if let Some(url) = var("JADE_RATES_URL") {
            debug!(url = %url, "Overriding rates URL from environment");
            self.currency.rates_url = url;
        }

        if let Some(secs) = var("JADE_RATE_REFRESH_SECS") {
            if let Ok(s) = secs.trim().parse::<u64>() {
                self.currency.refresh_interval_secs = s;
            } else {
                warn!(value = %secs, "Ignoring invalid JADE_RATE_REFRESH_SECS");
            }
        }

        if let Some(code) = var("JADE_DISPLAY_CURRENCY") {
            match code.parse::<Currency>() {
                Ok(currency) => self.currency.display = currency,
                Err(_) => warn!(value = %code, "Unknown display currency in environment"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "jade", "pricing")
            .map(|dirs| dirs.config_dir().join("jade.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.pricing.tax_rate_bps)
    }

    pub fn tax_exemptions(&self) -> TaxExemptions {
        TaxExemptions::new(self.pricing.tax_exempt_ids.iter().cloned())
    }

    /// Builds the pricing rules this configuration describes.
    pub fn quote_engine(&self) -> QuoteEngine {
        QuoteEngine::new(
            self.tiers.clone(),
            PriceResolver::new(self.tax_exemptions()),
            CartAggregator::new(self.tax_rate()),
        )
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.currency.refresh_interval_secs)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.currency.stale_after_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = PricingConfig::default();
        assert_eq!(config.tax_rate(), TaxRate::STANDARD);
        assert!(config.tax_exemptions().is_empty());
        assert_eq!(config.currency.refresh_interval_secs, 300);
        assert_eq!(config.currency.display, Currency::Krw);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: PricingConfig = toml::from_str(
            r#"
            [pricing]
            tax_exempt_ids = ["proc-anesthesia-cream"]

            [tiers]
            top_tier = "K25"

            [currency]
            display = "USD"
            "#,
        )
        .unwrap();

        assert_eq!(config.pricing.tax_rate_bps, 1000);
        assert_eq!(config.tiers.top_tier.as_str(), "K25");
        assert_eq!(config.tiers.customer_tiers.len(), 5);
        assert_eq!(config.currency.display, Currency::Usd);
        assert_eq!(config.catalog.api_url, "http://localhost:3000/api");
        assert!(config.tax_exemptions().contains("proc-anesthesia-cream"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_agency_table_parses() {
        let config: PricingConfig = toml::from_str(
            r#"
            [[tiers.agencies]]
            code = "PARTNER"
            forces = { customer = "K10", commission = "NO EVENT" }

            [[tiers.agencies]]
            code = "WALKIN"
            "#,
        )
        .unwrap();

        assert_eq!(config.tiers.agencies.len(), 2);
        assert!(config.tiers.agencies[1].forces.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PricingConfig::default();

        config.pricing.tax_rate_bps = 10_001;
        assert!(config.validate().is_err());

        config = PricingConfig::default();
        config.catalog.api_url = "ftp://catalog".into();
        assert!(matches!(config.validate(), Err(SessionError::InvalidConfig(_))));

        config = PricingConfig::default();
        config.currency.refresh_interval_secs = 0;
        assert!(config.validate().is_err());

        config = PricingConfig::default();
        config.currency.base = Currency::Usd;
        assert!(config.validate().is_err());

        config = PricingConfig::default();
        config.tiers.restricted_tier = jade_core::CustomerTier::new("K99");
        assert!(config.validate().unwrap_err().is_config_error());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("JADE_TAX_RATE", "8.5"),
            ("JADE_TAX_EXEMPT_IDS", "proc-a, proc-b,,"),
            ("JADE_API_URL", "https://clinic.example/api"),
            ("JADE_RATE_REFRESH_SECS", "60"),
            ("JADE_DISPLAY_CURRENCY", "eur"),
        ]);

        let mut config = PricingConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.pricing.tax_rate_bps, 850);
        assert_eq!(config.pricing.tax_exempt_ids, ["proc-a", "proc-b"]);
        assert_eq!(config.catalog.api_url, "https://clinic.example/api");
        assert_eq!(config.currency.refresh_interval_secs, 60);
        assert_eq!(config.currency.display, Currency::Eur);
    }

    #[test]
    fn test_invalid_env_values_ignored() {
        let mut config = PricingConfig::default();
        config.apply_overrides(|key| match key {
            "JADE_TAX_RATE" => Some("ten".into()),
            "JADE_DISPLAY_CURRENCY" => Some("JPY".into()),
            _ => None,
        });

        assert_eq!(config.pricing.tax_rate_bps, 1000);
        assert_eq!(config.currency.display, Currency::Krw);
    }

    #[test]
    fn test_toml_serialization() {
        let config = PricingConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[pricing]"));
        assert!(toml_str.contains("[currency]"));

        let parsed: PricingConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
