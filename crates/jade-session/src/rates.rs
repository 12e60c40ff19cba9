//! # Exchange Rates
//!
//! Fetches rate tables and keeps them fresh in the background.
//!
//! ## Refresh Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RateRefresher                                   │
//! │                                                                         │
//! │   start ──► tick (immediate) ──► reload_rates ──► session.rates        │
//! │                │                      │                                 │
//! │                │                      └── failure: keep last good      │
//! │                │                          table, record rates_error     │
//! │                ▼                                                        │
//! │   every refresh_interval_secs (default 300) ──► reload_rates           │
//! │                                                                         │
//! │   shutdown_rx.recv() ──► loop exits                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The response shape is the exchangerate-api.com v4 document:
//! `{ "base": "KRW", "rates": { "USD": 0.00072, ... } }`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use jade_core::{Currency, RateTable};

use crate::catalog::get_json;
use crate::config::CurrencySettings;
use crate::error::{SessionError, SessionResult};
use crate::session::{reload_rates, ApplyOutcome, SharedSession};

// =============================================================================
// Rate Source Trait
// =============================================================================

/// Supplies exchange rates from a base currency.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self, base: Currency) -> SessionResult<RateTable>;
}

/// exchangerate-api.com style endpoint.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
    rates_url: String,
}

impl HttpRateSource {
    pub fn new(settings: &CurrencySettings) -> SessionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(HttpRateSource {
            client,
            rates_url: settings.rates_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rates(&self, base: Currency) -> SessionResult<RateTable> {
        let url = format!("{}/{}", self.rates_url, base.code());
        let body: Value = get_json(&self.client, &url, &[]).await?;
        parse_rates_response(base, &body, Utc::now())
    }
}

/// Builds a rate table from a v4 response body.
///
/// Only supported currencies are kept; zero, negative and non-numeric rates
/// are dropped.
pub fn parse_rates_response(
    base: Currency,
    body: &Value,
    fetched_at: DateTime<Utc>,
) -> SessionResult<RateTable> {
    if let Some(reported) = body.get("base").and_then(Value::as_str) {
        if !reported.eq_ignore_ascii_case(base.code()) {
            return Err(SessionError::InvalidResponse(format!(
                "asked for {} rates, got {}",
                base, reported
            )));
        }
    }

    let raw = body
        .get("rates")
        .and_then(Value::as_object)
        .ok_or_else(|| SessionError::InvalidResponse("missing 'rates' object".into()))?;

    let rates: BTreeMap<Currency, f64> = Currency::ALL
        .into_iter()
        .filter(|c| *c != base)
        .filter_map(|c| {
            let rate = raw.get(c.code()).and_then(Value::as_f64)?;
            (rate.is_finite() && rate > 0.0).then_some((c, rate))
        })
        .collect();

    Ok(RateTable::new(base, rates, fetched_at))
}

// =============================================================================
// Rate Status
// =============================================================================

/// Rate health shown next to the currency selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateStatus {
    /// When the table in use was fetched.
    pub fetched_at: Option<DateTime<Utc>>,

    /// Currencies with a usable rate.
    pub available: Vec<Currency>,

    /// The table is too old to use; conversions fall back to KRW.
    pub stale: bool,

    /// Last refresh failure, cleared by the next success.
    pub last_error: Option<String>,
}

// =============================================================================
// Rate Refresher
// =============================================================================

/// Background task that reloads rates on an interval.
pub struct RateRefresher {
    session: SharedSession,
    source: Arc<dyn RateSource>,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for stopping a running refresher.
pub struct RateRefresherHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl RateRefresherHandle {
    /// Signals the loop to stop and waits for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            warn!(?e, "Rate refresher task ended abnormally");
        }
    }
}

impl RateRefresher {
    pub fn new(
        session: SharedSession,
        source: Arc<dyn RateSource>,
        interval: Duration,
    ) -> (Self, mpsc::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let refresher = RateRefresher {
            session,
            source,
            interval,
            shutdown_rx,
        };
        (refresher, shutdown_tx)
    }

    /// Spawns the loop on the current runtime.
    pub fn spawn(
        session: SharedSession,
        source: Arc<dyn RateSource>,
        interval: Duration,
    ) -> RateRefresherHandle {
        let (refresher, shutdown_tx) = Self::new(session, source, interval);
        let task = tokio::spawn(refresher.run());
        RateRefresherHandle { shutdown_tx, task }
    }

    /// Runs the refresh loop until shutdown. The first tick fires at once.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Rate refresher starting");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match reload_rates(&self.session, self.source.as_ref()).await {
                        ApplyOutcome::Applied(count) => debug!(count, "Rates refreshed"),
                        ApplyOutcome::Failed => warn!("Rate refresh failed, keeping previous rates"),
                        outcome => debug!(?outcome, "Rate refresh not applied"),
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Rate refresher shutting down");
                    break;
                }
            }
        }

        info!("Rate refresher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PricingConfig;
    use crate::session::PricingSession;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct CountingRates {
        calls: AtomicUsize,
        fetched: Notify,
    }

    #[async_trait]
    impl RateSource for CountingRates {
        async fn fetch_rates(&self, base: Currency) -> SessionResult<RateTable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.fetched.notify_one();
            Ok(RateTable::new(
                base,
                BTreeMap::from([(Currency::Usd, 0.00075)]),
                Utc::now(),
            ))
        }
    }

    #[tokio::test]
    async fn test_refresher_fetches_on_start_and_stops() {
        let session = PricingSession::new(&PricingConfig::default()).into_shared();
        let source = Arc::new(CountingRates::default());

        let handle = RateRefresher::spawn(session.clone(), source.clone(), Duration::from_secs(300));
        source.fetched.notified().await;
        handle.shutdown().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        let status = session.lock().await.rate_status_at(Utc::now());
        assert_eq!(status.available, [Currency::Usd]);
        assert!(!status.stale);
    }

    #[test]
    fn test_parse_rates_response() {
        let body = json!({
            "base": "KRW",
            "date": "2024-05-01",
            "rates": {
                "KRW": 1,
                "USD": 0.00072,
                "EUR": 0.00067,
                "JPY": 0.11,
                "IDR": 11.7,
                "GBP": 0,
                "CAD": "n/a"
            }
        });

        let table = parse_rates_response(Currency::Krw, &body, Utc::now()).unwrap();

        assert_eq!(table.rate(Currency::Usd), Some(0.00072));
        assert_eq!(table.rate(Currency::Idr), Some(11.7));
        assert_eq!(table.rate(Currency::Gbp), None);
        assert_eq!(table.rate(Currency::Cad), None);
        assert_eq!(table.rates.len(), 3);
        assert!(table.fetched_at.is_some());
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        assert!(matches!(
            parse_rates_response(Currency::Krw, &json!({ "result": "error" }), Utc::now()),
            Err(SessionError::InvalidResponse(_))
        ));
        assert!(parse_rates_response(
            Currency::Krw,
            &json!({ "base": "USD", "rates": {} }),
            Utc::now()
        )
        .is_err());
    }
}
