//! # jade-quote
//!
//! Prints a quote from the command line.
//!
//! ```text
//! jade-quote [--config jade.toml]
//!            [--catalog catalog.json | --procedures-csv p.csv --promotions-csv q.csv]
//!            [--tier K20] [--commission C2] [--agency PARTNER]
//!            [--qty ID=N]... [--custom NAME:PRICE:QTY]...
//!            [--currency USD] [--offline]
//! ```
//!
//! Without `--catalog` or CSV files the catalog API from the config is used.
//! `--offline` skips the exchange-rate fetch; amounts then stay in KRW.

use std::error::Error;
use std::path::PathBuf;

use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use jade_core::{AgencyCode, CommissionTier, CoreResult, Currency, CustomerTier, TierPair};
use jade_session::import::import_catalog;
use jade_session::session::{reload_procedures, reload_promotions, reload_rates};
use jade_session::{
    ApplyOutcome, CatalogSource, FileCatalogSource, HttpCatalogSource, HttpRateSource,
    PricingConfig, PricingSession,
};

const USAGE: &str = "usage: jade-quote [--config FILE] [--catalog FILE | --procedures-csv FILE \
[--promotions-csv FILE]] [--tier K] [--commission C] [--agency CODE] [--qty ID=N]... \
[--custom NAME:PRICE:QTY]... [--currency CODE] [--offline]";

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    catalog: Option<PathBuf>,
    procedures_csv: Option<PathBuf>,
    promotions_csv: Option<PathBuf>,
    tier: Option<String>,
    commission: Option<String>,
    agency: Option<String>,
    quantities: Vec<(String, String)>,
    custom: Vec<(String, i64, i64)>,
    currency: Option<Currency>,
    offline: bool,
}

impl Args {
    fn parse(mut argv: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut args = Args::default();

        while let Some(flag) = argv.next() {
            if flag == "--offline" {
                args.offline = true;
                continue;
            }
            if flag == "--help" || flag == "-h" {
                return Err(USAGE.to_string());
            }

            let value = argv
                .next()
                .ok_or_else(|| format!("{flag} needs a value\n{USAGE}"))?;

            match flag.as_str() {
                "--config" => args.config = Some(value.into()),
                "--catalog" => args.catalog = Some(value.into()),
                "--procedures-csv" => args.procedures_csv = Some(value.into()),
                "--promotions-csv" => args.promotions_csv = Some(value.into()),
                "--tier" => args.tier = Some(value),
                "--commission" => args.commission = Some(value),
                "--agency" => args.agency = Some(value),
                "--currency" => {
                    args.currency = Some(value.parse().map_err(|e| format!("--currency: {e}"))?)
                }
                "--qty" => {
                    let (id, qty) = value
                        .split_once('=')
                        .ok_or_else(|| format!("--qty expects ID=N, got '{value}'"))?;
                    args.quantities.push((id.to_string(), qty.to_string()));
                }
                "--custom" => args.custom.push(parse_custom(&value)?),
                other => return Err(format!("unknown option '{other}'\n{USAGE}")),
            }
        }

        if args.catalog.is_some() && (args.procedures_csv.is_some() || args.promotions_csv.is_some()) {
            return Err("--catalog and CSV files are mutually exclusive".to_string());
        }
        Ok(args)
    }
}

/// `NAME:PRICE:QTY`; the name may itself contain colons.
fn parse_custom(value: &str) -> Result<(String, i64, i64), String> {
    let bad = || format!("--custom expects NAME:PRICE:QTY, got '{value}'");
    let mut parts = value.rsplitn(3, ':');
    let qty = parts.next().and_then(|q| q.trim().parse().ok()).ok_or_else(bad)?;
    let price = parts
        .next()
        .and_then(|p| p.trim().replace(',', "").parse().ok())
        .ok_or_else(bad)?;
    let name = parts.next().ok_or_else(bad)?;
    Ok((name.to_string(), price, qty))
}

/// Manual tiers go in first; an agency selected afterwards overrides them
/// while keeping them for when it is cleared.
fn apply_tiers(session: &mut PricingSession, args: &Args) -> CoreResult<()> {
    if args.tier.is_some() || args.commission.is_some() {
        let current = session.selection().manual_tiers().clone();
        let tiers = TierPair::new(
            args.tier.as_deref().map_or(current.customer, CustomerTier::new),
            args.commission.as_deref().map_or(current.commission, CommissionTier::new),
        );
        session.set_manual_tiers(tiers)?;
    }
    if let Some(agency) = &args.agency {
        session.set_agency(Some(AgencyCode::new(agency.as_str())))?;
    }
    Ok(())
}

// =============================================================================
// Main
// =============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,jade=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    let mut config = match &args.config {
        Some(path) => match PricingConfig::load(Some(path.clone())) {
            Ok(config) => config,
            Err(e) if e.is_config_error() => {
                eprintln!("{}: {e}", path.display());
                std::process::exit(2);
            }
            Err(e) => return Err(e.into()),
        },
        None => PricingConfig::load_or_default(None),
    };
    if let Some(currency) = args.currency {
        config.currency.display = currency;
    }

    let source: Box<dyn CatalogSource> = if let Some(path) = &args.catalog {
        Box::new(FileCatalogSource::open(path).await?)
    } else if args.procedures_csv.is_some() || args.promotions_csv.is_some() {
        let document = import_catalog(
            args.procedures_csv.as_deref(),
            args.promotions_csv.as_deref(),
            &config.tiers,
        )?;
        Box::new(FileCatalogSource::from_document(document))
    } else {
        info!(api = %config.catalog.api_url, "Using catalog API");
        Box::new(HttpCatalogSource::new(&config.catalog)?)
    };

    let session = PricingSession::new(&config).into_shared();

    apply_tiers(&mut *session.lock().await, &args)?;

    if reload_procedures(&session, source.as_ref()).await == ApplyOutcome::Failed {
        warn!("Continuing without procedures");
    }
    reload_promotions(&session, source.as_ref()).await;

    if !args.offline && config.currency.display != config.currency.base {
        let rates = HttpRateSource::new(&config.currency)?;
        reload_rates(&session, &rates).await;
    }

    let mut s = session.lock().await;
    for (id, qty) in &args.quantities {
        s.set_quantity_text(id, qty)?;
    }
    for (name, price, qty) in &args.custom {
        s.add_custom_entry(name, *price, *qty)?;
    }

    print_quote(&s);
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_quote(session: &PricingSession) {
    let summary = session.summary();
    let quote = &summary.quote;

    println!("Tiers: {}", quote.tiers);
    if let Some(agency) = &quote.agency {
        println!("Agency: {agency}");
    }
    if quote.promotions_suppressed {
        println!("Promotions: not available for these tiers");
    }
    println!();

    for line in quote.selected_lines() {
        let exempt = if line.tax_exempt { " (tax exempt)" } else { "" };
        println!(
            "  {:<40} {:>4} x {:>12} = {:>14}{}",
            line.name,
            line.quantity,
            line.unit_price.to_string(),
            line.line_total().to_string(),
            exempt
        );
    }

    println!();
    println!("  Grand total:  {}", quote.totals.grand_total);
    println!("  Tax:          {}", quote.totals.tax);
    println!("  Final price:  {}", summary.final_price.text);
    if let Some(reference) = &summary.final_price.base_reference {
        println!("                ({reference})");
    }
    if summary.final_price.is_fallback() {
        println!(
            "  {} rate unavailable, showing {}",
            summary.final_price.requested, summary.final_price.currency
        );
    }

    let notices = session.notices();
    for notice in [&notices.catalog_error, &notices.promotions_error, &notices.rates_error]
        .into_iter()
        .flatten()
    {
        eprintln!("warning: {notice}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> impl Iterator<Item = String> {
        items.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let args = Args::parse(argv(&[
            "--tier", "K20", "--qty", "a=2", "--custom", "Kit: deluxe:10,000:1", "--currency", "usd",
            "--offline",
        ]))
        .unwrap();

        assert_eq!(args.tier.as_deref(), Some("K20"));
        assert_eq!(args.quantities, [("a".to_string(), "2".to_string())]);
        assert_eq!(args.custom, [("Kit: deluxe".to_string(), 10_000, 1)]);
        assert_eq!(args.currency, Some(Currency::Usd));
        assert!(args.offline);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(Args::parse(argv(&["--tier"])).is_err());
        assert!(Args::parse(argv(&["--qty", "a"])).is_err());
        assert!(Args::parse(argv(&["--bogus", "x"])).is_err());
        assert!(Args::parse(argv(&["--catalog", "a.json", "--procedures-csv", "p.csv"])).is_err());
    }

    #[test]
    fn test_agency_applies_after_manual_tiers() {
        let args = Args::parse(argv(&["--agency", "PARTNER", "--tier", "K20", "--commission", "C2"]))
            .unwrap();
        let mut session = PricingSession::new(&PricingConfig::default());

        apply_tiers(&mut session, &args).unwrap();

        assert_eq!(
            session.effective_tiers(),
            TierPair::new(CustomerTier::new("K10"), CommissionTier::new("NO EVENT"))
        );
        assert_eq!(
            session.selection().manual_tiers(),
            &TierPair::new(CustomerTier::new("K20"), CommissionTier::new("C2"))
        );
    }

    #[test]
    fn test_unknown_tier_is_rejected() {
        let args = Args::parse(argv(&["--tier", "K99"])).unwrap();
        let mut session = PricingSession::new(&PricingConfig::default());

        assert!(apply_tiers(&mut session, &args).is_err());
    }
}
