//! Daily suspension sweep
//!
//! Applies late fees and interest to overdue invoices and suspends the
//! meters behind them. Meant to run once a day from cron or a scheduler.
//!
//! ```bash
//! cargo run --bin suspension-sweep             # as of today
//! cargo run --bin suspension-sweep 2026-10-18  # as of a given date
//! ```

use anyhow::Context;
use chrono::NaiveDate;

use interface_api::{bootstrap::connect_service, config::ApiConfig, telemetry::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ApiConfig::load().context("failed to load configuration")?;
    init_tracing(&config);

    let service = connect_service(&config).await?;
    let today = match std::env::args().nth(1) {
        Some(arg) => NaiveDate::parse_from_str(&arg, "%Y-%m-%d")
            .with_context(|| format!("expected a YYYY-MM-DD date, got '{arg}'"))?,
        None => service.today(),
    };

    let summary = service.run_suspension_sweep(today).await?;
    tracing::info!(
        today = %summary.today,
        penalised = summary.penalised,
        suspended = summary.suspended,
        skipped = summary.skipped,
        failed = summary.failed,
        "Suspension sweep finished"
    );

    if summary.failed > 0 {
        anyhow::bail!("{} invoice(s) could not be processed", summary.failed);
    }
    Ok(())
}
