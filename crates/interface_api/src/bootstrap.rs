//! Wiring shared by the server and the sweep job

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use core_kernel::SystemClock;
use domain_billing::BillingService;
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};

use crate::config::ApiConfig;

/// Connects to PostgreSQL, applies migrations and builds the billing service
pub async fn connect_service(config: &ApiConfig) -> anyhow::Result<BillingService> {
    info!("Connecting to database...");
    let pool = create_pool(
        DatabaseConfig::new(config.database_url.clone())
            .max_connections(config.database_max_connections),
    )
    .await
    .context("failed to connect to the database")?;

    run_migrations(&pool)
        .await
        .context("failed to apply database migrations")?;
    info!("Database ready");

    let store = Arc::new(PostgresBillingStore::new(pool));
    let clock = Arc::new(SystemClock::new(config.billing.timezone));
    let service = BillingService::new(store, clock, config.billing.clone())
        .context("invalid billing configuration")?;
    Ok(service)
}
