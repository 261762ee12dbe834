//! Database Test Utilities
//!
//! Starts a disposable PostgreSQL container with the billing schema applied,
//! for integration tests of the SQL adapter. Requires a Docker daemon.

use std::time::Duration;

use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use uuid::Uuid;

use core_kernel::InvoiceId;

const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "billing_user";
const POSTGRES_PASSWORD: &str = "billing_password";
const POSTGRES_DB: &str = "billing_test";

/// Error type of the container helpers
pub type TestDatabaseError = Box<dyn std::error::Error + Send + Sync>;

/// Connection settings of a test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    /// Creates the database connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A PostgreSQL container with the billing schema
///
/// The container is removed when the value is dropped.
pub struct TestDatabase {
    _container: ContainerAsync<Postgres>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a container and applies the `infra_db` migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start, the pool cannot
    /// connect or a migration fails.
    pub async fn new() -> Result<Self, TestDatabaseError> {
        let container = Postgres::default()
            .with_user(POSTGRES_USER)
            .with_password(POSTGRES_PASSWORD)
            .with_db_name(POSTGRES_DB)
            .with_tag(POSTGRES_TAG)
            .start()
            .await?;

        let config = TestDatabaseConfig {
            host: container.get_host().await?.to_string(),
            port: container.get_host_port_ipv4(5432).await?,
            ..Default::default()
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        sqlx::migrate!("../infra_db/migrations").run(&pool).await?;

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Moves an invoice's dates so it is `days_overdue` days late on `today`
    pub async fn age_invoice(
        &self,
        invoice_id: InvoiceId,
        today: NaiveDate,
        days_overdue: i64,
    ) -> Result<(), TestDatabaseError> {
        let due = today - chrono::Duration::days(days_overdue);
        sqlx::query("UPDATE invoices SET issue_date = $2, due_date = $3 WHERE id = $1")
            .bind(Uuid::from(invoice_id))
            .bind(due - chrono::Duration::days(15))
            .bind(due)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
