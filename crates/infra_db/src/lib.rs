//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the electricity billing engine, using SQLx.
//!
//! # Architecture
//!
//! The crate implements the `BillingStore` port from `domain_billing`, so the
//! engine never sees SQL. Rows are read into `FromRow` structs and converted
//! into domain entities; failures are lifted into `PortError`.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/billing")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresBillingStore::new(pool);
//! ```

pub mod error;
pub mod pool;
mod rows;
pub mod store;

pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use store::PostgresBillingStore;
