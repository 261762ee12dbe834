//! Test Utilities Crate
//!
//! Shared test infrastructure for the billing test suite.
//!
//! # Modules
//!
//! - `fixtures`: fixed dates, clocks and amounts
//! - `builders`: request builders and an in-memory billing harness
//! - `assertions`: assertion helpers for invoices, meters and money
//! - `generators`: proptest strategies and `fake` data
//! - `database`: a PostgreSQL container with the billing schema (needs Docker)

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use generators::*;
