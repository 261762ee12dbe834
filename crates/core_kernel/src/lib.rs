//! Core Kernel - Foundational types for the billing engine
//!
//! This crate provides the building blocks shared by the domain, storage and API crates:
//! - Money types with precise decimal arithmetic
//! - Clocks that make "today" injectable
//! - Strongly-typed identifiers
//! - Port error and health-check abstractions

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Rate};
pub use temporal::{Clock, FixedClock, SystemClock, TemporalError, Timezone};
pub use identifiers::{CustomerId, InvoiceId, MeterId, PaymentId, ReadingId, TariffId};
pub use error::CoreError;
pub use ports::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
