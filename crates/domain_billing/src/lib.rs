//! Billing Domain - Electricity Billing and Debt Lifecycle
//!
//! This crate turns meter readings into invoices and escalates unpaid
//! invoices into penalties and meter suspension.
//!
//! # Flow
//!
//! ```text
//! reading ──► Reading Ledger ──► Invoice Engine ──► invoice
//!                                                     │
//!                     payments ◄──────────────────────┤
//!                                                     ▼
//!                                      Debt & Suspension sweep
//!                                      (late fee, interest, SUSPENDED meter)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingService, BillingConfig, RecordReadingRequest};
//!
//! let service = BillingService::new(store, clock, BillingConfig::default())?;
//! let outcome = service.register_reading(meter_id, RecordReadingRequest {
//!     value: dec!(150),
//!     operator: Some("op-7".into()),
//!     recorded_at: None,
//!     notes: None,
//! }).await?;
//!
//! let summary = service.run_suspension_sweep(clock.today()).await?;
//! ```

/// Stored labels, `Display` and `FromStr` for status-like enums
macro_rules! impl_labels {
    ($ty:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $ty {
            /// Returns the stored label
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = crate::error::BillingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($ty::$variant),)+
                    other => Err(crate::error::BillingError::validation(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

pub mod config;
pub mod customer;
pub mod error;
pub mod invoice;
pub mod meter;
pub mod payment;
pub mod penalty;
pub mod ports;
pub mod reading;
pub mod reporting;
pub mod requests;
pub mod service;
pub mod tariff;

pub use config::BillingConfig;
pub use customer::{BillingMode, Customer, CustomerStatus};
pub use error::BillingError;
pub use invoice::{billing_period, Invoice, InvoiceDraft, InvoiceStatus};
pub use meter::{ConnectionType, Meter, MeterStatus};
pub use payment::{Payment, PaymentMethod};
pub use penalty::{Penalty, PenaltyPolicy};
pub use ports::{BillingStore, InvoiceQuery, OverdueWrite};
pub use reading::Reading;
pub use reporting::{BillingStatistics, CustomerDebt, DebtReport, InvoiceBalance, MeterHistory};
pub use requests::{
    BulkIssueSummary, CreateTariffRequest, ManualInvoiceRequest, ReadingOutcome,
    RecordPaymentRequest, RecordReadingRequest, RegisterCustomerRequest, RegisterMeterRequest,
    SweepSummary, UpdateCustomerRequest, UpdateMeterRequest, UpdateTariffRequest,
};
pub use service::BillingService;
pub use tariff::{FeeBasis, Pricing, Tariff, TariffCatalog, TariffCategory};
