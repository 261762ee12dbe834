//! Inputs and results of `BillingService` operations

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, MeterId, TariffId};

use crate::customer::BillingMode;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::meter::ConnectionType;
use crate::payment::PaymentMethod;
use crate::reading::Reading;
use crate::tariff::TariffCategory;

/// Request to register a customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCustomerRequest {
    pub name: String,
    pub fiscal_id: String,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub billing_mode: BillingMode,
    pub tariff_id: Option<TariffId>,
    pub notes: Option<String>,
}

/// Changes to a customer's registration data; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub fiscal_id: Option<String>,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// The owned meter follows the new mode
    pub billing_mode: Option<BillingMode>,
    pub notes: Option<String>,
}

/// Request to create a tariff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTariffRequest {
    pub name: String,
    pub category: TariffCategory,
    pub unit_price: Decimal,
    #[serde(default)]
    pub fixed_fee: Decimal,
    #[serde(default)]
    pub postpaid_surcharge: Decimal,
    #[serde(default)]
    pub prepaid_surcharge: Decimal,
    pub description: Option<String>,
}

/// Changes to a tariff; `None` keeps the stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTariffRequest {
    pub name: Option<String>,
    pub category: Option<TariffCategory>,
    pub unit_price: Option<Decimal>,
    pub fixed_fee: Option<Decimal>,
    pub postpaid_surcharge: Option<Decimal>,
    pub prepaid_surcharge: Option<Decimal>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// Request to register a meter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterMeterRequest {
    pub serial_number: String,
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub connection_type: ConnectionType,
    pub card_number: Option<String>,
    pub installation_address: String,
    pub installation_date: NaiveDate,
    pub max_power_kw: Decimal,
    #[serde(default)]
    pub initial_reading: Decimal,
    pub notes: Option<String>,
}

/// Changes to a meter's registration data; `None` keeps the stored value
///
/// Status, owner and cumulative reading have their own operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMeterRequest {
    pub serial_number: Option<String>,
    pub connection_type: Option<ConnectionType>,
    pub card_number: Option<String>,
    pub installation_address: Option<String>,
    pub installation_date: Option<NaiveDate>,
    pub max_power_kw: Option<Decimal>,
    pub notes: Option<String>,
}

/// A new cumulative reading for a meter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordReadingRequest {
    pub value: Decimal,
    pub operator: Option<String>,
    /// Defaults to now
    pub recorded_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// A manually entered invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualInvoiceRequest {
    pub customer_id: CustomerId,
    pub meter_id: Option<MeterId>,
    pub previous_reading: Decimal,
    pub current_reading: Decimal,
    /// Defaults to today
    pub issue_date: Option<NaiveDate>,
    /// Defaults to issue date plus the payment term
    pub due_date: Option<NaiveDate>,
    /// Defaults to the issue date's month
    pub period: Option<String>,
    /// Defaults to pending
    pub status: Option<InvoiceStatus>,
}

/// A payment against an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    /// Defaults to now
    pub paid_at: Option<DateTime<Utc>>,
}

/// Result of recording a reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingOutcome {
    pub reading: Reading,
    /// Issued when the meter is postpaid and the reading shows consumption
    pub invoice: Option<Invoice>,
}

/// Result of bulk invoice generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIssueSummary {
    pub period: String,
    pub generated: usize,
    /// Readings whose customer, meter and period already had an invoice
    pub skipped_existing: usize,
    /// Readings of meters without a customer
    pub skipped_unassigned: usize,
    /// Readings that could not be invoiced
    pub failed: usize,
}

/// Result of one suspension sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub today: NaiveDate,
    /// Invoices selected for penalties
    pub penalised: usize,
    /// Meters newly suspended by this sweep
    pub suspended: usize,
    /// Invoices settled between selection and write; left untouched
    pub skipped: usize,
    /// Invoices that could not be processed
    pub failed: usize,
}
