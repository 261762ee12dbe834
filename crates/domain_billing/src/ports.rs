//! Billing Domain Ports
//!
//! The `BillingStore` trait is everything the billing engine needs from
//! persistence. Two adapters implement it:
//!
//! - **PostgreSQL** (`infra_db::PostgresBillingStore`)
//! - **In-memory** ([`mock::InMemoryBillingStore`], behind the `mock` feature)
//!
//! # Usage
//!
//! ```rust,ignore
//! let store: Arc<dyn BillingStore> = Arc::new(PostgresBillingStore::new(pool));
//! let service = BillingService::new(store, Arc::new(SystemClock::default()), config)?;
//! ```
//!
//! # Atomicity
//!
//! Two operations span several records and must be atomic in every adapter:
//!
//! - [`BillingStore::commit_reading`] writes the reading, the meter and the
//!   optional invoice together, and fails with `Conflict` if the meter's
//!   cumulative value moved since it was loaded.
//! - [`BillingStore::record_overdue`] writes the penalised invoice and, when
//!   asked, suspends the meter only if it is not already suspended.
//!
//! # Guarded writes
//!
//! Invoice writes never replace a whole row loaded earlier. Penalties and
//! settlement only apply while the stored invoice is still unpaid, and
//! `update_meter` leaves the cumulative reading to `commit_reading`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use core_kernel::{
    CustomerId, DomainPort, HealthCheckable, InvoiceId, MeterId, PortError, TariffId,
};

use crate::customer::Customer;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::meter::Meter;
use crate::payment::Payment;
use crate::reading::Reading;
use crate::tariff::Tariff;

/// Query parameters for listing invoices
#[derive(Debug, Clone, Default)]
pub struct InvoiceQuery {
    /// Filter by customer
    pub customer_id: Option<CustomerId>,
    /// Filter by meter
    pub meter_id: Option<MeterId>,
    /// Filter by status (any of)
    pub statuses: Vec<InvoiceStatus>,
    /// Only invoices due strictly before this date
    pub due_before: Option<NaiveDate>,
}

/// Outcome of [`BillingStore::record_overdue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverdueWrite {
    /// Penalties were written; `suspended` is true if this call suspended the meter
    Penalised { suspended: bool },
    /// The stored invoice was no longer unpaid; nothing was written
    Skipped,
}

impl InvoiceQuery {
    /// All invoices
    pub fn all() -> Self {
        Self::default()
    }

    /// Invoices of one customer
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Default::default()
        }
    }

    /// Invoices of one meter
    pub fn for_meter(meter_id: MeterId) -> Self {
        Self {
            meter_id: Some(meter_id),
            ..Default::default()
        }
    }

    /// Pending or overdue invoices
    pub fn unpaid() -> Self {
        Self::default().with_statuses(vec![InvoiceStatus::Pending, InvoiceStatus::Overdue])
    }

    pub fn with_statuses(mut self, statuses: Vec<InvoiceStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn due_before(mut self, date: NaiveDate) -> Self {
        self.due_before = Some(date);
        self
    }

    /// Returns true if the invoice satisfies every filter
    pub fn matches(&self, invoice: &Invoice) -> bool {
        if let Some(customer_id) = self.customer_id {
            if invoice.customer_id != customer_id {
                return false;
            }
        }
        if let Some(meter_id) = self.meter_id {
            if invoice.meter_id != Some(meter_id) {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&invoice.status) {
            return false;
        }
        if let Some(due_before) = self.due_before {
            if invoice.due_date >= due_before {
                return false;
            }
        }
        true
    }
}

/// Persistence port for the billing engine
#[async_trait]
pub trait BillingStore: DomainPort + HealthCheckable {
    // ========================================================================
    // Customers
    // ========================================================================

    async fn insert_customer(&self, customer: &Customer) -> Result<(), PortError>;

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError>;

    async fn update_customer(&self, customer: &Customer) -> Result<(), PortError>;

    async fn list_customers(&self) -> Result<Vec<Customer>, PortError>;

    // ========================================================================
    // Tariffs
    // ========================================================================

    async fn insert_tariff(&self, tariff: &Tariff) -> Result<(), PortError>;

    async fn get_tariff(&self, id: TariffId) -> Result<Tariff, PortError>;

    async fn update_tariff(&self, tariff: &Tariff) -> Result<(), PortError>;

    async fn list_tariffs(&self) -> Result<Vec<Tariff>, PortError>;

    // ========================================================================
    // Meters
    // ========================================================================

    /// Inserts a meter
    ///
    /// Fails with `Conflict` on a duplicate serial number or when the
    /// customer already owns a meter.
    async fn insert_meter(&self, meter: &Meter) -> Result<(), PortError>;

    async fn get_meter(&self, id: MeterId) -> Result<Meter, PortError>;

    async fn find_meter_by_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<Meter>, PortError>;

    /// Updates a meter's registration data and status
    ///
    /// Same conflict rules as `insert_meter`. The cumulative reading and its
    /// timestamp are left as stored; only `commit_reading` moves them.
    async fn update_meter(&self, meter: &Meter) -> Result<(), PortError>;

    async fn list_meters(&self) -> Result<Vec<Meter>, PortError>;

    // ========================================================================
    // Readings
    // ========================================================================

    /// Atomically stores a reading, the advanced meter and an optional invoice
    ///
    /// The meter row is only updated if its stored cumulative value still
    /// equals `reading.previous_value`; otherwise nothing is written and
    /// `Conflict` is returned.
    async fn commit_reading(
        &self,
        meter: &Meter,
        reading: &Reading,
        invoice: Option<&Invoice>,
    ) -> Result<(), PortError>;

    /// All readings, newest first
    async fn list_readings(&self) -> Result<Vec<Reading>, PortError>;

    /// Readings of one meter, newest first
    async fn readings_for_meter(&self, meter_id: MeterId) -> Result<Vec<Reading>, PortError>;

    // ========================================================================
    // Invoices
    // ========================================================================

    /// Allocates the next invoice number for a year (`FAT-<year>-<seq>`)
    async fn next_invoice_number(&self, year: i32) -> Result<String, PortError>;

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError>;

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError>;

    /// Marks a pending or overdue invoice as paid and returns the stored row
    ///
    /// Penalty fields are kept as stored. Fails with `Conflict` when the
    /// invoice is no longer unpaid.
    async fn settle_invoice(
        &self,
        id: InvoiceId,
        paid_at: DateTime<Utc>,
    ) -> Result<Invoice, PortError>;

    /// True if an invoice exists for this customer, meter and period
    async fn invoice_exists(
        &self,
        customer_id: CustomerId,
        meter_id: MeterId,
        period: &str,
    ) -> Result<bool, PortError>;

    async fn find_invoices(&self, query: InvoiceQuery) -> Result<Vec<Invoice>, PortError>;

    /// Atomically writes an invoice's penalties and optionally suspends a meter
    ///
    /// Only the penalty fields, total and status are written, and only while
    /// the stored invoice is pending or overdue; otherwise nothing changes and
    /// [`OverdueWrite::Skipped`] is returned. The meter is suspended only if
    /// it is not already suspended, and its billing mode is re-synced from
    /// its owner.
    async fn record_overdue(
        &self,
        invoice: &Invoice,
        suspend: Option<(MeterId, DateTime<Utc>)>,
    ) -> Result<OverdueWrite, PortError>;

    // ========================================================================
    // Payments
    // ========================================================================

    async fn insert_payment(&self, payment: &Payment) -> Result<(), PortError>;

    async fn payments_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, PortError>;

    async fn list_payments(&self) -> Result<Vec<Payment>, PortError>;
}

/// In-memory implementation of BillingStore for testing
///
/// Each method takes a single write lock, so the multi-record operations are
/// atomic with respect to each other.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, HealthCheckResult};

    use crate::meter::MeterStatus;

    #[derive(Debug, Default)]
    struct State {
        customers: HashMap<CustomerId, Customer>,
        tariffs: HashMap<TariffId, Tariff>,
        meters: HashMap<MeterId, Meter>,
        readings: Vec<Reading>,
        invoices: HashMap<InvoiceId, Invoice>,
        payments: Vec<Payment>,
        invoice_sequences: HashMap<i32, u64>,
    }

    impl State {
        fn check_meter_uniqueness(&self, meter: &Meter) -> Result<(), PortError> {
            for other in self.meters.values().filter(|m| m.id != meter.id) {
                if other.serial_number == meter.serial_number {
                    return Err(PortError::conflict(format!(
                        "meter serial number {} already registered",
                        meter.serial_number
                    )));
                }
                if meter.customer_id.is_some() && other.customer_id == meter.customer_id {
                    return Err(PortError::conflict("customer already owns a meter"));
                }
            }
            Ok(())
        }

        fn check_fiscal_id(&self, customer: &Customer) -> Result<(), PortError> {
            let taken = self
                .customers
                .values()
                .any(|c| c.id != customer.id && c.fiscal_id == customer.fiscal_id);
            if taken {
                return Err(PortError::conflict(format!(
                    "fiscal id {} already registered",
                    customer.fiscal_id
                )));
            }
            Ok(())
        }

        fn newest_first<'a>(
            readings: impl DoubleEndedIterator<Item = &'a Reading>,
        ) -> Vec<Reading> {
            // Reversed insertion order breaks timestamp ties newest first
            let mut readings: Vec<_> = readings.rev().cloned().collect();
            readings.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
            readings
        }
    }

    /// In-memory store
    #[derive(Debug, Default)]
    pub struct InMemoryBillingStore {
        state: RwLock<State>,
    }

    impl InMemoryBillingStore {
        /// Creates an empty store
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of stored readings
        pub async fn reading_count(&self) -> usize {
            self.state.read().await.readings.len()
        }

        /// Number of stored invoices
        pub async fn invoice_count(&self) -> usize {
            self.state.read().await.invoices.len()
        }

        /// Overwrites a stored invoice's dates (to age it in tests)
        pub async fn set_invoice_dates(
            &self,
            id: InvoiceId,
            issue_date: NaiveDate,
            due_date: NaiveDate,
        ) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            let invoice = state
                .invoices
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Invoice", id))?;
            invoice.issue_date = issue_date;
            invoice.due_date = due_date;
            Ok(())
        }
    }

    impl DomainPort for InMemoryBillingStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryBillingStore {
        async fn health_check(&self) -> HealthCheckResult {
            HealthCheckResult {
                adapter_id: "in-memory-billing-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("In-memory store always healthy".to_string()),
                checked_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl BillingStore for InMemoryBillingStore {
        async fn insert_customer(&self, customer: &Customer) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            state.check_fiscal_id(customer)?;
            state.customers.insert(customer.id, customer.clone());
            Ok(())
        }

        async fn get_customer(&self, id: CustomerId) -> Result<Customer, PortError> {
            self.state
                .read()
                .await
                .customers
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Customer", id))
        }

        async fn update_customer(&self, customer: &Customer) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            if !state.customers.contains_key(&customer.id) {
                return Err(PortError::not_found("Customer", customer.id));
            }
            state.check_fiscal_id(customer)?;
            state.customers.insert(customer.id, customer.clone());
            Ok(())
        }

        async fn list_customers(&self) -> Result<Vec<Customer>, PortError> {
            let mut customers: Vec<_> =
                self.state.read().await.customers.values().cloned().collect();
            customers.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(customers)
        }

        async fn insert_tariff(&self, tariff: &Tariff) -> Result<(), PortError> {
            self.state.write().await.tariffs.insert(tariff.id, tariff.clone());
            Ok(())
        }

        async fn get_tariff(&self, id: TariffId) -> Result<Tariff, PortError> {
            self.state
                .read()
                .await
                .tariffs
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Tariff", id))
        }

        async fn update_tariff(&self, tariff: &Tariff) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            let stored = state
                .tariffs
                .get_mut(&tariff.id)
                .ok_or_else(|| PortError::not_found("Tariff", tariff.id))?;
            *stored = tariff.clone();
            Ok(())
        }

        async fn list_tariffs(&self) -> Result<Vec<Tariff>, PortError> {
            let mut tariffs: Vec<_> = self.state.read().await.tariffs.values().cloned().collect();
            tariffs.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(tariffs)
        }

        async fn insert_meter(&self, meter: &Meter) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            state.check_meter_uniqueness(meter)?;
            state.meters.insert(meter.id, meter.clone());
            Ok(())
        }

        async fn get_meter(&self, id: MeterId) -> Result<Meter, PortError> {
            self.state
                .read()
                .await
                .meters
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Meter", id))
        }

        async fn find_meter_by_customer(
            &self,
            customer_id: CustomerId,
        ) -> Result<Option<Meter>, PortError> {
            Ok(self
                .state
                .read()
                .await
                .meters
                .values()
                .find(|m| m.customer_id == Some(customer_id))
                .cloned())
        }

        async fn update_meter(&self, meter: &Meter) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            let stored = state
                .meters
                .get(&meter.id)
                .ok_or_else(|| PortError::not_found("Meter", meter.id))?;
            let mut updated = meter.clone();
            updated.current_reading = stored.current_reading;
            updated.last_reading_at = stored.last_reading_at;

            state.check_meter_uniqueness(&updated)?;
            state.meters.insert(meter.id, updated);
            Ok(())
        }

        async fn list_meters(&self) -> Result<Vec<Meter>, PortError> {
            let mut meters: Vec<_> = self.state.read().await.meters.values().cloned().collect();
            meters.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
            Ok(meters)
        }

        async fn commit_reading(
            &self,
            meter: &Meter,
            reading: &Reading,
            invoice: Option<&Invoice>,
        ) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            let stored = state
                .meters
                .get(&meter.id)
                .ok_or_else(|| PortError::not_found("Meter", meter.id))?;
            if stored.current_reading != reading.previous_value {
                return Err(PortError::conflict(format!(
                    "meter {} reading changed concurrently",
                    meter.serial_number
                )));
            }
            if let Some(invoice) = invoice {
                if state.invoices.values().any(|i| i.invoice_number == invoice.invoice_number) {
                    return Err(PortError::conflict(format!(
                        "invoice number {} already used",
                        invoice.invoice_number
                    )));
                }
            }

            state.meters.insert(meter.id, meter.clone());
            state.readings.push(reading.clone());
            if let Some(invoice) = invoice {
                state.invoices.insert(invoice.id, invoice.clone());
            }
            Ok(())
        }

        async fn list_readings(&self) -> Result<Vec<Reading>, PortError> {
            Ok(State::newest_first(self.state.read().await.readings.iter()))
        }

        async fn readings_for_meter(&self, meter_id: MeterId) -> Result<Vec<Reading>, PortError> {
            let state = self.state.read().await;
            Ok(State::newest_first(
                state.readings.iter().filter(|r| r.meter_id == meter_id),
            ))
        }

        async fn next_invoice_number(&self, year: i32) -> Result<String, PortError> {
            let mut state = self.state.write().await;
            let seq = state.invoice_sequences.entry(year).or_insert(0);
            *seq += 1;
            Ok(format!("FAT-{year}-{:06}", *seq))
        }

        async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            if state.invoices.values().any(|i| i.invoice_number == invoice.invoice_number) {
                return Err(PortError::conflict(format!(
                    "invoice number {} already used",
                    invoice.invoice_number
                )));
            }
            state.invoices.insert(invoice.id, invoice.clone());
            Ok(())
        }

        async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
            self.state
                .read()
                .await
                .invoices
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Invoice", id))
        }

        async fn settle_invoice(
            &self,
            id: InvoiceId,
            paid_at: DateTime<Utc>,
        ) -> Result<Invoice, PortError> {
            let mut state = self.state.write().await;
            let stored = state
                .invoices
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Invoice", id))?;
            if !stored.is_unpaid() {
                return Err(PortError::conflict(format!(
                    "invoice {} is no longer unpaid",
                    stored.invoice_number
                )));
            }
            stored.status = InvoiceStatus::Paid;
            stored.paid_at = Some(paid_at);
            stored.updated_at = paid_at;
            Ok(stored.clone())
        }

        async fn invoice_exists(
            &self,
            customer_id: CustomerId,
            meter_id: MeterId,
            period: &str,
        ) -> Result<bool, PortError> {
            Ok(self.state.read().await.invoices.values().any(|i| {
                i.customer_id == customer_id && i.meter_id == Some(meter_id) && i.period == period
            }))
        }

        async fn find_invoices(&self, query: InvoiceQuery) -> Result<Vec<Invoice>, PortError> {
            let mut invoices: Vec<_> = self
                .state
                .read()
                .await
                .invoices
                .values()
                .filter(|i| query.matches(i))
                .cloned()
                .collect();
            invoices.sort_by(|a, b| {
                a.due_date
                    .cmp(&b.due_date)
                    .then(a.invoice_number.cmp(&b.invoice_number))
            });
            Ok(invoices)
        }

        async fn record_overdue(
            &self,
            invoice: &Invoice,
            suspend: Option<(MeterId, DateTime<Utc>)>,
        ) -> Result<OverdueWrite, PortError> {
            let mut state = self.state.write().await;
            let stored = state
                .invoices
                .get(&invoice.id)
                .ok_or_else(|| PortError::not_found("Invoice", invoice.id))?;
            if !stored.is_unpaid() {
                return Ok(OverdueWrite::Skipped);
            }

            let mut suspended = false;
            if let Some((meter_id, at)) = suspend {
                let owner_mode = state
                    .meters
                    .get(&meter_id)
                    .ok_or_else(|| PortError::not_found("Meter", meter_id))?
                    .customer_id
                    .and_then(|id| state.customers.get(&id))
                    .map(|c| c.billing_mode);
                if let Some(meter) = state.meters.get_mut(&meter_id) {
                    if meter.status != MeterStatus::Suspended {
                        meter.status = MeterStatus::Suspended;
                        meter.suspended_at = Some(at);
                        suspended = true;
                    }
                    if let Some(mode) = owner_mode {
                        meter.billing_mode = mode;
                    }
                }
            }

            if let Some(stored) = state.invoices.get_mut(&invoice.id) {
                stored.late_fee = invoice.late_fee;
                stored.interest = invoice.interest;
                stored.total = invoice.total;
                stored.status = invoice.status;
                stored.updated_at = invoice.updated_at;
            }
            Ok(OverdueWrite::Penalised { suspended })
        }

        async fn insert_payment(&self, payment: &Payment) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            if !state.invoices.contains_key(&payment.invoice_id) {
                return Err(PortError::not_found("Invoice", payment.invoice_id));
            }
            state.payments.push(payment.clone());
            Ok(())
        }

        async fn payments_for_invoice(
            &self,
            invoice_id: InvoiceId,
        ) -> Result<Vec<Payment>, PortError> {
            Ok(self
                .state
                .read()
                .await
                .payments
                .iter()
                .filter(|p| p.invoice_id == invoice_id)
                .cloned()
                .collect())
        }

        async fn list_payments(&self) -> Result<Vec<Payment>, PortError> {
            Ok(self.state.read().await.payments.clone())
        }
    }
}
