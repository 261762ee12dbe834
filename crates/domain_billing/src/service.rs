//! Billing service
//!
//! Orchestrates the engine's operations over a [`BillingStore`] and a
//! [`Clock`]. Every multi-record write goes through one atomic store call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use core_kernel::{Clock, CustomerId, InvoiceId, MeterId, Money, TariffId};

use crate::config::BillingConfig;
use crate::customer::{BillingMode, Customer};
use crate::error::BillingError;
use crate::invoice::{billing_period, Invoice, InvoiceDraft};
use crate::meter::{Meter, MeterStatus};
use crate::payment::Payment;
use crate::penalty::PenaltyPolicy;
use crate::ports::{BillingStore, InvoiceQuery, OverdueWrite};
use crate::reading::Reading;
use crate::reporting::{BillingStatistics, DebtReport, InvoiceBalance, MeterHistory};
use crate::requests::{
    BulkIssueSummary, CreateTariffRequest, ManualInvoiceRequest, ReadingOutcome,
    RecordPaymentRequest, RecordReadingRequest, RegisterCustomerRequest, RegisterMeterRequest,
    SweepSummary, UpdateCustomerRequest, UpdateMeterRequest, UpdateTariffRequest,
};
use crate::tariff::{FeeBasis, Pricing, Tariff, TariffCatalog};

/// Entry point for every billing operation
pub struct BillingService {
    store: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
    config: BillingConfig,
    catalog: TariffCatalog,
    penalties: PenaltyPolicy,
}

impl BillingService {
    /// Creates a service
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the configuration is unusable.
    pub fn new(
        store: Arc<dyn BillingStore>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
    ) -> Result<Self, BillingError> {
        config.validate()?;
        Ok(Self {
            catalog: TariffCatalog::new(&config),
            penalties: PenaltyPolicy::from_config(&config),
            store,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BillingStore> {
        &self.store
    }

    /// Current local date according to the service clock
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // ========================================================================
    // Customers
    // ========================================================================

    #[instrument(skip(self, request), fields(fiscal_id = %request.fiscal_id))]
    pub async fn register_customer(
        &self,
        request: RegisterCustomerRequest,
    ) -> Result<Customer, BillingError> {
        if let Some(tariff_id) = request.tariff_id {
            self.store.get_tariff(tariff_id).await?;
        }

        let mut customer = Customer::new(
            request.name,
            request.fiscal_id,
            request.billing_mode,
            self.config.currency,
        )?;
        customer.national_id = request.national_id;
        customer.address = request.address;
        customer.phone = request.phone;
        customer.email = request.email;
        customer.tariff_id = request.tariff_id;
        customer.notes = request.notes;

        self.store.insert_customer(&customer).await?;
        info!(customer_id = %customer.id, "Customer registered");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, BillingError> {
        Ok(self.store.get_customer(id).await?)
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>, BillingError> {
        Ok(self.store.list_customers().await?)
    }

    /// Edits a customer's registration data
    ///
    /// A billing mode change is carried to the owned meter. The meter is
    /// checked first, so a move to prepaid fails with `Validation` and
    /// changes nothing while the meter has no card number.
    #[instrument(skip(self, request), fields(customer_id = %id))]
    pub async fn update_customer(
        &self,
        id: CustomerId,
        request: UpdateCustomerRequest,
    ) -> Result<Customer, BillingError> {
        let mut customer = self.store.get_customer(id).await?;
        let mode_changed = customer.apply_update(request)?;

        let mut meter = if mode_changed {
            self.store.find_meter_by_customer(id).await?
        } else {
            None
        };
        if let Some(meter) = meter.as_mut() {
            meter.sync_billing_mode(Some(&customer));
            meter.validate()?;
        }

        self.store.update_customer(&customer).await?;
        if let Some(meter) = meter {
            self.store.update_meter(&meter).await?;
            info!(
                meter_id = %meter.id,
                mode = %customer.billing_mode,
                "Meter billing mode re-synced"
            );
        }
        info!("Customer updated");
        Ok(customer)
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn toggle_customer_status(&self, id: CustomerId) -> Result<Customer, BillingError> {
        let mut customer = self.store.get_customer(id).await?;
        let status = customer.toggle_status();
        self.store.update_customer(&customer).await?;
        info!(status = %status, "Customer status toggled");
        Ok(customer)
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn assign_tariff(
        &self,
        id: CustomerId,
        tariff_id: Option<TariffId>,
    ) -> Result<Customer, BillingError> {
        if let Some(tariff_id) = tariff_id {
            self.store.get_tariff(tariff_id).await?;
        }
        let mut customer = self.store.get_customer(id).await?;
        customer.assign_tariff(tariff_id);
        self.store.update_customer(&customer).await?;
        Ok(customer)
    }

    // ========================================================================
    // Tariffs
    // ========================================================================

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_tariff(
        &self,
        request: CreateTariffRequest,
    ) -> Result<Tariff, BillingError> {
        let money = |amount| self.config.money(amount);
        let mut tariff = Tariff::new(request.name, request.category, money(request.unit_price))
            .with_fixed_fee(money(request.fixed_fee))
            .with_surcharges(
                money(request.postpaid_surcharge),
                money(request.prepaid_surcharge),
            );
        tariff.description = request.description;
        tariff.validate()?;

        self.store.insert_tariff(&tariff).await?;
        info!(tariff_id = %tariff.id, "Tariff created");
        Ok(tariff)
    }

    pub async fn get_tariff(&self, id: TariffId) -> Result<Tariff, BillingError> {
        Ok(self.store.get_tariff(id).await?)
    }

    pub async fn list_tariffs(&self) -> Result<Vec<Tariff>, BillingError> {
        Ok(self.store.list_tariffs().await?)
    }

    /// Edits a pricing plan; issued invoices keep the prices they were issued with
    #[instrument(skip(self, request), fields(tariff_id = %id))]
    pub async fn update_tariff(
        &self,
        id: TariffId,
        request: UpdateTariffRequest,
    ) -> Result<Tariff, BillingError> {
        let mut tariff = self.store.get_tariff(id).await?;
        tariff.apply_update(request);
        tariff.validate()?;

        self.store.update_tariff(&tariff).await?;
        info!("Tariff updated");
        Ok(tariff)
    }

    // ========================================================================
    // Meters
    // ========================================================================

    #[instrument(skip(self, request), fields(serial = %request.serial_number))]
    pub async fn register_meter(
        &self,
        request: RegisterMeterRequest,
    ) -> Result<Meter, BillingError> {
        if request.initial_reading < Decimal::ZERO {
            return Err(BillingError::validation("initial reading must not be negative"));
        }

        let mut meter = Meter::new(
            request.serial_number,
            request.connection_type,
            request.installation_address,
            request.installation_date,
            request.max_power_kw,
        )
        .with_initial_reading(request.initial_reading);
        meter.card_number = request.card_number.filter(|c| !c.trim().is_empty());
        meter.notes = request.notes;

        if let Some(customer_id) = request.customer_id {
            let customer = self.store.get_customer(customer_id).await?;
            self.ensure_customer_has_no_meter(customer_id, None).await?;
            meter.assign_to(&customer);
        }
        meter.validate()?;

        self.store.insert_meter(&meter).await?;
        info!(meter_id = %meter.id, "Meter registered");
        Ok(meter)
    }

    pub async fn get_meter(&self, id: MeterId) -> Result<Meter, BillingError> {
        Ok(self.store.get_meter(id).await?)
    }

    pub async fn list_meters(&self) -> Result<Vec<Meter>, BillingError> {
        Ok(self.store.list_meters().await?)
    }

    /// Edits a meter's registration data
    ///
    /// Status, owner and cumulative reading are untouched; a duplicate
    /// serial number fails with `Conflict`.
    #[instrument(skip(self, request), fields(meter_id = %id))]
    pub async fn update_meter(
        &self,
        id: MeterId,
        request: UpdateMeterRequest,
    ) -> Result<Meter, BillingError> {
        let mut meter = self.store.get_meter(id).await?;
        meter.apply_update(request);
        self.persist_meter(&mut meter).await?;
        info!("Meter updated");
        Ok(meter)
    }

    /// ACTIVE ⇄ INACTIVE; any other status goes back to ACTIVE
    #[instrument(skip(self), fields(meter_id = %id))]
    pub async fn toggle_meter_status(&self, id: MeterId) -> Result<Meter, BillingError> {
        let mut meter = self.store.get_meter(id).await?;
        let status = meter.toggle();
        self.persist_meter(&mut meter).await?;
        info!(status = %status, "Meter status toggled");
        Ok(meter)
    }

    /// Sets any status without a transition check
    #[instrument(skip(self), fields(meter_id = %id, status = %status))]
    pub async fn change_meter_status(
        &self,
        id: MeterId,
        status: MeterStatus,
    ) -> Result<Meter, BillingError> {
        let mut meter = self.store.get_meter(id).await?;
        meter.set_status(status, self.clock.now());
        self.persist_meter(&mut meter).await?;
        Ok(meter)
    }

    /// Marks the meter FAULTY; a prepaid owner is moved to postpaid first
    #[instrument(skip(self), fields(meter_id = %id))]
    pub async fn mark_meter_faulty(&self, id: MeterId) -> Result<Meter, BillingError> {
        let mut meter = self.store.get_meter(id).await?;
        meter.mark_faulty();

        if let Some(customer_id) = meter.customer_id {
            let mut customer = self.store.get_customer(customer_id).await?;
            if customer.force_postpaid() {
                self.store.update_customer(&customer).await?;
                info!(customer_id = %customer_id, "Customer moved to postpaid after meter fault");
            }
        }

        self.persist_meter(&mut meter).await?;
        info!("Meter marked faulty");
        Ok(meter)
    }

    /// Links the meter to another customer, or unlinks it
    #[instrument(skip(self), fields(meter_id = %id))]
    pub async fn reassign_meter(
        &self,
        id: MeterId,
        customer_id: Option<CustomerId>,
    ) -> Result<Meter, BillingError> {
        let mut meter = self.store.get_meter(id).await?;
        match customer_id {
            Some(customer_id) => {
                let customer = self.store.get_customer(customer_id).await?;
                self.ensure_customer_has_no_meter(customer_id, Some(id)).await?;
                meter.assign_to(&customer);
            }
            None => meter.unassign(),
        }
        self.persist_meter(&mut meter).await?;
        Ok(meter)
    }

    /// Manually suspends a meter; no-op if already suspended
    #[instrument(skip(self), fields(meter_id = %id))]
    pub async fn suspend_meter(&self, id: MeterId) -> Result<Meter, BillingError> {
        let mut meter = self.store.get_meter(id).await?;
        if meter.suspend(self.clock.now()) {
            self.persist_meter(&mut meter).await?;
            info!("Meter suspended manually");
        } else {
            debug!("Meter already suspended");
        }
        Ok(meter)
    }

    /// Returns a meter to ACTIVE and clears its suspension timestamp
    ///
    /// With `require_settled_debt_for_reactivation` set, fails with
    /// `InconsistentState` while the owner has unpaid invoices past due.
    #[instrument(skip(self), fields(meter_id = %id))]
    pub async fn reactivate_meter(&self, id: MeterId) -> Result<Meter, BillingError> {
        let mut meter = self.store.get_meter(id).await?;

        if self.config.require_settled_debt_for_reactivation {
            if let Some(customer_id) = meter.customer_id {
                let query = InvoiceQuery {
                    customer_id: Some(customer_id),
                    ..InvoiceQuery::unpaid().due_before(self.clock.today())
                };
                let overdue = self.store.find_invoices(query).await?;
                if !overdue.is_empty() {
                    return Err(BillingError::inconsistent(format!(
                        "meter {} has {} unpaid overdue invoice(s)",
                        meter.serial_number,
                        overdue.len()
                    )));
                }
            }
        }

        meter.reactivate();
        self.persist_meter(&mut meter).await?;
        info!("Meter reactivated");
        Ok(meter)
    }

    // ========================================================================
    // Readings
    // ========================================================================

    /// Records a cumulative reading and, for postpaid meters with
    /// consumption, issues an invoice in the same commit
    #[instrument(skip(self, request), fields(meter_id = %meter_id, value = %request.value))]
    pub async fn register_reading(
        &self,
        meter_id: MeterId,
        request: RecordReadingRequest,
    ) -> Result<ReadingOutcome, BillingError> {
        if request.value < Decimal::ZERO {
            return Err(BillingError::validation("reading value must not be negative"));
        }

        let mut meter = self.store.get_meter(meter_id).await?;
        let owner = self.owner_of(&meter).await?;
        meter.sync_billing_mode(owner.as_ref());

        let at = request.recorded_at.unwrap_or_else(|| self.clock.now());
        let reading = Reading::record(&mut meter, request.value, request.operator, at);
        let reading = match request.notes.filter(|n| !n.trim().is_empty()) {
            Some(notes) => reading.with_notes(notes),
            None => reading,
        };

        if reading.delta < Decimal::ZERO {
            warn!(delta = %reading.delta, "Reading is lower than the previous one");
        }

        let invoice = match (&owner, meter.billing_mode) {
            (Some(customer), BillingMode::Postpaid) if reading.has_consumption() => {
                let pricing = self.pricing_for(customer, FeeBasis::ModeSurcharge).await?;
                let today = self.clock.today();
                let draft = InvoiceDraft::new(
                    customer.id,
                    Some(meter.id),
                    reading.previous_value,
                    reading.current_value,
                    today,
                    self.config.payment_term_days,
                );
                let number = self.store.next_invoice_number(today.year()).await?;
                Some(Invoice::issue(number, draft, &pricing)?)
            }
            (None, BillingMode::Postpaid) if reading.has_consumption() => {
                warn!("Meter has no customer; reading recorded without invoice");
                None
            }
            _ => None,
        };

        self.store
            .commit_reading(&meter, &reading, invoice.as_ref())
            .await?;

        match &invoice {
            Some(invoice) => info!(
                reading_id = %reading.id,
                invoice_number = %invoice.invoice_number,
                total = %invoice.total,
                "Reading recorded and invoiced"
            ),
            None => info!(reading_id = %reading.id, delta = %reading.delta, "Reading recorded"),
        }

        Ok(ReadingOutcome { reading, invoice })
    }

    // ========================================================================
    // Invoices
    // ========================================================================

    /// Creates an invoice from manually entered readings
    ///
    /// # Errors
    ///
    /// `Validation` when the current reading is below the previous one; no
    /// record is created and no invoice number is consumed.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn issue_invoice_manual(
        &self,
        request: ManualInvoiceRequest,
    ) -> Result<Invoice, BillingError> {
        let customer = self.store.get_customer(request.customer_id).await?;
        if let Some(meter_id) = request.meter_id {
            self.store.get_meter(meter_id).await?;
        }

        let issue_date = request.issue_date.unwrap_or_else(|| self.clock.today());
        let mut draft = InvoiceDraft::new(
            customer.id,
            request.meter_id,
            request.previous_reading,
            request.current_reading,
            issue_date,
            self.config.payment_term_days,
        );
        if let Some(due_date) = request.due_date {
            if due_date < issue_date {
                return Err(BillingError::validation("due date is before issue date"));
            }
            draft = draft.with_due_date(due_date);
        }
        if let Some(period) = request.period.filter(|p| !p.trim().is_empty()) {
            draft = draft.with_period(period);
        }
        if let Some(status) = request.status {
            draft = draft.with_status(status);
        }
        if draft.consumption() < Decimal::ZERO {
            return Err(BillingError::validation(
                "consumption negative: current reading is below previous reading",
            ));
        }

        let pricing = self.pricing_for(&customer, FeeBasis::ModeSurcharge).await?;
        let number = self.store.next_invoice_number(issue_date.year()).await?;
        let invoice = Invoice::issue(number, draft, &pricing)?;

        self.store.insert_invoice(&invoice).await?;
        info!(
            invoice_number = %invoice.invoice_number,
            total = %invoice.total,
            "Manual invoice issued"
        );
        Ok(invoice)
    }

    /// Issues invoices for stored readings of the current period
    ///
    /// Walks every stored reading, newest first, so a meter with several
    /// uninvoiced readings is billed from its latest one. A reading is
    /// skipped when its customer, meter and period already have an invoice.
    /// Failures are isolated per reading and counted.
    #[instrument(skip(self))]
    pub async fn generate_pending_invoices(&self) -> Result<BulkIssueSummary, BillingError> {
        let today = self.clock.today();
        let period = billing_period(today);
        let readings = self.store.list_readings().await?;
        let meters: HashMap<MeterId, Meter> = self
            .store
            .list_meters()
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut customers: HashMap<CustomerId, Customer> = HashMap::new();
        let mut summary = BulkIssueSummary {
            period: period.clone(),
            ..Default::default()
        };

        for reading in &readings {
            let Some(meter) = meters.get(&reading.meter_id) else {
                warn!(reading_id = %reading.id, "Reading references an unknown meter");
                summary.failed += 1;
                continue;
            };
            let Some(customer_id) = meter.customer_id else {
                summary.skipped_unassigned += 1;
                continue;
            };

            match self
                .issue_for_reading(reading, meter, customer_id, &period, today, &mut customers)
                .await
            {
                Ok(true) => summary.generated += 1,
                Ok(false) => summary.skipped_existing += 1,
                Err(e) => {
                    warn!(reading_id = %reading.id, error = %e, "Could not invoice reading");
                    summary.failed += 1;
                }
            }
        }

        info!(
            period = %summary.period,
            generated = summary.generated,
            skipped_existing = summary.skipped_existing,
            skipped_unassigned = summary.skipped_unassigned,
            failed = summary.failed,
            "Bulk invoice generation finished"
        );
        Ok(summary)
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        Ok(self.store.get_invoice(id).await?)
    }

    pub async fn list_invoices(&self, query: InvoiceQuery) -> Result<Vec<Invoice>, BillingError> {
        Ok(self.store.find_invoices(query).await?)
    }

    /// Marks an invoice as paid; independent of recorded payments
    ///
    /// The store keeps any penalties written since the invoice was loaded.
    /// Fails with `Conflict` if it was settled concurrently.
    #[instrument(skip(self), fields(invoice_id = %id))]
    pub async fn settle_invoice(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        let mut invoice = self.store.get_invoice(id).await?;
        let paid_at = self.clock.now();
        invoice.settle(paid_at)?;

        let invoice = self.store.settle_invoice(id, paid_at).await?;
        info!(invoice_number = %invoice.invoice_number, total = %invoice.total, "Invoice settled");
        Ok(invoice)
    }

    pub async fn invoice_balance(&self, id: InvoiceId) -> Result<InvoiceBalance, BillingError> {
        let invoice = self.store.get_invoice(id).await?;
        let payments = self.store.payments_for_invoice(id).await?;
        InvoiceBalance::compute(&invoice, &payments)
    }

    // ========================================================================
    // Debt & suspension
    // ========================================================================

    /// Penalises invoices past the grace period and suspends their meters
    ///
    /// Penalties are recomputed from the due date on every run, so running
    /// twice on the same day leaves the same figures. Each invoice is
    /// committed on its own; one settled after selection is skipped and its
    /// meter left alone.
    #[instrument(skip(self), fields(today = %today))]
    pub async fn run_suspension_sweep(
        &self,
        today: NaiveDate,
    ) -> Result<SweepSummary, BillingError> {
        let cutoff = self.penalties.cutoff(today);
        let candidates = self
            .store
            .find_invoices(InvoiceQuery::unpaid().due_before(cutoff))
            .await?;

        let mut summary = SweepSummary {
            today,
            penalised: 0,
            suspended: 0,
            skipped: 0,
            failed: 0,
        };

        for mut invoice in candidates {
            match self.sweep_invoice(&mut invoice, today).await {
                Ok(OverdueWrite::Penalised { suspended }) => {
                    summary.penalised += 1;
                    if suspended {
                        summary.suspended += 1;
                    }
                }
                Ok(OverdueWrite::Skipped) => {
                    debug!(
                        invoice_number = %invoice.invoice_number,
                        "Invoice settled during sweep"
                    );
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(
                        invoice_number = %invoice.invoice_number,
                        error = %e,
                        "Sweep failed for invoice"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            penalised = summary.penalised,
            suspended = summary.suspended,
            skipped = summary.skipped,
            failed = summary.failed,
            "Suspension sweep finished. {} meters suspended",
            summary.suspended
        );
        Ok(summary)
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// Appends a payment; the invoice status is left untouched
    #[instrument(skip(self, request), fields(invoice_id = %invoice_id, amount = %request.amount))]
    pub async fn record_payment(
        &self,
        invoice_id: InvoiceId,
        request: RecordPaymentRequest,
    ) -> Result<Payment, BillingError> {
        let invoice = self.store.get_invoice(invoice_id).await?;
        let amount = Money::new(request.amount, invoice.total.currency());
        let paid_at = request.paid_at.unwrap_or_else(|| self.clock.now());

        let mut payment = Payment::new(invoice.id, amount, request.method, paid_at)?;
        payment.reference = request.reference;
        payment.notes = request.notes;

        self.store.insert_payment(&payment).await?;
        info!(payment_id = %payment.id, "Payment recorded");
        Ok(payment)
    }

    // ========================================================================
    // Reports
    // ========================================================================

    pub async fn meter_history(&self, id: MeterId) -> Result<MeterHistory, BillingError> {
        let meter = self.store.get_meter(id).await?;
        let readings = self.store.readings_for_meter(id).await?;
        let invoices = self.store.find_invoices(InvoiceQuery::for_meter(id)).await?;
        Ok(MeterHistory::new(meter, readings, invoices))
    }

    #[instrument(skip(self), fields(today = %today))]
    pub async fn debt_report(&self, today: NaiveDate) -> Result<DebtReport, BillingError> {
        let customers = self.store.list_customers().await?;
        let invoices = self.store.find_invoices(InvoiceQuery::unpaid()).await?;
        let meters = self.store.list_meters().await?;
        DebtReport::build(today, self.config.currency, &customers, &invoices, &meters)
    }

    #[instrument(skip(self))]
    pub async fn billing_statistics(&self) -> Result<BillingStatistics, BillingError> {
        let customers = self.store.list_customers().await?;
        let meters = self.store.list_meters().await?;
        let invoices = self.store.find_invoices(InvoiceQuery::all()).await?;
        let payments = self.store.list_payments().await?;
        BillingStatistics::build(self.config.currency, &customers, &meters, &invoices, &payments)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn owner_of(&self, meter: &Meter) -> Result<Option<Customer>, BillingError> {
        match meter.customer_id {
            Some(customer_id) => Ok(Some(self.store.get_customer(customer_id).await?)),
            None => Ok(None),
        }
    }

    /// Re-syncs the billing mode from the owner, validates and saves
    ///
    /// Reloads the meter afterwards so the caller sees the stored cumulative
    /// reading rather than the one it loaded.
    async fn persist_meter(&self, meter: &mut Meter) -> Result<(), BillingError> {
        let owner = self.owner_of(meter).await?;
        meter.sync_billing_mode(owner.as_ref());
        meter.validate()?;
        self.store.update_meter(meter).await?;
        *meter = self.store.get_meter(meter.id).await?;
        Ok(())
    }

    async fn ensure_customer_has_no_meter(
        &self,
        customer_id: CustomerId,
        except: Option<MeterId>,
    ) -> Result<(), BillingError> {
        match self.store.find_meter_by_customer(customer_id).await? {
            Some(existing) if Some(existing.id) != except => Err(BillingError::Conflict(format!(
                "customer already owns meter {}",
                existing.serial_number
            ))),
            _ => Ok(()),
        }
    }

    async fn pricing_for(
        &self,
        customer: &Customer,
        basis: FeeBasis,
    ) -> Result<Pricing, BillingError> {
        let tariff = match customer.tariff_id {
            Some(tariff_id) => Some(self.store.get_tariff(tariff_id).await?),
            None => None,
        };
        Ok(self.catalog.resolve(tariff.as_ref(), customer.billing_mode, basis))
    }

    /// Returns Ok(false) when an invoice already exists for the period
    async fn issue_for_reading(
        &self,
        reading: &Reading,
        meter: &Meter,
        customer_id: CustomerId,
        period: &str,
        today: NaiveDate,
        customers: &mut HashMap<CustomerId, Customer>,
    ) -> Result<bool, BillingError> {
        if self.store.invoice_exists(customer_id, meter.id, period).await? {
            return Ok(false);
        }

        if !customers.contains_key(&customer_id) {
            let customer = self.store.get_customer(customer_id).await?;
            customers.insert(customer_id, customer);
        }
        let customer = customers
            .get(&customer_id)
            .ok_or_else(|| BillingError::not_found("Customer", customer_id))?;

        let draft = InvoiceDraft::new(
            customer_id,
            Some(meter.id),
            reading.previous_value,
            reading.current_value,
            today,
            self.config.payment_term_days,
        )
        .with_period(period);
        if draft.consumption() < Decimal::ZERO {
            return Err(BillingError::validation(format!(
                "reading {} has negative consumption {}",
                reading.id, reading.delta
            )));
        }

        let pricing = self.pricing_for(customer, FeeBasis::FixedFee).await?;
        let number = self.store.next_invoice_number(today.year()).await?;
        let invoice = Invoice::issue(number, draft, &pricing)?;
        self.store.insert_invoice(&invoice).await?;
        debug!(invoice_number = %invoice.invoice_number, "Invoice generated from reading");
        Ok(true)
    }

    async fn sweep_invoice(
        &self,
        invoice: &mut Invoice,
        today: NaiveDate,
    ) -> Result<OverdueWrite, BillingError> {
        let penalty = self.penalties.assess(invoice, today);
        invoice.apply_penalty(&penalty)?;

        let suspend = invoice.meter_id.map(|meter_id| (meter_id, self.clock.now()));
        let outcome = self.store.record_overdue(invoice, suspend).await?;

        if outcome == (OverdueWrite::Penalised { suspended: true }) {
            if let Some(meter_id) = invoice.meter_id {
                let serial = self
                    .store
                    .get_meter(meter_id)
                    .await
                    .map(|m| m.serial_number)
                    .unwrap_or_else(|_| meter_id.to_string());
                info!(
                    meter = %serial,
                    invoice_number = %invoice.invoice_number,
                    days_overdue = penalty.days_overdue,
                    "Meter suspended for debt"
                );
            }
        }
        Ok(outcome)
    }
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

