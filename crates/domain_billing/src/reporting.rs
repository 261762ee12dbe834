//! Read models: balances, meter history, debt control and statistics
//!
//! These are derived views; building them never writes to the store.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, CustomerId, InvoiceId, Money};

use crate::customer::{BillingMode, Customer, CustomerStatus};
use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::meter::{Meter, MeterStatus};
use crate::payment::Payment;
use crate::reading::Reading;

/// Total, paid and remaining amounts for one invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceBalance {
    pub invoice_id: InvoiceId,
    pub total: Money,
    pub paid: Money,
    /// Never below zero; overpayments show up in `paid`
    pub remaining: Money,
    pub payments: usize,
}

impl InvoiceBalance {
    pub fn compute(invoice: &Invoice, payments: &[Payment]) -> Result<Self, BillingError> {
        let currency = invoice.total.currency();
        let paid = Money::try_sum(currency, payments.iter().map(|p| &p.amount))?;
        let outstanding = invoice.total.checked_sub(&paid)?;
        let remaining = if outstanding.is_negative() {
            Money::zero(currency)
        } else {
            outstanding
        };
        Ok(Self {
            invoice_id: invoice.id,
            total: invoice.total,
            paid,
            remaining,
            payments: payments.len(),
        })
    }

    pub fn is_fully_paid(&self) -> bool {
        self.remaining.is_zero()
    }
}

/// A meter with its readings and invoices, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterHistory {
    pub meter: Meter,
    pub readings: Vec<Reading>,
    pub invoices: Vec<Invoice>,
}

impl MeterHistory {
    pub fn new(meter: Meter, mut readings: Vec<Reading>, mut invoices: Vec<Invoice>) -> Self {
        readings.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        invoices.sort_by(|a, b| {
            b.issue_date
                .cmp(&a.issue_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Self { meter, readings, invoices }
    }
}

/// Debt position of one customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDebt {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub total_debt: Money,
    /// Unpaid invoices past their due date
    pub overdue_invoices: usize,
    /// Unpaid invoices not yet due
    pub pending_invoices: usize,
    pub max_days_overdue: i64,
}

/// Debt control dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtReport {
    pub generated_on: NaiveDate,
    /// Sorted by debt, largest first
    pub customers: Vec<CustomerDebt>,
    pub total_debt: Money,
    pub unpaid_invoices: usize,
    pub suspended_meters: usize,
}

impl DebtReport {
    /// Groups unpaid invoices by customer
    pub fn build(
        today: NaiveDate,
        currency: Currency,
        customers: &[Customer],
        invoices: &[Invoice],
        meters: &[Meter],
    ) -> Result<Self, BillingError> {
        let names: HashMap<CustomerId, &str> =
            customers.iter().map(|c| (c.id, c.name.as_str())).collect();

        let mut by_customer: HashMap<CustomerId, CustomerDebt> = HashMap::new();
        let mut total_debt = Money::zero(currency);
        let mut unpaid_invoices = 0;

        for invoice in invoices.iter().filter(|i| i.is_unpaid()) {
            unpaid_invoices += 1;
            total_debt = total_debt.checked_add(&invoice.total)?;

            let entry = by_customer
                .entry(invoice.customer_id)
                .or_insert_with(|| CustomerDebt {
                    customer_id: invoice.customer_id,
                    customer_name: names
                        .get(&invoice.customer_id)
                        .map(|n| n.to_string())
                        .unwrap_or_default(),
                    total_debt: Money::zero(currency),
                    overdue_invoices: 0,
                    pending_invoices: 0,
                    max_days_overdue: 0,
                });

            entry.total_debt = entry.total_debt.checked_add(&invoice.total)?;
            if invoice.due_date < today {
                entry.overdue_invoices += 1;
                entry.max_days_overdue = entry.max_days_overdue.max(invoice.days_overdue(today));
            } else {
                entry.pending_invoices += 1;
            }
        }

        let mut customers: Vec<CustomerDebt> = by_customer.into_values().collect();
        customers.sort_by(|a, b| {
            b.total_debt
                .amount()
                .cmp(&a.total_debt.amount())
                .then_with(|| a.customer_name.cmp(&b.customer_name))
        });

        Ok(Self {
            generated_on: today,
            customers,
            total_debt,
            unpaid_invoices,
            suspended_meters: meters.iter().filter(|m| m.is_suspended()).count(),
        })
    }
}

/// Headline figures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingStatistics {
    pub customers: usize,
    pub active_customers: usize,
    pub prepaid_customers: usize,
    pub postpaid_customers: usize,
    pub meters: usize,
    pub active_meters: usize,
    pub invoices: usize,
    pub pending_invoices: usize,
    pub paid_invoices: usize,
    pub overdue_invoices: usize,
    /// Sum of all invoice totals
    pub total_billed: Money,
    /// Sum of all payments
    pub total_received: Money,
    /// Sum of unpaid invoice totals
    pub outstanding_debt: Money,
}

impl BillingStatistics {
    pub fn build(
        currency: Currency,
        customers: &[Customer],
        meters: &[Meter],
        invoices: &[Invoice],
        payments: &[Payment],
    ) -> Result<Self, BillingError> {
        let count_invoices =
            |status: InvoiceStatus| invoices.iter().filter(|i| i.status == status).count();
        let count_customers =
            |mode: BillingMode| customers.iter().filter(|c| c.billing_mode == mode).count();

        Ok(Self {
            customers: customers.len(),
            active_customers: customers
                .iter()
                .filter(|c| c.status == CustomerStatus::Active)
                .count(),
            prepaid_customers: count_customers(BillingMode::Prepaid),
            postpaid_customers: count_customers(BillingMode::Postpaid),
            meters: meters.len(),
            active_meters: meters.iter().filter(|m| m.status == MeterStatus::Active).count(),
            invoices: invoices.len(),
            pending_invoices: count_invoices(InvoiceStatus::Pending),
            paid_invoices: count_invoices(InvoiceStatus::Paid),
            overdue_invoices: count_invoices(InvoiceStatus::Overdue),
            total_billed: Money::try_sum(currency, invoices.iter().map(|i| &i.total))?,
            total_received: Money::try_sum(currency, payments.iter().map(|p| &p.amount))?,
            outstanding_debt: Money::try_sum(
                currency,
                invoices.iter().filter(|i| i.is_unpaid()).map(|i| &i.total),
            )?,
        })
    }
}
