//! Invoices
//!
//! An invoice carries four additive components and a total that always
//! equals their sum:
//!
//! ```text
//! total = consumption_value + other_fees + late_fee + interest
//! ```
//!
//! Penalties start at zero and are only written by the suspension sweep.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, InvoiceId, MeterId, Money};

use crate::error::BillingError;
use crate::penalty::Penalty;
use crate::tariff::Pricing;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Issued and awaiting payment
    Pending,
    /// Settled
    Paid,
    /// Penalised by the sweep
    Overdue,
}

impl_labels!(InvoiceStatus {
    Pending => "PENDING",
    Paid => "PAID",
    Overdue => "OVERDUE",
});

/// Human-readable billing period, e.g. `October/2026`
pub fn billing_period(date: NaiveDate) -> String {
    date.format("%B/%Y").to_string()
}

/// Everything needed to price an invoice except the tariff
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    pub customer_id: CustomerId,
    pub meter_id: Option<MeterId>,
    pub period: String,
    pub previous_reading: Decimal,
    pub current_reading: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
}

impl InvoiceDraft {
    /// A pending draft for the period of `issue_date`, due after `payment_term_days`
    pub fn new(
        customer_id: CustomerId,
        meter_id: Option<MeterId>,
        previous_reading: Decimal,
        current_reading: Decimal,
        issue_date: NaiveDate,
        payment_term_days: i64,
    ) -> Self {
        Self {
            customer_id,
            meter_id,
            period: billing_period(issue_date),
            previous_reading,
            current_reading,
            issue_date,
            due_date: issue_date + Duration::days(payment_term_days),
            status: InvoiceStatus::Pending,
        }
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = period.into();
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn consumption(&self) -> Decimal {
        self.current_reading - self.previous_reading
    }
}

/// A billing document for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Invoice number (human-readable, assigned by the store)
    pub invoice_number: String,
    /// Customer being billed
    pub customer_id: CustomerId,
    /// Meter the consumption was read from
    pub meter_id: Option<MeterId>,
    /// Billing period label
    pub period: String,
    /// Reading snapshot at the start of the period
    pub previous_reading: Decimal,
    /// Reading snapshot at the end of the period
    pub current_reading: Decimal,
    /// kWh consumed
    pub consumption: Decimal,
    /// consumption × unit price
    pub consumption_value: Money,
    /// Fixed fee or surcharge
    pub other_fees: Money,
    /// Late fee written by the sweep
    pub late_fee: Money,
    /// Interest written by the sweep
    pub interest: Money,
    /// Sum of the four components
    pub total: Money,
    /// Status
    pub status: InvoiceStatus,
    /// Issue date
    pub issue_date: NaiveDate,
    /// Due date
    pub due_date: NaiveDate,
    /// When the invoice was settled
    pub paid_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Prices a draft and creates the invoice
    ///
    /// # Errors
    ///
    /// * `Validation` when the current reading is below the previous one
    /// * `Money` when the tariff mixes currencies
    pub fn issue(
        invoice_number: impl Into<String>,
        draft: InvoiceDraft,
        pricing: &Pricing,
    ) -> Result<Self, BillingError> {
        let consumption = draft.consumption();
        if consumption < Decimal::ZERO {
            return Err(BillingError::validation(format!(
                "consumption negative: current reading {} is below previous reading {}",
                draft.current_reading, draft.previous_reading
            )));
        }

        let currency = pricing.unit_price.currency();
        let consumption_value = pricing.unit_price.multiply(consumption).round_to_currency();
        let other_fees = pricing.other_fees.round_to_currency();
        let total = consumption_value.checked_add(&other_fees)?;
        let now = Utc::now();

        Ok(Self {
            id: InvoiceId::new_v7(),
            invoice_number: invoice_number.into(),
            customer_id: draft.customer_id,
            meter_id: draft.meter_id,
            period: draft.period,
            previous_reading: draft.previous_reading,
            current_reading: draft.current_reading,
            consumption,
            consumption_value,
            other_fees,
            late_fee: Money::zero(currency),
            interest: Money::zero(currency),
            total,
            status: draft.status,
            issue_date: draft.issue_date,
            due_date: draft.due_date,
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sum of the four components
    pub fn components_total(&self) -> Result<Money, BillingError> {
        let parts = [self.consumption_value, self.other_fees, self.late_fee, self.interest];
        Ok(Money::try_sum(self.consumption_value.currency(), &parts)?)
    }

    /// True while the invoice still awaits payment
    pub fn is_unpaid(&self) -> bool {
        matches!(self.status, InvoiceStatus::Pending | InvoiceStatus::Overdue)
    }

    /// Whole days past the due date, zero if not yet due
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days().max(0)
    }

    /// Replaces the penalty fields, recomputes the total and marks the invoice overdue
    ///
    /// Penalties are overwritten, not accumulated.
    pub fn apply_penalty(&mut self, penalty: &Penalty) -> Result<(), BillingError> {
        self.late_fee = penalty.late_fee;
        self.interest = penalty.interest;
        self.total = self.components_total()?;
        self.status = InvoiceStatus::Overdue;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the invoice as paid
    pub fn settle(&mut self, at: DateTime<Utc>) -> Result<(), BillingError> {
        if self.status == InvoiceStatus::Paid {
            return Err(BillingError::inconsistent(format!(
                "invoice {} is already paid",
                self.invoice_number
            )));
        }
        self.status = InvoiceStatus::Paid;
        self.paid_at = Some(at);
        self.updated_at = at;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn pricing(unit: Decimal, fees: Decimal) -> Pricing {
        Pricing {
            unit_price: Money::new(unit, Currency::AOA),
            other_fees: Money::new(fees, Currency::AOA),
        }
    }

    fn draft(previous: Decimal, current: Decimal) -> InvoiceDraft {
        InvoiceDraft::new(
            CustomerId::new(),
            Some(MeterId::new()),
            previous,
            current,
            NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            15,
        )
    }

    /// Issues at 50 Kz per kWh
    fn issue(
        number: &str,
        previous: Decimal,
        current: Decimal,
        fees: Decimal,
    ) -> Result<Invoice, BillingError> {
        Invoice::issue(number, draft(previous, current), &pricing(dec!(50), fees))
    }

    #[test]
    fn test_issue_prices_consumption() {
        let invoice = issue("FAT-2026-000001", dec!(100), dec!(150), dec!(10)).unwrap();

        assert_eq!(invoice.consumption, dec!(50));
        assert_eq!(invoice.consumption_value.amount(), dec!(2500));
        assert_eq!(invoice.other_fees.amount(), dec!(10));
        assert_eq!(invoice.total.amount(), dec!(2510));
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.period, "October/2026");
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
    }

    #[test]
    fn test_negative_consumption_is_rejected() {
        let result = issue("FAT-2026-000002", dec!(150), dec!(100), dec!(0));
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_zero_consumption_bills_fees_only() {
        let invoice = issue("FAT-2026-000003", dec!(150), dec!(150), dec!(10)).unwrap();
        assert_eq!(invoice.total.amount(), dec!(10));
    }

    #[test]
    fn test_apply_penalty_overwrites() {
        let mut invoice = issue("FAT-2026-000004", dec!(100), dec!(150), dec!(10)).unwrap();
        let penalty = |days_overdue, interest| Penalty {
            days_overdue,
            late_fee: Money::new(dec!(50), Currency::AOA),
            interest: Money::new(interest, Currency::AOA),
        };

        invoice.apply_penalty(&penalty(40, dec!(100))).unwrap();
        assert_eq!(invoice.total.amount(), dec!(2660));

        invoice.apply_penalty(&penalty(45, dec!(112.50))).unwrap();
        assert_eq!(invoice.total.amount(), dec!(2672.50));
        assert_eq!(invoice.status, InvoiceStatus::Overdue);
    }

    #[test]
    fn test_settle_twice_fails() {
        let mut invoice = issue("FAT-2026-000005", dec!(0), dec!(10), dec!(0)).unwrap();
        invoice.settle(Utc::now()).unwrap();
        assert!(matches!(invoice.settle(Utc::now()), Err(BillingError::InconsistentState(_))));
    }
}
