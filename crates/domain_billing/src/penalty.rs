//! Late fees and interest for overdue invoices
//!
//! Penalties are computed from scratch against the original due date on
//! every sweep:
//!
//! ```text
//! late_fee = consumption_value × late_fee_rate
//! interest = consumption_value × daily_interest_rate × days_overdue
//! ```

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use core_kernel::{Money, Rate};

use crate::config::BillingConfig;
use crate::invoice::Invoice;

/// Penalty amounts for one invoice on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Penalty {
    pub days_overdue: i64,
    pub late_fee: Money,
    pub interest: Money,
}

/// Rules for selecting and penalising overdue invoices
#[derive(Debug, Clone)]
pub struct PenaltyPolicy {
    grace_days: i64,
    late_fee_rate: Rate,
    daily_interest_rate: Rate,
}

impl PenaltyPolicy {
    pub fn new(grace_days: i64, late_fee_rate: Rate, daily_interest_rate: Rate) -> Self {
        Self {
            grace_days,
            late_fee_rate,
            daily_interest_rate,
        }
    }

    pub fn from_config(config: &BillingConfig) -> Self {
        Self::new(
            config.suspension_grace_days,
            config.late_fee_rate,
            config.daily_interest_rate,
        )
    }

    /// Invoices due strictly before this date are swept
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.grace_days)
    }

    /// True if the sweep running on `today` should pick this invoice up
    pub fn is_due_for_sweep(&self, invoice: &Invoice, today: NaiveDate) -> bool {
        invoice.is_unpaid() && invoice.due_date < self.cutoff(today)
    }

    /// Computes the penalty for an invoice as of `today`
    pub fn assess(&self, invoice: &Invoice, today: NaiveDate) -> Penalty {
        let days_overdue = invoice.days_overdue(today);
        let base = &invoice.consumption_value;
        Penalty {
            days_overdue,
            late_fee: self.late_fee_rate.apply(base).round_to_currency(),
            interest: self
                .daily_interest_rate
                .apply_simple(base, days_overdue)
                .round_to_currency(),
        }
    }
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self::from_config(&BillingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceDraft;
    use crate::tariff::Pricing;
    use core_kernel::{Currency, CustomerId, MeterId};
    use rust_decimal_macros::dec;

    fn invoice_due(due: NaiveDate) -> Invoice {
        let pricing = Pricing {
            unit_price: Money::new(dec!(50), Currency::AOA),
            other_fees: Money::new(dec!(10), Currency::AOA),
        };
        let meter_id = Some(MeterId::new());
        let draft = InvoiceDraft::new(CustomerId::new(), meter_id, dec!(100), dec!(150), due, 0);
        Invoice::issue("FAT-2026-000001", draft, &pricing).unwrap()
    }

    #[test]
    fn test_cutoff_boundary() {
        let policy = PenaltyPolicy::default();
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        let thirty = invoice_due(today - Duration::days(30));
        let thirty_one = invoice_due(today - Duration::days(31));
        assert!(!policy.is_due_for_sweep(&thirty, today));
        assert!(policy.is_due_for_sweep(&thirty_one, today));
    }

    #[test]
    fn test_assess_forty_days() {
        let policy = PenaltyPolicy::default();
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let invoice = invoice_due(today - Duration::days(40));

        let penalty = policy.assess(&invoice, today);
        assert_eq!(penalty.days_overdue, 40);
        assert_eq!(penalty.late_fee.amount(), dec!(50));
        assert_eq!(penalty.interest.amount(), dec!(100));
    }

    #[test]
    fn test_paid_invoices_are_never_swept() {
        let policy = PenaltyPolicy::default();
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let mut invoice = invoice_due(today - Duration::days(90));
        invoice.settle(chrono::Utc::now()).unwrap();
        assert!(!policy.is_due_for_sweep(&invoice, today));
    }
}
