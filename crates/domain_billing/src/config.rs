//! Billing configuration
//!
//! Every pricing and penalty default lives here so none of them is
//! hard-coded at a call site.

use core_kernel::{Currency, Money, Rate, Timezone};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::BillingError;

/// Pricing and debt-lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Billing currency
    pub currency: Currency,
    /// Unit price per kWh for customers without a tariff
    pub default_unit_price: Decimal,
    /// Fixed fee used by bulk generation for customers without a tariff
    pub default_fixed_fee: Decimal,
    /// Surcharge used by the reading and manual paths for customers without a tariff
    pub default_surcharge: Decimal,
    /// Days between issue date and due date
    pub payment_term_days: i64,
    /// Days past due before the sweep penalises and suspends
    pub suspension_grace_days: i64,
    /// Flat late fee, applied once to the consumption value
    pub late_fee_rate: Rate,
    /// Simple daily interest on the consumption value
    pub daily_interest_rate: Rate,
    /// Refuse reactivation while the meter's customer has overdue invoices
    pub require_settled_debt_for_reactivation: bool,
    /// Timezone used to derive "today"
    pub timezone: Timezone,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            currency: Currency::AOA,
            default_unit_price: dec!(50.00),
            default_fixed_fee: dec!(0.00),
            default_surcharge: dec!(0.00),
            payment_term_days: 15,
            suspension_grace_days: 30,
            late_fee_rate: Rate::new(dec!(0.02)),
            daily_interest_rate: Rate::new(dec!(0.001)),
            require_settled_debt_for_reactivation: false,
            timezone: Timezone::default(),
        }
    }
}

impl BillingConfig {
    /// Rejects settings the engine cannot work with
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.default_unit_price.is_sign_negative() {
            return Err(BillingError::validation("default_unit_price must not be negative"));
        }
        if self.default_fixed_fee.is_sign_negative() || self.default_surcharge.is_sign_negative() {
            return Err(BillingError::validation("default fees must not be negative"));
        }
        if self.payment_term_days < 0 {
            return Err(BillingError::validation("payment_term_days must not be negative"));
        }
        if self.suspension_grace_days < 0 {
            return Err(BillingError::validation("suspension_grace_days must not be negative"));
        }
        if self.late_fee_rate.as_decimal().is_sign_negative()
            || self.daily_interest_rate.as_decimal().is_sign_negative()
        {
            return Err(BillingError::validation("penalty rates must not be negative"));
        }
        Ok(())
    }

    pub fn money(&self, amount: Decimal) -> Money {
        Money::new(amount, self.currency)
    }
}
