//! Payment recording
//!
//! Payments are appended against an invoice and never change its status.
//! Settling an invoice is a separate action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{InvoiceId, Money, PaymentId};

use crate::error::BillingError;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at a service desk
    Cash,
    /// Multicaixa (ATM / POS network)
    Multicaixa,
    /// Bank transfer
    BankTransfer,
}

impl_labels!(PaymentMethod {
    Cash => "CASH",
    Multicaixa => "MULTICAIXA",
    BankTransfer => "BANK_TRANSFER",
});

/// A payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Invoice being paid
    pub invoice_id: InvoiceId,
    /// Payment amount
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// External reference (Multicaixa or bank reference)
    pub reference: Option<String>,
    /// When the payment was received
    pub paid_at: DateTime<Utc>,
    /// Notes
    pub notes: Option<String>,
}

impl Payment {
    /// Creates a payment
    ///
    /// # Errors
    ///
    /// Returns `Validation` for zero or negative amounts.
    pub fn new(
        invoice_id: InvoiceId,
        amount: Money,
        method: PaymentMethod,
        paid_at: DateTime<Utc>,
    ) -> Result<Self, BillingError> {
        if !amount.is_positive() {
            return Err(BillingError::validation("payment amount must be positive"));
        }

        Ok(Self {
            id: PaymentId::new_v7(),
            invoice_id,
            amount,
            method,
            reference: None,
            paid_at,
            notes: None,
        })
    }

    /// Sets the external reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
