//! Customers
//!
//! A customer owns at most one meter and carries the billing mode that the
//! meter mirrors on every save.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, CustomerId, Money, TariffId};

use crate::error::BillingError;
use crate::requests::UpdateCustomerRequest;

/// How a customer pays for energy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    /// Tops up a card before consuming; never invoiced from readings
    Prepaid,
    /// Invoiced in arrears from meter readings
    Postpaid,
}

impl_labels!(BillingMode {
    Prepaid => "PREPAID",
    Postpaid => "POSTPAID",
});

/// Customer account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    Active,
    Inactive,
}

impl_labels!(CustomerStatus {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
});

/// A utility customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Unique identifier
    pub id: CustomerId,
    /// Full or company name
    pub name: String,
    /// Fiscal identification number (NIF)
    pub fiscal_id: String,
    /// National identity card number
    pub national_id: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Billing mode
    pub billing_mode: BillingMode,
    /// Account status
    pub status: CustomerStatus,
    /// Running balance (prepaid credit)
    pub balance: Money,
    /// Assigned pricing plan
    pub tariff_id: Option<TariffId>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Creates a new active customer
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the name or fiscal id is blank.
    pub fn new(
        name: impl Into<String>,
        fiscal_id: impl Into<String>,
        billing_mode: BillingMode,
        currency: Currency,
    ) -> Result<Self, BillingError> {
        let name = name.into().trim().to_string();
        let fiscal_id = fiscal_id.into().trim().to_string();

        if name.is_empty() {
            return Err(BillingError::validation("customer name is required"));
        }
        if fiscal_id.is_empty() {
            return Err(BillingError::validation("customer fiscal id is required"));
        }

        let now = Utc::now();
        Ok(Self {
            id: CustomerId::new_v7(),
            name,
            fiscal_id,
            national_id: None,
            address: None,
            phone: None,
            email: None,
            billing_mode,
            status: CustomerStatus::Active,
            balance: Money::zero(currency),
            tariff_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Assigns a pricing plan
    pub fn with_tariff(mut self, tariff_id: TariffId) -> Self {
        self.tariff_id = Some(tariff_id);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }

    pub fn is_prepaid(&self) -> bool {
        self.billing_mode == BillingMode::Prepaid
    }

    /// Flips between active and inactive
    pub fn toggle_status(&mut self) -> CustomerStatus {
        self.status = match self.status {
            CustomerStatus::Active => CustomerStatus::Inactive,
            CustomerStatus::Inactive => CustomerStatus::Active,
        };
        self.updated_at = Utc::now();
        self.status
    }

    /// Moves a prepaid customer to postpaid billing
    ///
    /// Returns true if the mode changed.
    pub fn force_postpaid(&mut self) -> bool {
        if self.is_prepaid() {
            self.billing_mode = BillingMode::Postpaid;
            self.updated_at = Utc::now();
            true
        } else {
            false
        }
    }

    /// Applies edited registration data
    ///
    /// Returns true if the billing mode changed, in which case the owned
    /// meter must be re-synced.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the name or fiscal id would become blank.
    pub fn apply_update(&mut self, changes: UpdateCustomerRequest) -> Result<bool, BillingError> {
        if let Some(name) = changes.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(BillingError::validation("customer name is required"));
            }
            self.name = name.to_string();
        }
        if let Some(fiscal_id) = changes.fiscal_id {
            let fiscal_id = fiscal_id.trim();
            if fiscal_id.is_empty() {
                return Err(BillingError::validation("customer fiscal id is required"));
            }
            self.fiscal_id = fiscal_id.to_string();
        }
        if changes.national_id.is_some() {
            self.national_id = changes.national_id;
        }
        if changes.address.is_some() {
            self.address = changes.address;
        }
        if changes.phone.is_some() {
            self.phone = changes.phone;
        }
        if changes.email.is_some() {
            self.email = changes.email;
        }
        if changes.notes.is_some() {
            self.notes = changes.notes;
        }

        let mode_changed = changes
            .billing_mode
            .is_some_and(|mode| mode != self.billing_mode);
        if let Some(mode) = changes.billing_mode {
            self.billing_mode = mode;
        }
        self.updated_at = Utc::now();
        Ok(mode_changed)
    }

    /// Replaces (or clears) the assigned tariff
    pub fn assign_tariff(&mut self, tariff_id: Option<TariffId>) {
        self.tariff_id = tariff_id;
        self.updated_at = Utc::now();
    }
}
