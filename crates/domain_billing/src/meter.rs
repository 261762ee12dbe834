//! Meters and their status state machine
//!
//! ```text
//!   ACTIVE ⇄ INACTIVE          toggle
//!   *      → FAULTY            mark_faulty (owner forced to POSTPAID)
//!   *      → SUSPENDED         suspend (no-op when already suspended)
//!   *      → ACTIVE            reactivate (clears suspension timestamp)
//!   *      → any               set_status (unguarded)
//! ```
//!
//! `suspended_at` is set if and only if the status is `SUSPENDED`; every
//! transition below maintains that.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CustomerId, MeterId};

use crate::customer::{BillingMode, Customer};
use crate::error::BillingError;
use crate::requests::UpdateMeterRequest;

/// Operational status of a meter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterStatus {
    Active,
    Inactive,
    Maintenance,
    Faulty,
    Replaced,
    /// Suspended for unpaid debt
    Suspended,
}

impl_labels!(MeterStatus {
    Active => "ACTIVE",
    Inactive => "INACTIVE",
    Maintenance => "MAINTENANCE",
    Faulty => "FAULTY",
    Replaced => "REPLACED",
    Suspended => "SUSPENDED",
});

/// Electrical connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    #[default]
    SinglePhase,
    ThreePhase,
}

impl_labels!(ConnectionType {
    SinglePhase => "SINGLE_PHASE",
    ThreePhase => "THREE_PHASE",
});

/// A physical meter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meter {
    /// Unique identifier
    pub id: MeterId,
    /// Manufacturer serial number (unique)
    pub serial_number: String,
    /// Mirrors the owning customer's billing mode
    pub billing_mode: BillingMode,
    /// Connection type
    pub connection_type: ConnectionType,
    /// Prepaid card number, required for prepaid meters
    pub card_number: Option<String>,
    /// Owning customer
    pub customer_id: Option<CustomerId>,
    /// Installation address
    pub installation_address: String,
    /// Installation date
    pub installation_date: NaiveDate,
    /// Maximum power in kW
    pub max_power_kw: Decimal,
    /// Operational status
    pub status: MeterStatus,
    /// Cumulative reading in kWh
    pub current_reading: Decimal,
    /// When the last reading was taken
    pub last_reading_at: Option<DateTime<Utc>>,
    /// When the meter was suspended
    pub suspended_at: Option<DateTime<Utc>>,
    /// Notes
    pub notes: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Meter {
    /// Creates an active, unassigned postpaid meter at reading zero
    pub fn new(
        serial_number: impl Into<String>,
        connection_type: ConnectionType,
        installation_address: impl Into<String>,
        installation_date: NaiveDate,
        max_power_kw: Decimal,
    ) -> Self {
        Self {
            id: MeterId::new_v7(),
            serial_number: serial_number.into().trim().to_string(),
            billing_mode: BillingMode::Postpaid,
            connection_type,
            card_number: None,
            customer_id: None,
            installation_address: installation_address.into(),
            installation_date,
            max_power_kw,
            status: MeterStatus::Active,
            current_reading: Decimal::ZERO,
            last_reading_at: None,
            suspended_at: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_card_number(mut self, card_number: impl Into<String>) -> Self {
        self.card_number = Some(card_number.into());
        self
    }

    pub fn with_initial_reading(mut self, reading: Decimal) -> Self {
        self.current_reading = reading;
        self
    }

    /// Links the meter to a customer and adopts their billing mode
    pub fn assign_to(&mut self, customer: &Customer) {
        self.customer_id = Some(customer.id);
        self.billing_mode = customer.billing_mode;
    }

    /// Drops the customer link; the meter itself stays registered
    pub fn unassign(&mut self) {
        self.customer_id = None;
    }

    /// Copies the owner's billing mode onto the meter
    ///
    /// Called before every persist. Unassigned meters keep their mode.
    pub fn sync_billing_mode(&mut self, owner: Option<&Customer>) {
        if let Some(owner) = owner {
            self.billing_mode = owner.billing_mode;
        }
    }

    /// Applies edited registration data; call `validate` afterwards
    pub fn apply_update(&mut self, changes: UpdateMeterRequest) {
        if let Some(serial_number) = changes.serial_number {
            self.serial_number = serial_number.trim().to_string();
        }
        if let Some(connection_type) = changes.connection_type {
            self.connection_type = connection_type;
        }
        if let Some(card_number) = changes.card_number {
            self.card_number = Some(card_number).filter(|c| !c.trim().is_empty());
        }
        if let Some(address) = changes.installation_address {
            self.installation_address = address;
        }
        if let Some(date) = changes.installation_date {
            self.installation_date = date;
        }
        if let Some(max_power_kw) = changes.max_power_kw {
            self.max_power_kw = max_power_kw;
        }
        if changes.notes.is_some() {
            self.notes = changes.notes;
        }
    }

    /// Checks the registration invariants
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.serial_number.is_empty() {
            return Err(BillingError::validation("meter serial number is required"));
        }
        if self.max_power_kw.is_sign_negative() {
            return Err(BillingError::validation("max_power_kw must not be negative"));
        }
        let has_card = self
            .card_number
            .as_deref()
            .is_some_and(|card| !card.trim().is_empty());
        if self.billing_mode == BillingMode::Prepaid && !has_card {
            return Err(BillingError::validation("prepaid meters require a card number"));
        }
        Ok(())
    }

    pub fn is_suspended(&self) -> bool {
        self.status == MeterStatus::Suspended
    }

    /// ACTIVE becomes INACTIVE; anything else becomes ACTIVE
    pub fn toggle(&mut self) -> MeterStatus {
        let next = match self.status {
            MeterStatus::Active => MeterStatus::Inactive,
            _ => MeterStatus::Active,
        };
        self.status = next;
        self.suspended_at = None;
        next
    }

    /// Marks the meter as damaged
    pub fn mark_faulty(&mut self) {
        self.status = MeterStatus::Faulty;
        self.suspended_at = None;
    }

    /// Suspends for debt
    ///
    /// Returns false, leaving the original timestamp, when already suspended.
    pub fn suspend(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_suspended() {
            return false;
        }
        self.status = MeterStatus::Suspended;
        self.suspended_at = Some(at);
        true
    }

    /// Returns the meter to service
    pub fn reactivate(&mut self) {
        self.status = MeterStatus::Active;
        self.suspended_at = None;
    }

    /// Sets any status
    pub fn set_status(&mut self, status: MeterStatus, at: DateTime<Utc>) {
        match status {
            MeterStatus::Suspended => {
                self.suspend(at);
            }
            other => {
                self.status = other;
                self.suspended_at = None;
            }
        }
    }

    /// Stores a new cumulative reading and returns the previous one
    pub(crate) fn advance_reading(&mut self, value: Decimal, at: DateTime<Utc>) -> Decimal {
        let previous = self.current_reading;
        self.current_reading = value;
        self.last_reading_at = Some(at);
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn meter() -> Meter {
        Meter::new(
            "SN-0001",
            ConnectionType::SinglePhase,
            "Rua da Missão 12, Luanda",
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            dec!(6.6),
        )
    }

    #[test]
    fn test_toggle_active_inactive() {
        let mut m = meter();
        assert_eq!(m.toggle(), MeterStatus::Inactive);
        assert_eq!(m.toggle(), MeterStatus::Active);
    }

    #[test]
    fn test_toggle_from_suspended_clears_timestamp() {
        let mut m = meter();
        m.suspend(Utc::now());
        assert_eq!(m.toggle(), MeterStatus::Active);
        assert!(m.suspended_at.is_none());
    }

    #[test]
    fn test_second_suspend_keeps_first_timestamp() {
        let mut m = meter();
        let first = Utc::now();
        assert!(m.suspend(first));
        assert!(!m.suspend(first + chrono::Duration::days(3)));
        assert_eq!(m.suspended_at, Some(first));
    }

    #[test]
    fn test_set_status_keeps_timestamp_invariant() {
        let mut m = meter();
        let at = Utc::now();
        m.set_status(MeterStatus::Suspended, at);
        assert_eq!(m.suspended_at, Some(at));
        m.set_status(MeterStatus::Maintenance, at);
        assert!(m.suspended_at.is_none());
    }

    #[test]
    fn test_prepaid_requires_card() {
        let customer =
            Customer::new("Ana Domingos", "5000123456", BillingMode::Prepaid, Currency::AOA)
                .unwrap();
        let mut m = meter();
        m.assign_to(&customer);
        assert!(matches!(m.validate(), Err(BillingError::Validation(_))));

        let mut with_card = meter().with_card_number("CARD-778");
        with_card.assign_to(&customer);
        assert!(with_card.validate().is_ok());
    }

    #[test]
    fn test_update_keeps_reading_and_status() {
        let mut m = meter().with_initial_reading(dec!(420));
        m.suspend(Utc::now());

        m.apply_update(UpdateMeterRequest {
            serial_number: Some("  SN-0001-B ".into()),
            max_power_kw: Some(dec!(13.2)),
            ..Default::default()
        });

        assert_eq!(m.serial_number, "SN-0001-B");
        assert_eq!(m.max_power_kw, dec!(13.2));
        assert_eq!(m.current_reading, dec!(420));
        assert!(m.is_suspended());
    }

    #[test]
    fn test_sync_follows_owner() {
        let mut customer =
            Customer::new("Ana Domingos", "5000123456", BillingMode::Prepaid, Currency::AOA)
                .unwrap();
        let mut m = meter().with_card_number("CARD-778");
        m.assign_to(&customer);
        customer.force_postpaid();
        m.sync_billing_mode(Some(&customer));
        assert_eq!(m.billing_mode, BillingMode::Postpaid);
    }
}
