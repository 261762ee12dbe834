//! Billing domain errors

use core_kernel::{MoneyError, PortError};
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Malformed input; nothing was committed
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced customer, meter, tariff or invoice does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// The operation is not allowed in the current state
    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    /// The store reported a conflict (duplicate key, concurrent update)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Monetary arithmetic failed
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// The backing store failed
    #[error("Storage error: {0}")]
    Storage(PortError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        BillingError::InconsistentState(message.into())
    }

    /// Returns true when the error was caused by caller input
    pub fn is_client_error(&self) -> bool {
        !matches!(self, BillingError::Storage(_) | BillingError::Money(_))
    }
}

impl From<PortError> for BillingError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Validation { message, field } => match field {
                Some(field) => BillingError::Validation(format!("{field}: {message}")),
                None => BillingError::Validation(message),
            },
            PortError::Conflict { message } => BillingError::Conflict(message),
            PortError::NotFound { entity_type, id } => BillingError::NotFound {
                entity: entity_name(&entity_type),
                id,
            },
            other => BillingError::Storage(other),
        }
    }
}

// Stores report entity names as strings; the domain error keeps static names.
fn entity_name(entity_type: &str) -> &'static str {
    match entity_type {
        "Customer" => "Customer",
        "Meter" => "Meter",
        "Tariff" => "Tariff",
        "Invoice" => "Invoice",
        "Payment" => "Payment",
        "Reading" => "Reading",
        _ => "Entity",
    }
}
