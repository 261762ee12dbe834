//! Request handlers, one module per resource

pub mod customers;
pub mod health;
pub mod invoices;
pub mod meters;
pub mod reports;
pub mod tariffs;
