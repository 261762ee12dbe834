//! Row types and their conversion to domain entities
//!
//! Status-like columns are stored as their upper-case labels and amounts as
//! NUMERIC next to a currency code column.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use core_kernel::{Currency, Money};
use domain_billing::{Customer, Invoice, Meter, Payment, Reading, Tariff};

use crate::error::DatabaseError;

fn parse<T>(column: &'static str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e| DatabaseError::corrupt(column, e))
}

fn money(amount: Decimal, currency: Currency) -> Money {
    Money::new(amount, currency)
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct TariffRow {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub currency: String,
    pub unit_price: Decimal,
    pub fixed_fee: Decimal,
    pub postpaid_surcharge: Decimal,
    pub prepaid_surcharge: Decimal,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TariffRow> for Tariff {
    type Error = DatabaseError;

    fn try_from(row: TariffRow) -> Result<Self, Self::Error> {
        let currency: Currency = parse("currency", row.currency.trim())?;
        Ok(Tariff {
            id: row.id.into(),
            name: row.name,
            category: parse("category", &row.category)?,
            unit_price: money(row.unit_price, currency),
            fixed_fee: money(row.fixed_fee, currency),
            postpaid_surcharge: money(row.postpaid_surcharge, currency),
            prepaid_surcharge: money(row.prepaid_surcharge, currency),
            description: row.description,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct CustomerRow {
    pub id: Uuid,
    pub name: String,
    pub fiscal_id: String,
    pub national_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub billing_mode: String,
    pub status: String,
    pub balance: Decimal,
    pub currency: String,
    pub tariff_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = DatabaseError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let currency: Currency = parse("currency", row.currency.trim())?;
        Ok(Customer {
            id: row.id.into(),
            name: row.name,
            fiscal_id: row.fiscal_id,
            national_id: row.national_id,
            address: row.address,
            phone: row.phone,
            email: row.email,
            billing_mode: parse("billing_mode", &row.billing_mode)?,
            status: parse("status", &row.status)?,
            balance: money(row.balance, currency),
            tariff_id: row.tariff_id.map(Into::into),
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct MeterRow {
    pub id: Uuid,
    pub serial_number: String,
    pub billing_mode: String,
    pub connection_type: String,
    pub card_number: Option<String>,
    pub customer_id: Option<Uuid>,
    pub installation_address: String,
    pub installation_date: NaiveDate,
    pub max_power_kw: Decimal,
    pub status: String,
    pub current_reading: Decimal,
    pub last_reading_at: Option<DateTime<Utc>>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MeterRow> for Meter {
    type Error = DatabaseError;

    fn try_from(row: MeterRow) -> Result<Self, Self::Error> {
        Ok(Meter {
            id: row.id.into(),
            serial_number: row.serial_number,
            billing_mode: parse("billing_mode", &row.billing_mode)?,
            connection_type: parse("connection_type", &row.connection_type)?,
            card_number: row.card_number,
            customer_id: row.customer_id.map(Into::into),
            installation_address: row.installation_address,
            installation_date: row.installation_date,
            max_power_kw: row.max_power_kw,
            status: parse("status", &row.status)?,
            current_reading: row.current_reading,
            last_reading_at: row.last_reading_at,
            suspended_at: row.suspended_at,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct ReadingRow {
    pub id: Uuid,
    pub meter_id: Uuid,
    pub previous_value: Decimal,
    pub current_value: Decimal,
    pub delta: Decimal,
    pub recorded_at: DateTime<Utc>,
    pub operator: Option<String>,
    pub notes: Option<String>,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            id: row.id.into(),
            meter_id: row.meter_id.into(),
            previous_value: row.previous_value,
            current_value: row.current_value,
            delta: row.delta,
            recorded_at: row.recorded_at,
            operator: row.operator,
            notes: row.notes,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct InvoiceRow {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub meter_id: Option<Uuid>,
    pub period: String,
    pub previous_reading: Decimal,
    pub current_reading: Decimal,
    pub consumption: Decimal,
    pub currency: String,
    pub consumption_value: Decimal,
    pub other_fees: Decimal,
    pub late_fee: Decimal,
    pub interest: Decimal,
    pub total: Decimal,
    pub status: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DatabaseError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let currency: Currency = parse("currency", row.currency.trim())?;
        Ok(Invoice {
            id: row.id.into(),
            invoice_number: row.invoice_number,
            customer_id: row.customer_id.into(),
            meter_id: row.meter_id.map(Into::into),
            period: row.period,
            previous_reading: row.previous_reading,
            current_reading: row.current_reading,
            consumption: row.consumption,
            consumption_value: money(row.consumption_value, currency),
            other_fees: money(row.other_fees, currency),
            late_fee: money(row.late_fee, currency),
            interest: money(row.interest, currency),
            total: money(row.total, currency),
            status: parse("status", &row.status)?,
            issue_date: row.issue_date,
            due_date: row.due_date,
            paid_at: row.paid_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PaymentRow {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let currency: Currency = parse("currency", row.currency.trim())?;
        Ok(Payment {
            id: row.id.into(),
            invoice_id: row.invoice_id.into(),
            amount: money(row.amount, currency),
            method: parse("method", &row.method)?,
            reference: row.reference,
            paid_at: row.paid_at,
            notes: row.notes,
        })
    }
}

/// Converts a batch of rows, failing on the first corrupt one
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DatabaseError>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}
