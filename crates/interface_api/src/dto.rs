//! Request bodies and query parameters
//!
//! Bodies are checked with `validator` before they reach the billing
//! service, which applies the domain rules.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use core_kernel::{CustomerId, MeterId, TariffId};
use domain_billing::{
    BillingMode, ConnectionType, CreateTariffRequest, InvoiceQuery, InvoiceStatus,
    ManualInvoiceRequest, MeterStatus, PaymentMethod, RecordPaymentRequest, RecordReadingRequest,
    RegisterCustomerRequest, RegisterMeterRequest, TariffCategory, UpdateCustomerRequest,
    UpdateMeterRequest, UpdateTariffRequest,
};

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(
            ValidationError::new("non_negative").with_message("must not be negative".into())
        );
    }
    Ok(())
}

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(
            ValidationError::new("positive").with_message("must be greater than zero".into())
        );
    }
    Ok(())
}

// ============================================================================
// Customers & tariffs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerDto {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub fiscal_id: String,
    #[validate(length(max = 32))]
    pub national_id: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub billing_mode: BillingMode,
    pub tariff_id: Option<TariffId>,
    pub notes: Option<String>,
}

impl From<CreateCustomerDto> for RegisterCustomerRequest {
    fn from(dto: CreateCustomerDto) -> Self {
        RegisterCustomerRequest {
            name: dto.name,
            fiscal_id: dto.fiscal_id,
            national_id: dto.national_id,
            address: dto.address,
            phone: dto.phone,
            email: dto.email,
            billing_mode: dto.billing_mode,
            tariff_id: dto.tariff_id,
            notes: dto.notes,
        }
    }
}

/// Partial customer edit; absent fields are left alone
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCustomerDto {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub fiscal_id: Option<String>,
    #[validate(length(max = 32))]
    pub national_id: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub billing_mode: Option<BillingMode>,
    pub notes: Option<String>,
}

impl From<UpdateCustomerDto> for UpdateCustomerRequest {
    fn from(dto: UpdateCustomerDto) -> Self {
        UpdateCustomerRequest {
            name: dto.name,
            fiscal_id: dto.fiscal_id,
            national_id: dto.national_id,
            address: dto.address,
            phone: dto.phone,
            email: dto.email,
            billing_mode: dto.billing_mode,
            notes: dto.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignTariffDto {
    pub tariff_id: Option<TariffId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTariffDto {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub category: TariffCategory,
    #[validate(custom(function = "non_negative"))]
    pub unit_price: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub fixed_fee: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub postpaid_surcharge: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub prepaid_surcharge: Decimal,
    pub description: Option<String>,
}

impl From<CreateTariffDto> for CreateTariffRequest {
    fn from(dto: CreateTariffDto) -> Self {
        CreateTariffRequest {
            name: dto.name,
            category: dto.category,
            unit_price: dto.unit_price,
            fixed_fee: dto.fixed_fee,
            postpaid_surcharge: dto.postpaid_surcharge,
            prepaid_surcharge: dto.prepaid_surcharge,
            description: dto.description,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTariffDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub category: Option<TariffCategory>,
    #[validate(custom(function = "non_negative"))]
    pub unit_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub fixed_fee: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub postpaid_surcharge: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub prepaid_surcharge: Option<Decimal>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl From<UpdateTariffDto> for UpdateTariffRequest {
    fn from(dto: UpdateTariffDto) -> Self {
        UpdateTariffRequest {
            name: dto.name,
            category: dto.category,
            unit_price: dto.unit_price,
            fixed_fee: dto.fixed_fee,
            postpaid_surcharge: dto.postpaid_surcharge,
            prepaid_surcharge: dto.prepaid_surcharge,
            description: dto.description,
            active: dto.active,
        }
    }
}

// ============================================================================
// Meters & readings
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMeterDto {
    #[validate(length(min = 1, max = 64))]
    pub serial_number: String,
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub connection_type: ConnectionType,
    #[validate(length(max = 64))]
    pub card_number: Option<String>,
    #[validate(length(min = 1))]
    pub installation_address: String,
    /// Defaults to today
    pub installation_date: Option<NaiveDate>,
    #[validate(custom(function = "non_negative"))]
    pub max_power_kw: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub initial_reading: Decimal,
    pub notes: Option<String>,
}

impl CreateMeterDto {
    pub fn into_request(self, today: NaiveDate) -> RegisterMeterRequest {
        RegisterMeterRequest {
            serial_number: self.serial_number,
            customer_id: self.customer_id,
            connection_type: self.connection_type,
            card_number: self.card_number,
            installation_address: self.installation_address,
            installation_date: self.installation_date.unwrap_or(today),
            max_power_kw: self.max_power_kw,
            initial_reading: self.initial_reading,
            notes: self.notes,
        }
    }
}

/// Edits the meter's descriptive fields; readings and status have their own routes
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMeterDto {
    #[validate(length(min = 1, max = 64))]
    pub serial_number: Option<String>,
    pub connection_type: Option<ConnectionType>,
    #[validate(length(max = 64))]
    pub card_number: Option<String>,
    #[validate(length(min = 1))]
    pub installation_address: Option<String>,
    pub installation_date: Option<NaiveDate>,
    #[validate(custom(function = "non_negative"))]
    pub max_power_kw: Option<Decimal>,
    pub notes: Option<String>,
}

impl From<UpdateMeterDto> for UpdateMeterRequest {
    fn from(dto: UpdateMeterDto) -> Self {
        UpdateMeterRequest {
            serial_number: dto.serial_number,
            connection_type: dto.connection_type,
            card_number: dto.card_number,
            installation_address: dto.installation_address,
            installation_date: dto.installation_date,
            max_power_kw: dto.max_power_kw,
            notes: dto.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeMeterStatusDto {
    pub status: MeterStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReassignMeterDto {
    pub customer_id: Option<CustomerId>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordReadingDto {
    #[validate(custom(function = "non_negative"))]
    pub value: Decimal,
    #[validate(length(max = 100))]
    pub operator: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl From<RecordReadingDto> for RecordReadingRequest {
    fn from(dto: RecordReadingDto) -> Self {
        RecordReadingRequest {
            value: dto.value,
            operator: dto.operator,
            recorded_at: dto.recorded_at,
            notes: dto.notes,
        }
    }
}

// ============================================================================
// Invoices & payments
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct ManualInvoiceDto {
    pub customer_id: CustomerId,
    pub meter_id: Option<MeterId>,
    #[validate(custom(function = "non_negative"))]
    pub previous_reading: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub current_reading: Decimal,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 32))]
    pub period: Option<String>,
    pub status: Option<InvoiceStatus>,
}

impl From<ManualInvoiceDto> for ManualInvoiceRequest {
    fn from(dto: ManualInvoiceDto) -> Self {
        ManualInvoiceRequest {
            customer_id: dto.customer_id,
            meter_id: dto.meter_id,
            previous_reading: dto.previous_reading,
            current_reading: dto.current_reading,
            issue_date: dto.issue_date,
            due_date: dto.due_date,
            period: dto.period,
            status: dto.status,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentDto {
    #[validate(custom(function = "positive"))]
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[validate(length(max = 64))]
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<RecordPaymentDto> for RecordPaymentRequest {
    fn from(dto: RecordPaymentDto) -> Self {
        RecordPaymentRequest {
            amount: dto.amount,
            method: dto.method,
            reference: dto.reference,
            notes: dto.notes,
            paid_at: dto.paid_at,
        }
    }
}

/// `GET /invoices` filters
#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListParams {
    pub customer_id: Option<CustomerId>,
    pub meter_id: Option<MeterId>,
    pub status: Option<InvoiceStatus>,
    pub due_before: Option<NaiveDate>,
}

impl From<InvoiceListParams> for InvoiceQuery {
    fn from(params: InvoiceListParams) -> Self {
        InvoiceQuery {
            customer_id: params.customer_id,
            meter_id: params.meter_id,
            statuses: params.status.into_iter().collect(),
            due_before: params.due_before,
        }
    }
}

/// Optional business date for the sweep and debt report; defaults to today
#[derive(Debug, Default, Deserialize)]
pub struct AsOfParams {
    pub today: Option<NaiveDate>,
}
