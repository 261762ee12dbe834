//! Test Data Builders
//!
//! Builders for the billing request types with sensible defaults, plus
//! [`TestBilling`], a billing service over the in-memory store and a
//! frozen clock.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use core_kernel::{CustomerId, FixedClock, TariffId};
use domain_billing::ports::mock::InMemoryBillingStore;
use domain_billing::{
    BillingConfig, BillingMode, BillingService, ConnectionType, CreateTariffRequest, Customer,
    Invoice, Meter, ReadingOutcome, RecordReadingRequest, RegisterCustomerRequest,
    RegisterMeterRequest, Tariff, TariffCategory,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::{TariffFixtures, TemporalFixtures};

/// Builder for tariff requests
pub struct TariffRequestBuilder {
    request: CreateTariffRequest,
}

impl Default for TariffRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TariffRequestBuilder {
    /// Domestic tariff at 50 Kz/kWh
    pub fn new() -> Self {
        Self {
            request: CreateTariffRequest {
                name: "Residencial".to_string(),
                category: TariffCategory::Domestic,
                unit_price: TariffFixtures::UNIT_PRICE,
                fixed_fee: TariffFixtures::FIXED_FEE,
                postpaid_surcharge: TariffFixtures::POSTPAID_SURCHARGE,
                prepaid_surcharge: TariffFixtures::PREPAID_SURCHARGE,
                description: None,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.request.name = name.into();
        self
    }

    pub fn with_category(mut self, category: TariffCategory) -> Self {
        self.request.category = category;
        self
    }

    pub fn with_unit_price(mut self, price: Decimal) -> Self {
        self.request.unit_price = price;
        self
    }

    pub fn with_fixed_fee(mut self, fee: Decimal) -> Self {
        self.request.fixed_fee = fee;
        self
    }

    pub fn build(self) -> CreateTariffRequest {
        self.request
    }
}

/// Builder for customer registrations
pub struct CustomerRequestBuilder {
    request: RegisterCustomerRequest,
}

impl CustomerRequestBuilder {
    /// Postpaid customer with the given fiscal id and no tariff
    pub fn new(fiscal_id: impl Into<String>) -> Self {
        let fiscal_id = fiscal_id.into();
        Self {
            request: RegisterCustomerRequest {
                name: format!("Cliente {fiscal_id}"),
                fiscal_id,
                national_id: None,
                address: Some("Luanda".to_string()),
                phone: None,
                email: None,
                billing_mode: BillingMode::Postpaid,
                tariff_id: None,
                notes: None,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.request.name = name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.request.email = Some(email.into());
        self
    }

    pub fn prepaid(mut self) -> Self {
        self.request.billing_mode = BillingMode::Prepaid;
        self
    }

    pub fn with_tariff(mut self, tariff_id: TariffId) -> Self {
        self.request.tariff_id = Some(tariff_id);
        self
    }

    pub fn build(self) -> RegisterCustomerRequest {
        self.request
    }
}

/// Builder for meter registrations
pub struct MeterRequestBuilder {
    request: RegisterMeterRequest,
}

impl MeterRequestBuilder {
    /// Unassigned single-phase meter at zero
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            request: RegisterMeterRequest {
                serial_number: serial_number.into(),
                customer_id: None,
                connection_type: ConnectionType::SinglePhase,
                card_number: None,
                installation_address: "Rua da Missão 12".to_string(),
                installation_date: TemporalFixtures::installation_date(),
                max_power_kw: dec!(6.6),
                initial_reading: Decimal::ZERO,
                notes: None,
            },
        }
    }

    pub fn for_customer(mut self, customer_id: CustomerId) -> Self {
        self.request.customer_id = Some(customer_id);
        self
    }

    pub fn with_card(mut self, card_number: impl Into<String>) -> Self {
        self.request.card_number = Some(card_number.into());
        self
    }

    pub fn with_initial_reading(mut self, reading: Decimal) -> Self {
        self.request.initial_reading = reading;
        self
    }

    pub fn three_phase(mut self) -> Self {
        self.request.connection_type = ConnectionType::ThreePhase;
        self
    }

    pub fn build(self) -> RegisterMeterRequest {
        self.request
    }
}

/// Reading request with just a value
pub fn reading(value: Decimal) -> RecordReadingRequest {
    RecordReadingRequest {
        value,
        operator: Some("op-1".to_string()),
        recorded_at: None,
        notes: None,
    }
}

/// Billing service over the in-memory store, with handles to both
pub struct TestBilling {
    pub service: BillingService,
    pub store: Arc<InMemoryBillingStore>,
    pub clock: Arc<FixedClock>,
}

impl TestBilling {
    /// Default configuration, clock frozen at [`TemporalFixtures::now`]
    pub fn new() -> Self {
        Self::with_config(BillingConfig::default())
    }

    pub fn with_config(config: BillingConfig) -> Self {
        let store = Arc::new(InMemoryBillingStore::new());
        let clock = TemporalFixtures::clock();
        let service = BillingService::new(store.clone(), clock.clone(), config)
            .expect("test billing configuration must be valid");
        Self { service, store, clock }
    }

    /// Consumes the harness, keeping the service
    pub fn into_service(self) -> BillingService {
        self.service
    }

    pub async fn tariff(&self) -> Tariff {
        self.service
            .create_tariff(TariffRequestBuilder::new().build())
            .await
            .expect("create tariff")
    }

    pub async fn customer(&self, request: RegisterCustomerRequest) -> Customer {
        self.service
            .register_customer(request)
            .await
            .expect("register customer")
    }

    pub async fn meter(&self, request: RegisterMeterRequest) -> Meter {
        self.service.register_meter(request).await.expect("register meter")
    }

    pub async fn read(&self, meter: &Meter, value: Decimal) -> ReadingOutcome {
        self.service
            .register_reading(meter.id, reading(value))
            .await
            .expect("record reading")
    }

    /// Postpaid customer on the default tariff, a meter at 100 and the
    /// invoice issued from a reading of 150
    pub async fn invoiced_scenario(&self) -> (Customer, Meter, Invoice) {
        let tariff = self.tariff().await;
        let customer = self
            .customer(CustomerRequestBuilder::new("5000000001").with_tariff(tariff.id).build())
            .await;
        let meter = self
            .meter(
                MeterRequestBuilder::new("SN-1001")
                    .for_customer(customer.id)
                    .with_initial_reading(dec!(100))
                    .build(),
            )
            .await;
        let invoice = self
            .read(&meter, dec!(150))
            .await
            .invoice
            .expect("postpaid reading issues an invoice");
        (customer, meter, invoice)
    }

    /// Moves an invoice's due date so it is `days_overdue` days late today
    pub async fn age_invoice(&self, invoice: &Invoice, days_overdue: i64) {
        let due: NaiveDate = TemporalFixtures::days_ago(days_overdue);
        self.store
            .set_invoice_dates(invoice.id, due - Duration::days(15), due)
            .await
            .expect("age invoice");
    }
}

impl Default for TestBilling {
    fn default() -> Self {
        Self::new()
    }
}
