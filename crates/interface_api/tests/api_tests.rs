//! HTTP API tests over the in-memory billing store

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use rust_decimal_macros::dec;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use domain_billing::{
    BillingStatistics, Customer, Invoice, InvoiceBalance, InvoiceStatus, Meter, MeterStatus,
    Payment, ReadingOutcome, SweepSummary, Tariff,
};
use interface_api::{create_router, AppState};
use test_utils::{
    assert_amount, assert_invoice_balanced, assert_meter_suspended, fake_customer_request,
    TemporalFixtures, TestBilling,
};

// ============================================================================
// Harness
// ============================================================================

fn app() -> Router {
    app_with(TestBilling::new())
}

fn app_with(billing: TestBilling) -> Router {
    create_router(AppState::new(billing.into_service()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_ok<T: DeserializeOwned>(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    expected: StatusCode,
) -> T {
    let (status, bytes) = send(app, method, uri, body).await;
    assert_eq!(
        status,
        expected,
        "unexpected status for {uri}: {}",
        String::from_utf8_lossy(&bytes)
    );
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_tariff(app: &Router) -> Tariff {
    send_ok(
        app,
        Method::POST,
        "/api/v1/tariffs",
        Some(json!({
            "name": "Residencial",
            "category": "DOMESTIC",
            "unit_price": "50",
            "fixed_fee": "200",
            "postpaid_surcharge": "10",
            "prepaid_surcharge": "5"
        })),
        StatusCode::CREATED,
    )
    .await
}

async fn create_customer(app: &Router, fiscal_id: &str, tariff: &Tariff) -> Customer {
    send_ok(
        app,
        Method::POST,
        "/api/v1/customers",
        Some(json!({
            "name": "Maria Domingos",
            "fiscal_id": fiscal_id,
            "email": "maria@example.ao",
            "billing_mode": "POSTPAID",
            "tariff_id": Uuid::from(tariff.id)
        })),
        StatusCode::CREATED,
    )
    .await
}

async fn create_meter(app: &Router, serial: &str, customer: &Customer) -> Meter {
    send_ok(
        app,
        Method::POST,
        "/api/v1/meters",
        Some(json!({
            "serial_number": serial,
            "customer_id": Uuid::from(customer.id),
            "connection_type": "SINGLE_PHASE",
            "installation_address": "Rua da Missão 12",
            "max_power_kw": "6.6",
            "initial_reading": "100"
        })),
        StatusCode::CREATED,
    )
    .await
}

/// Tariff, postpaid customer and meter at 100, then a reading of 150
async fn invoiced(app: &Router) -> (Meter, Invoice) {
    let tariff = create_tariff(app).await;
    let customer = create_customer(app, "5000000001", &tariff).await;
    let meter = create_meter(app, "SN-1001", &customer).await;
    let outcome: ReadingOutcome = send_ok(
        app,
        Method::POST,
        &format!("/api/v1/meters/{}/readings", Uuid::from(meter.id)),
        Some(json!({ "value": "150", "operator": "op-1" })),
        StatusCode::CREATED,
    )
    .await;
    (meter, outcome.invoice.expect("postpaid reading issues an invoice"))
}

// ============================================================================
// Health
// ============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reports_store() {
        let (status, body) = send(&app(), Method::GET, "/health/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["adapter_id"], "in-memory-billing-store");
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_request_id_is_returned() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}

// ============================================================================
// Customers, tariffs and meters
// ============================================================================

mod registration_tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_fetch_customer() {
        let app = app();
        let tariff = create_tariff(&app).await;
        let customer = create_customer(&app, "5000000001", &tariff).await;
        assert_eq!(customer.tariff_id, Some(tariff.id));

        let fetched: Customer = send_ok(
            &app,
            Method::GET,
            &format!("/api/v1/customers/{}", Uuid::from(customer.id)),
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(fetched.fiscal_id, "5000000001");
    }

    #[tokio::test]
    async fn test_fake_customer_is_accepted() {
        let app = app();
        let request = fake_customer_request(domain_billing::BillingMode::Prepaid);
        let created: Customer = send_ok(
            &app,
            Method::POST,
            "/api/v1/customers",
            Some(serde_json::to_value(&request).unwrap()),
            StatusCode::CREATED,
        )
        .await;
        assert_eq!(created.name, request.name);
    }

    #[tokio::test]
    async fn test_duplicate_fiscal_id_conflicts() {
        let app = app();
        let tariff = create_tariff(&app).await;
        create_customer(&app, "5000000001", &tariff).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/customers",
            Some(json!({
                "name": "Outro",
                "fiscal_id": "5000000001",
                "billing_mode": "POSTPAID"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn test_invalid_body_lists_fields() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/api/v1/tariffs",
            Some(json!({
                "name": "",
                "category": "DOMESTIC",
                "unit_price": "-1"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "validation_error");
        let details = body["details"].as_array().unwrap();
        assert!(details.iter().any(|d| d.as_str().unwrap().starts_with("name")));
        assert!(details.iter().any(|d| d.as_str().unwrap().starts_with("unit_price")));
    }

    #[tokio::test]
    async fn test_unknown_customer_is_404() {
        let (status, _) = send(
            &app(),
            Method::GET,
            &format!("/api/v1/customers/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_id_is_400() {
        let (status, _) = send(&app(), Method::GET, "/api/v1/meters/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_meter_installation_date_defaults_to_today() {
        let app = app();
        let tariff = create_tariff(&app).await;
        let customer = create_customer(&app, "5000000001", &tariff).await;
        let meter = create_meter(&app, "SN-1001", &customer).await;
        assert_eq!(meter.installation_date, TemporalFixtures::today());
        assert_eq!(meter.status, MeterStatus::Active);
    }

    #[tokio::test]
    async fn test_mark_faulty_and_change_status() {
        let app = app();
        let tariff = create_tariff(&app).await;
        let customer = create_customer(&app, "5000000001", &tariff).await;
        let meter = create_meter(&app, "SN-1001", &customer).await;
        let id = Uuid::from(meter.id);

        let faulty: Meter = send_ok(
            &app,
            Method::POST,
            &format!("/api/v1/meters/{id}/faulty"),
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(faulty.status, MeterStatus::Faulty);

        let maintained: Meter = send_ok(
            &app,
            Method::PUT,
            &format!("/api/v1/meters/{id}/status"),
            Some(json!({ "status": "MAINTENANCE" })),
            StatusCode::OK,
        )
        .await;
        assert_eq!(maintained.status, MeterStatus::Maintenance);
    }
}

// ============================================================================
// Edits
// ============================================================================

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_patch_customer_mode_follows_to_meter() {
        let app = app();
        let tariff = create_tariff(&app).await;
        let customer = create_customer(&app, "5000000001", &tariff).await;
        let meter = create_meter(&app, "SN-1001", &customer).await;
        let customer_uri = format!("/api/v1/customers/{}", Uuid::from(customer.id));
        let meter_uri = format!("/api/v1/meters/{}", Uuid::from(meter.id));

        let (status, _) = send(
            &app,
            Method::PATCH,
            &customer_uri,
            Some(json!({ "billing_mode": "PREPAID" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let carded: Meter = send_ok(
            &app,
            Method::PATCH,
            &meter_uri,
            Some(json!({ "card_number": "CARD-1001" })),
            StatusCode::OK,
        )
        .await;
        assert_eq!(carded.current_reading, dec!(100));

        let updated: Customer = send_ok(
            &app,
            Method::PATCH,
            &customer_uri,
            Some(json!({ "billing_mode": "PREPAID", "phone": "923000000" })),
            StatusCode::OK,
        )
        .await;
        assert_eq!(updated.name, "Maria Domingos");
        assert_eq!(updated.phone.as_deref(), Some("923000000"));

        let meter: Meter = send_ok(&app, Method::GET, &meter_uri, None, StatusCode::OK).await;
        assert_eq!(meter.billing_mode, domain_billing::BillingMode::Prepaid);
    }

    #[tokio::test]
    async fn test_patch_customer_checks_email() {
        let app = app();
        let tariff = create_tariff(&app).await;
        let customer = create_customer(&app, "5000000001", &tariff).await;

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/customers/{}", Uuid::from(customer.id)),
            Some(json!({ "email": "not-an-email" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_patch_tariff_prices_next_invoice() {
        let app = app();
        let tariff = create_tariff(&app).await;
        let uri = format!("/api/v1/tariffs/{}", Uuid::from(tariff.id));

        let updated: Tariff = send_ok(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "unit_price": "60" })),
            StatusCode::OK,
        )
        .await;
        assert_amount(&updated.unit_price, dec!(60));
        assert_amount(&updated.fixed_fee, dec!(200));

        let fetched: Tariff = send_ok(&app, Method::GET, &uri, None, StatusCode::OK).await;
        assert_amount(&fetched.unit_price, dec!(60));

        let customer = create_customer(&app, "5000000001", &tariff).await;
        let meter = create_meter(&app, "SN-1001", &customer).await;
        let outcome: ReadingOutcome = send_ok(
            &app,
            Method::POST,
            &format!("/api/v1/meters/{}/readings", Uuid::from(meter.id)),
            Some(json!({ "value": "150" })),
            StatusCode::CREATED,
        )
        .await;
        let invoice = outcome.invoice.unwrap();
        assert_amount(&invoice.consumption_value, dec!(3000));
        assert_invoice_balanced(&invoice);
    }
}

// ============================================================================
// Readings, invoices and payments
// ============================================================================

mod invoice_tests {
    use super::*;

    #[tokio::test]
    async fn test_reading_issues_invoice() {
        let app = app();
        let (_, invoice) = invoiced(&app).await;
        assert_amount(&invoice.total, dec!(2510));
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_invoice_balanced(&invoice);
    }

    #[tokio::test]
    async fn test_negative_reading_is_rejected() {
        let app = app();
        let (meter, _) = invoiced(&app).await;
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/meters/{}/readings", Uuid::from(meter.id)),
            Some(json!({ "value": "-5" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_list_invoices_by_status() {
        let app = app();
        let (_, invoice) = invoiced(&app).await;

        let pending: Vec<Invoice> = send_ok(
            &app,
            Method::GET,
            "/api/v1/invoices?status=PENDING",
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, invoice.id);

        let paid: Vec<Invoice> = send_ok(
            &app,
            Method::GET,
            "/api/v1/invoices?status=PAID",
            None,
            StatusCode::OK,
        )
        .await;
        assert!(paid.is_empty());
    }

    #[tokio::test]
    async fn test_payment_and_balance() {
        let app = app();
        let (_, invoice) = invoiced(&app).await;
        let id = Uuid::from(invoice.id);

        let payment: Payment = send_ok(
            &app,
            Method::POST,
            &format!("/api/v1/invoices/{id}/payments"),
            Some(json!({ "amount": "1500", "method": "MULTICAIXA", "reference": "MC-001" })),
            StatusCode::CREATED,
        )
        .await;
        assert_amount(&payment.amount, dec!(1500));

        let balance: InvoiceBalance = send_ok(
            &app,
            Method::GET,
            &format!("/api/v1/invoices/{id}/balance"),
            None,
            StatusCode::OK,
        )
        .await;
        assert_amount(&balance.remaining, dec!(1010));

        // Payments never move the status
        let fetched: Invoice = send_ok(
            &app,
            Method::GET,
            &format!("/api/v1/invoices/{id}"),
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(fetched.status, InvoiceStatus::Pending);
    }

    #[tokio::test]
    async fn test_zero_payment_is_rejected() {
        let app = app();
        let (_, invoice) = invoiced(&app).await;
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/v1/invoices/{}/payments", Uuid::from(invoice.id)),
            Some(json!({ "amount": "0", "method": "CASH" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_settle_twice_conflicts() {
        let app = app();
        let (_, invoice) = invoiced(&app).await;
        let uri = format!("/api/v1/invoices/{}/settle", Uuid::from(invoice.id));

        let settled: Invoice = send_ok(&app, Method::POST, &uri, None, StatusCode::OK).await;
        assert_eq!(settled.status, InvoiceStatus::Paid);
        assert!(settled.paid_at.is_some());

        let (status, _) = send(&app, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}

// ============================================================================
// Sweep and reports
// ============================================================================

mod sweep_tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_penalises_and_suspends() {
        let billing = TestBilling::new();
        let (_, meter, invoice) = billing.invoiced_scenario().await;
        billing.age_invoice(&invoice, 40).await;
        let app = app_with(billing);

        let summary: SweepSummary = send_ok(
            &app,
            Method::POST,
            "/api/v1/sweeps",
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(summary.today, TemporalFixtures::today());
        assert_eq!(summary.penalised, 1);
        assert_eq!(summary.suspended, 1);
        assert_eq!(summary.failed, 0);

        let meter: Meter = send_ok(
            &app,
            Method::GET,
            &format!("/api/v1/meters/{}", Uuid::from(meter.id)),
            None,
            StatusCode::OK,
        )
        .await;
        assert_meter_suspended(&meter);

        let invoice: Invoice = send_ok(
            &app,
            Method::GET,
            &format!("/api/v1/invoices/{}", Uuid::from(invoice.id)),
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(invoice.status, InvoiceStatus::Overdue);
        assert_amount(&invoice.total, dec!(2660));
        assert_invoice_balanced(&invoice);
    }

    #[tokio::test]
    async fn test_sweep_as_of_earlier_date_does_nothing() {
        let billing = TestBilling::new();
        let (_, _, invoice) = billing.invoiced_scenario().await;
        billing.age_invoice(&invoice, 40).await;
        let app = app_with(billing);

        let earlier = TemporalFixtures::days_ago(40);
        let summary: SweepSummary = send_ok(
            &app,
            Method::POST,
            &format!("/api/v1/sweeps?today={earlier}"),
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(summary.penalised, 0);
        assert_eq!(summary.suspended, 0);
    }

    #[tokio::test]
    async fn test_debt_report_and_statistics() {
        let billing = TestBilling::new();
        let (_, _, invoice) = billing.invoiced_scenario().await;
        billing.age_invoice(&invoice, 40).await;
        let app = app_with(billing);

        let report: Value = send_ok(
            &app,
            Method::GET,
            "/api/v1/reports/debt",
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(report["unpaid_invoices"], 1);
        assert_eq!(report["customers"][0]["max_days_overdue"], 40);

        let stats: BillingStatistics = send_ok(
            &app,
            Method::GET,
            "/api/v1/reports/statistics",
            None,
            StatusCode::OK,
        )
        .await;
        assert_eq!(stats.customers, 1);
        assert_eq!(stats.meters, 1);
        assert_eq!(stats.pending_invoices, 1);
    }
}
