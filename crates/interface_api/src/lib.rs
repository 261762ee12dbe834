//! HTTP API Layer
//!
//! REST API for the electricity billing engine using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one module per resource, each a thin call into `BillingService`
//! - **DTOs**: request bodies checked with `validator`
//! - **Middleware**: request ids, tracing, audit logging, CORS
//! - **Error Handling**: domain errors mapped to consistent JSON responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(service));
//! axum::serve(listener, app).await?;
//! ```

pub mod bootstrap;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_billing::BillingService;

use crate::handlers::{customers, health, invoices, meters, reports, tariffs};
use crate::middleware::audit_middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BillingService>,
}

impl AppState {
    pub fn new(service: BillingService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Creates the main API router
///
/// Health endpoints sit at the root; everything else is under `/api/v1`
/// and passes through the audit middleware.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let customer_routes = Router::new()
        .route("/", post(customers::create_customer).get(customers::list_customers))
        .route("/:id", get(customers::get_customer).patch(customers::update_customer))
        .route("/:id/toggle-status", post(customers::toggle_status))
        .route("/:id/tariff", put(customers::assign_tariff));

    let tariff_routes = Router::new()
        .route("/", post(tariffs::create_tariff).get(tariffs::list_tariffs))
        .route("/:id", get(tariffs::get_tariff).patch(tariffs::update_tariff));

    let meter_routes = Router::new()
        .route("/", post(meters::create_meter).get(meters::list_meters))
        .route("/:id", get(meters::get_meter).patch(meters::update_meter))
        .route("/:id/toggle-status", post(meters::toggle_status))
        .route("/:id/status", put(meters::change_status))
        .route("/:id/faulty", post(meters::mark_faulty))
        .route("/:id/customer", put(meters::reassign))
        .route("/:id/suspend", post(meters::suspend))
        .route("/:id/reactivate", post(meters::reactivate))
        .route("/:id/history", get(meters::history))
        .route("/:id/readings", post(meters::record_reading));

    let invoice_routes = Router::new()
        .route("/", post(invoices::create_invoice).get(invoices::list_invoices))
        .route("/generate", post(invoices::generate_pending))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/settle", post(invoices::settle))
        .route("/:id/balance", get(invoices::balance))
        .route("/:id/payments", post(invoices::record_payment));

    let report_routes = Router::new()
        .route("/debt", get(reports::debt_report))
        .route("/statistics", get(reports::statistics));

    let api_routes = Router::new()
        .nest("/customers", customer_routes)
        .nest("/tariffs", tariff_routes)
        .nest("/meters", meter_routes)
        .nest("/invoices", invoice_routes)
        .nest("/reports", report_routes)
        .route("/sweeps", post(reports::run_sweep))
        .layer(axum_middleware::from_fn(audit_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
