//! Invoice and payment handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::InvoiceId;
use domain_billing::{BulkIssueSummary, Invoice, InvoiceBalance, Payment};

use crate::dto::{InvoiceListParams, ManualInvoiceDto, RecordPaymentDto};
use crate::{error::ApiError, AppState};

/// Issues a manually entered invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<ManualInvoiceDto>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    request.validate()?;
    let invoice = state.service.issue_invoice_manual(request.into()).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Lists invoices matching the query filters
pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    Ok(Json(state.service.list_invoices(params.into()).await?))
}

/// Gets an invoice by ID
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.service.get_invoice(InvoiceId::from(id)).await?))
}

/// Invoices every uninvoiced reading
pub async fn generate_pending(
    State(state): State<AppState>,
) -> Result<Json<BulkIssueSummary>, ApiError> {
    Ok(Json(state.service.generate_pending_invoices().await?))
}

/// Marks an invoice paid
pub async fn settle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.service.settle_invoice(InvoiceId::from(id)).await?))
}

/// Paid and outstanding amounts of an invoice
pub async fn balance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceBalance>, ApiError> {
    Ok(Json(state.service.invoice_balance(InvoiceId::from(id)).await?))
}

/// Records a payment against an invoice
pub async fn record_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RecordPaymentDto>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    request.validate()?;
    let payment = state
        .service
        .record_payment(InvoiceId::from(id), request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}
