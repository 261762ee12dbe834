//! Sweep and reporting handlers

use axum::{
    extract::{Query, State},
    Json,
};

use domain_billing::{BillingStatistics, DebtReport, SweepSummary};

use crate::dto::AsOfParams;
use crate::{error::ApiError, AppState};

/// Runs the suspension sweep on demand
pub async fn run_sweep(
    State(state): State<AppState>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<SweepSummary>, ApiError> {
    let today = params.today.unwrap_or_else(|| state.service.today());
    Ok(Json(state.service.run_suspension_sweep(today).await?))
}

pub async fn debt_report(
    State(state): State<AppState>,
    Query(params): Query<AsOfParams>,
) -> Result<Json<DebtReport>, ApiError> {
    let today = params.today.unwrap_or_else(|| state.service.today());
    Ok(Json(state.service.debt_report(today).await?))
}

pub async fn statistics(
    State(state): State<AppState>,
) -> Result<Json<BillingStatistics>, ApiError> {
    Ok(Json(state.service.billing_statistics().await?))
}
