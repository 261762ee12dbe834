//! Tariff handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::TariffId;
use domain_billing::Tariff;

use crate::dto::{CreateTariffDto, UpdateTariffDto};
use crate::{error::ApiError, AppState};

/// Creates a tariff
pub async fn create_tariff(
    State(state): State<AppState>,
    Json(request): Json<CreateTariffDto>,
) -> Result<(StatusCode, Json<Tariff>), ApiError> {
    request.validate()?;
    let tariff = state.service.create_tariff(request.into()).await?;
    Ok((StatusCode::CREATED, Json(tariff)))
}

/// Lists tariffs
pub async fn list_tariffs(State(state): State<AppState>) -> Result<Json<Vec<Tariff>>, ApiError> {
    Ok(Json(state.service.list_tariffs().await?))
}

/// Gets a tariff by ID
pub async fn get_tariff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tariff>, ApiError> {
    Ok(Json(state.service.get_tariff(TariffId::from(id)).await?))
}

/// Edits a tariff; invoices already issued keep their amounts
pub async fn update_tariff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTariffDto>,
) -> Result<Json<Tariff>, ApiError> {
    request.validate()?;
    let tariff = state
        .service
        .update_tariff(TariffId::from(id), request.into())
        .await?;
    Ok(Json(tariff))
}
