//! Meter and reading handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::MeterId;
use domain_billing::{Meter, MeterHistory, ReadingOutcome};

use crate::dto::{
    ChangeMeterStatusDto, CreateMeterDto, ReassignMeterDto, RecordReadingDto, UpdateMeterDto,
};
use crate::{error::ApiError, AppState};

/// Registers a meter
pub async fn create_meter(
    State(state): State<AppState>,
    Json(request): Json<CreateMeterDto>,
) -> Result<(StatusCode, Json<Meter>), ApiError> {
    request.validate()?;
    let today = state.service.today();
    let meter = state.service.register_meter(request.into_request(today)).await?;
    Ok((StatusCode::CREATED, Json(meter)))
}

/// Lists meters
pub async fn list_meters(State(state): State<AppState>) -> Result<Json<Vec<Meter>>, ApiError> {
    Ok(Json(state.service.list_meters().await?))
}

/// Gets a meter by ID
pub async fn get_meter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meter>, ApiError> {
    Ok(Json(state.service.get_meter(MeterId::from(id)).await?))
}

/// Edits the meter's descriptive fields
pub async fn update_meter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateMeterDto>,
) -> Result<Json<Meter>, ApiError> {
    request.validate()?;
    let meter = state
        .service
        .update_meter(MeterId::from(id), request.into())
        .await?;
    Ok(Json(meter))
}

/// Flips a meter between active and inactive
pub async fn toggle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meter>, ApiError> {
    Ok(Json(state.service.toggle_meter_status(MeterId::from(id)).await?))
}

/// Sets the meter status
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChangeMeterStatusDto>,
) -> Result<Json<Meter>, ApiError> {
    let meter = state
        .service
        .change_meter_status(MeterId::from(id), request.status)
        .await?;
    Ok(Json(meter))
}

/// Marks a meter faulty
pub async fn mark_faulty(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meter>, ApiError> {
    Ok(Json(state.service.mark_meter_faulty(MeterId::from(id)).await?))
}

/// Moves a meter to another customer, or unassigns it
pub async fn reassign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReassignMeterDto>,
) -> Result<Json<Meter>, ApiError> {
    let meter = state
        .service
        .reassign_meter(MeterId::from(id), request.customer_id)
        .await?;
    Ok(Json(meter))
}

/// Suspends a meter
pub async fn suspend(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meter>, ApiError> {
    Ok(Json(state.service.suspend_meter(MeterId::from(id)).await?))
}

/// Reactivates a suspended meter
pub async fn reactivate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Meter>, ApiError> {
    Ok(Json(state.service.reactivate_meter(MeterId::from(id)).await?))
}

/// Readings and invoices of a meter
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MeterHistory>, ApiError> {
    Ok(Json(state.service.meter_history(MeterId::from(id)).await?))
}

/// Records a reading, issuing an invoice for postpaid consumption
pub async fn record_reading(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RecordReadingDto>,
) -> Result<(StatusCode, Json<ReadingOutcome>), ApiError> {
    request.validate()?;
    let outcome = state
        .service
        .register_reading(MeterId::from(id), request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
