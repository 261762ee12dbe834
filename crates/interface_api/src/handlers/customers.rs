//! Customer handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::CustomerId;
use domain_billing::Customer;

use crate::dto::{AssignTariffDto, CreateCustomerDto, UpdateCustomerDto};
use crate::{error::ApiError, AppState};

/// Registers a customer
pub async fn create_customer(
    State(state): State<AppState>,
    Json(request): Json<CreateCustomerDto>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    request.validate()?;
    let customer = state.service.register_customer(request.into()).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Lists customers
pub async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(state.service.list_customers().await?))
}

/// Gets a customer by ID
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.service.get_customer(CustomerId::from(id)).await?))
}

/// Edits a customer; a billing mode change carries over to the owned meter
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCustomerDto>,
) -> Result<Json<Customer>, ApiError> {
    request.validate()?;
    let customer = state
        .service
        .update_customer(CustomerId::from(id), request.into())
        .await?;
    Ok(Json(customer))
}

/// Flips a customer between active and inactive
pub async fn toggle_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.service.toggle_customer_status(CustomerId::from(id)).await?))
}

/// Assigns or clears the customer's tariff
pub async fn assign_tariff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignTariffDto>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state
        .service
        .assign_tariff(CustomerId::from(id), request.tariff_id)
        .await?;
    Ok(Json(customer))
}
