//! Health check handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use core_kernel::{AdapterHealth, HealthCheckResult, HealthCheckable};

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Liveness endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check (includes the billing store)
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<HealthCheckResult>) {
    let result = state.service.store().health_check().await;
    let status = match result.status {
        AdapterHealth::Healthy => StatusCode::OK,
        _ => {
            tracing::warn!(
                adapter = %result.adapter_id,
                message = ?result.message,
                "Billing store is not ready"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, Json(result))
}
