//! Admin endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use enrollo_common::AppResult;
use enrollo_db::entities::registration::{self, PaymentStatus};
use serde::Deserialize;

use crate::{extractors::AdminUser, middleware::AppState, response::ApiResponse};

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: PaymentStatus,
}

/// Approve or reject a registration's payment.
async fn update_registration_status(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> AppResult<ApiResponse<registration::Model>> {
    let updated = state
        .approval_service
        .update_registration_status(&id, req.status)
        .await?;

    tracing::info!(admin_id = %admin.id, registration_id = %id, status = ?req.status, "Registration reviewed");
    Ok(ApiResponse::ok(updated))
}

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/registrations/{id}/status",
        post(update_registration_status),
    )
}
