//! Balance ledger and topup endpoints.

use axum::{
    Router,
    extract::{Multipart, Query, State},
    routing::{get, post},
};
use enrollo_common::AppResult;
use enrollo_core::TopupReceipt;
use enrollo_db::entities::transaction;
use serde::Deserialize;

use super::form;
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Deserialize)]
pub struct HistoryParams {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// The caller's ledger, newest first.
async fn transactions(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> AppResult<ApiResponse<Vec<transaction::Model>>> {
    let entries = state
        .ledger_service
        .list_transactions(&user.id, params.limit, params.offset)
        .await?;
    Ok(ApiResponse::ok(entries))
}

/// Top up the caller's balance from a bank slip image (field `qrcode`).
async fn payment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<TopupReceipt>> {
    let mut slip = None;
    while let Some(field) = form::next_field(&mut multipart).await? {
        if field.name() == Some("qrcode") {
            slip = Some(form::file(field).await?);
        }
    }
    let slip = slip.ok_or_else(|| form::missing("qrcode"))?;

    let receipt = state
        .topup_service
        .create_topup_payment(&user.id, slip)
        .await?;
    Ok(ApiResponse::created(receipt))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(transactions))
        .route("/payment", post(payment))
}
