//! Student information endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use enrollo_common::AppResult;
use enrollo_core::{CreateStudentInformationInput, UpdateStudentInformationInput};
use enrollo_db::entities::student_information;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, ok},
};

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateStudentInformationInput>,
) -> AppResult<ApiResponse<student_information::Model>> {
    let created = state
        .student_information_service
        .create(&user.id, input)
        .await?;
    Ok(ApiResponse::created(created))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<student_information::Model>>> {
    let profiles = state.student_information_service.list(&user.id).await?;
    Ok(ApiResponse::ok(profiles))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<student_information::Model>> {
    let profile = state.student_information_service.get(&user.id, &id).await?;
    Ok(ApiResponse::ok(profile))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateStudentInformationInput>,
) -> AppResult<ApiResponse<student_information::Model>> {
    let updated = state
        .student_information_service
        .update(&user.id, &id, input)
        .await?;
    Ok(ApiResponse::ok(updated))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state
        .student_information_service
        .delete(&user.id, &id)
        .await?;
    Ok(ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).patch(update).delete(delete))
}
