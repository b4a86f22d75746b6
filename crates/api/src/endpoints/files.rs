//! Signed download endpoint for locally stored objects.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use enrollo_common::{AppResult, file_extension};
use serde::Deserialize;

use crate::middleware::AppState;

#[derive(Deserialize)]
pub struct SignedParams {
    pub expires: i64,
    pub signature: String,
}

fn content_type(key: &str) -> &'static str {
    match file_extension(key).as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

async fn download(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<SignedParams>,
) -> AppResult<impl IntoResponse> {
    let bytes = state
        .file_service
        .read_signed(&bucket, &key, params.expires, &params.signature)
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&key)),
            (header::CACHE_CONTROL, "private, max-age=300"),
        ],
        bytes,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{bucket}/{*key}", get(download))
}
