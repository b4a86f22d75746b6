//! Multipart form helpers.

use axum::extract::multipart::{Field, Multipart};
use enrollo_common::{AppError, AppResult};
use enrollo_core::FileUpload;
use serde::de::DeserializeOwned;

/// Next field of a multipart body.
pub async fn next_field(multipart: &mut Multipart) -> AppResult<Option<Field<'_>>> {
    multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart data: {e}")))
}

/// Read a field as an uploaded file.
pub async fn file(field: Field<'_>) -> AppResult<FileUpload> {
    let filename = field.file_name().unwrap_or("unnamed").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .to_vec();

    Ok(FileUpload {
        filename,
        content_type,
        data,
    })
}

/// Read a field as text.
pub async fn text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Read a field as a JSON document.
pub async fn json<T: DeserializeOwned>(field: Field<'_>) -> AppResult<T> {
    let name = field.name().unwrap_or_default().to_string();
    let raw = text(field).await?;
    serde_json::from_str(&raw).map_err(|e| AppError::BadRequest(format!("{name}: {e}")))
}

/// A required field that was not sent.
pub fn missing(name: &str) -> AppError {
    AppError::BadRequest(format!("Missing field: {name}"))
}
