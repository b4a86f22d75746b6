//! API endpoints.

mod activities;
mod admin;
mod auth;
mod files;
mod form;
mod student_information;
mod wallet;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router, mounted under `/api` by the server.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/student-information", student_information::router())
        .nest("/activities", activities::router())
        .nest("/admin", admin::router())
        .merge(wallet::router())
}

/// Create the signed file download router, mounted under `/files`.
pub fn files_router() -> Router<AppState> {
    files::router()
}
