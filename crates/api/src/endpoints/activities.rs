//! Activity endpoints: listing, creation, joins and per-activity admin.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use enrollo_common::{AppError, AppResult};
use enrollo_core::{
    ActivityDetail, ActivitySummary, CreateActivityInput, EmailTemplateInput, FileUpload,
    JoinRequest, NewAttachment, NewSchedule, PendingRegistration,
};
use enrollo_db::entities::{activity, email_template, registration};
use serde::{Deserialize, Serialize};

use super::form;
use crate::{
    extractors::{AdminUser, AuthUser},
    middleware::AppState,
    response::{ApiResponse, ok},
};

// ==================== Request/Response Types ====================

#[derive(Deserialize)]
pub struct SendEmailsRequest {
    pub registration_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct SendEmailsResponse {
    pub sent: usize,
}

fn timestamp(name: &str, raw: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::BadRequest(format!("{name}: {e}")))
}

// ==================== Handlers ====================

async fn list(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<ActivitySummary>>> {
    let activities = state.activity_service.list_published().await?;
    Ok(ApiResponse::ok(activities))
}

async fn list_unpublished(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ActivitySummary>>> {
    let activities = state.activity_service.list_unpublished().await?;
    Ok(ApiResponse::ok(activities))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ActivityDetail>> {
    let detail = state.activity_service.get_detail(&id).await?;
    Ok(ApiResponse::ok(detail))
}

/// Create an activity from a multipart form.
///
/// Text fields: `title`, `description`, `description_short`,
/// `registration_open_at`, `registration_close_at` (RFC 3339) and
/// `schedules` (JSON array). Files: `thumbnail` and any number of
/// `attachments`.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<activity::Model>> {
    let mut title = None;
    let mut description = None;
    let mut description_short = None;
    let mut open_at = None;
    let mut close_at = None;
    let mut schedules: Option<Vec<NewSchedule>> = None;
    let mut thumbnail: Option<FileUpload> = None;
    let mut attachments = Vec::new();

    while let Some(field) = form::next_field(&mut multipart).await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "title" => title = Some(form::text(field).await?),
            "description" => description = Some(form::text(field).await?),
            "description_short" => description_short = Some(form::text(field).await?),
            "registration_open_at" => {
                open_at = Some(timestamp(&name, &form::text(field).await?)?);
            }
            "registration_close_at" => {
                close_at = Some(timestamp(&name, &form::text(field).await?)?);
            }
            "schedules" => schedules = Some(form::json(field).await?),
            "thumbnail" => thumbnail = Some(form::file(field).await?),
            "attachments" => {
                let upload = form::file(field).await?;
                attachments.push(NewAttachment {
                    display_name: Some(upload.filename.clone()),
                    upload,
                });
            }
            _ => {}
        }
    }

    let input = CreateActivityInput {
        title: title.ok_or_else(|| form::missing("title"))?,
        description: description.ok_or_else(|| form::missing("description"))?,
        description_short: description_short
            .ok_or_else(|| form::missing("description_short"))?,
        registration_open_at: open_at.ok_or_else(|| form::missing("registration_open_at"))?,
        registration_close_at: close_at.ok_or_else(|| form::missing("registration_close_at"))?,
        schedules: schedules.ok_or_else(|| form::missing("schedules"))?,
    };
    let thumbnail = thumbnail.ok_or_else(|| form::missing("thumbnail"))?;

    let created = state
        .activity_service
        .create_activity(&user.id, input, thumbnail, attachments)
        .await?;
    Ok(ApiResponse::created(created))
}

/// Register a student for schedules of an activity.
///
/// Fields: `student_information_id`, `schedule_ids` (JSON array) and an
/// optional `payment_proof` file.
async fn join(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(activity_id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<Vec<registration::Model>>> {
    let mut student_information_id = None;
    let mut schedule_ids: Option<Vec<String>> = None;
    let mut payment_proof = None;

    while let Some(field) = form::next_field(&mut multipart).await? {
        match field.name().unwrap_or("") {
            "student_information_id" => student_information_id = Some(form::text(field).await?),
            "schedule_ids" => schedule_ids = Some(form::json(field).await?),
            "payment_proof" => {
                let upload = form::file(field).await?;
                if !upload.data.is_empty() {
                    payment_proof = Some(upload);
                }
            }
            _ => {}
        }
    }

    let request = JoinRequest::new(
        user.id,
        activity_id,
        schedule_ids.ok_or_else(|| form::missing("schedule_ids"))?,
        student_information_id.ok_or_else(|| form::missing("student_information_id"))?,
    )?;

    let registrations = state
        .registration_service
        .join_activity(request, payment_proof)
        .await?;
    Ok(ApiResponse::created(registrations))
}

async fn approve(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.activity_service.approve_activity(&id).await?;
    Ok(ok())
}

async fn pending_registrations(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<PendingRegistration>>> {
    let pending = state.approval_service.list_pending(&id).await?;
    Ok(ApiResponse::ok(pending))
}

async fn get_email_template(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<email_template::Model>> {
    let template = state.registrant_email_service.get_template(&id).await?;
    Ok(ApiResponse::ok(template))
}

async fn put_email_template(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<EmailTemplateInput>,
) -> AppResult<ApiResponse<email_template::Model>> {
    let template = state
        .registrant_email_service
        .upsert_template(&id, input)
        .await?;
    Ok(ApiResponse::ok(template))
}

async fn send_emails(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendEmailsRequest>,
) -> AppResult<ApiResponse<SendEmailsResponse>> {
    let sent = state
        .registrant_email_service
        .send_emails(&id, &req.registration_ids)
        .await?;
    Ok(ApiResponse::ok(SendEmailsResponse { sent }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/unpublished", get(list_unpublished))
        .route("/{id}", get(show))
        .route("/{id}/join", post(join))
        .route("/{id}/approve", post(approve))
        .route("/{id}/registrations/pending", get(pending_registrations))
        .route(
            "/{id}/email-template",
            get(get_email_template).put(put_email_template),
        )
        .route("/{id}/emails", post(send_emails))
}
