//! Authentication endpoints.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use enrollo_common::{AppError, AppResult};
use enrollo_db::entities::user::{self, UserRole};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::{AppState, OAUTH_STATE_COOKIE, SESSION_COOKIE},
    response::{ApiResponse, ok},
};

/// Current account.
#[derive(Serialize)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub profile_image_url: Option<String>,
    /// Minor units.
    pub balance: i64,
    pub role: UserRole,
}

impl From<user::Model> for MeResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            display_name: u.display_name,
            profile_image_url: u.profile_image_url,
            balance: u.balance,
            role: u.role,
        }
    }
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn cookie(state: &AppState, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(state.settings.cookie_secure)
        .same_site(SameSite::Lax)
        .build()
}

fn expired(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// Start the Google login.
async fn google(State(state): State<AppState>, jar: CookieJar) -> AppResult<impl IntoResponse> {
    let oauth_state = state.auth_service.new_state();
    let url = state.auth_service.authorization_url(&oauth_state)?;

    let jar = jar.add(cookie(&state, OAUTH_STATE_COOKIE, oauth_state));
    Ok((jar, Redirect::to(&url)))
}

/// Finish the Google login and open a session.
async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> AppResult<impl IntoResponse> {
    if let Some(error) = params.error {
        return Err(AppError::BadRequest(format!("Login was not completed: {error}")));
    }

    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    match (expected, params.state) {
        (Some(expected), Some(received)) if expected == received => {}
        _ => return Err(AppError::BadRequest("Invalid OAuth state".to_string())),
    }
    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let session = state.auth_service.login(&code).await?;

    let jar = jar
        .remove(expired(OAUTH_STATE_COOKIE))
        .add(cookie(&state, SESSION_COOKIE, session.id));
    Ok((jar, Redirect::to(&state.settings.frontend_url)))
}

/// The signed-in account.
async fn me(AuthUser(user): AuthUser) -> AppResult<ApiResponse<MeResponse>> {
    Ok(ApiResponse::ok(user.into()))
}

/// End the current session.
async fn logout(State(state): State<AppState>, jar: CookieJar) -> AppResult<impl IntoResponse> {
    if let Some(session) = jar.get(SESSION_COOKIE) {
        state.auth_service.logout(session.value()).await?;
    }
    Ok((jar.remove(expired(SESSION_COOKIE)), ok()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/google", get(google))
        .route("/google/callback", get(google_callback))
        .route("/me", get(me))
        .route("/logout", post(logout))
}
