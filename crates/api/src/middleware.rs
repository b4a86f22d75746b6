//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use axum_extra::extract::CookieJar;
use enrollo_core::{
    ActivityService, ApprovalService, AuthService, FileService, LedgerService,
    RegistrantEmailService, RegistrationService, StudentInformationService, TopupService,
};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session_id";

/// Name of the cookie carrying the OAuth `state` value.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Settings the HTTP layer needs besides the services.
#[derive(Clone, Debug)]
pub struct WebSettings {
    /// Where the browser lands after login.
    pub frontend_url: String,
    /// Whether cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
}

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub student_information_service: StudentInformationService,
    pub activity_service: ActivityService,
    pub registration_service: RegistrationService,
    pub approval_service: ApprovalService,
    pub ledger_service: LedgerService,
    pub topup_service: TopupService,
    pub file_service: FileService,
    pub registrant_email_service: RegistrantEmailService,
    pub settings: WebSettings,
}

/// Session middleware.
///
/// Resolves the `session_id` cookie to a user and stores it in the request
/// extensions. Unknown or expired sessions leave the request anonymous.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.auth_service.resolve_session(cookie.value()).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(user);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to resolve session"),
        }
    }

    next.run(req).await
}
