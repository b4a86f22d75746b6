//! Error translation for third-party HTTP APIs.

use enrollo_common::AppError;
use reqwest::StatusCode;

/// Translate a transport failure. Timeouts and connection failures are
/// retryable by the caller; anything else is an upstream fault.
pub fn transport_error(service: &str, err: &reqwest::Error) -> AppError {
    if err.is_timeout() || err.is_connect() {
        AppError::ServiceUnavailable(format!("{service} unreachable: {err}"))
    } else {
        AppError::ExternalService(format!("{service} request failed: {err}"))
    }
}

/// Translate a non-success status into the application taxonomy.
///
/// 400/401/403/404 keep their meaning; every other status is an upstream
/// fault (5xx and 429 are retryable).
pub fn status_error(service: &str, status: StatusCode, body: &str) -> AppError {
    let message = format!("{service}: {body}");
    match status {
        StatusCode::BAD_REQUEST => AppError::BadRequest(message),
        StatusCode::UNAUTHORIZED => {
            tracing::warn!(service, body, "Upstream rejected credentials");
            AppError::Unauthorized
        }
        StatusCode::FORBIDDEN => AppError::Forbidden(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            AppError::ServiceUnavailable(format!("{service} returned {s}: {body}"))
        }
        s => AppError::ExternalService(format!("{service} returned {s}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping_keeps_client_categories() {
        assert!(matches!(
            status_error("EasySlip", StatusCode::BAD_REQUEST, "{}"),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            status_error("EasySlip", StatusCode::UNAUTHORIZED, "{}"),
            AppError::Unauthorized
        ));
        assert!(matches!(
            status_error("EasySlip", StatusCode::FORBIDDEN, "{}"),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            status_error("EasySlip", StatusCode::NOT_FOUND, "{}"),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_status_mapping_server_errors_retryable() {
        let err = status_error("EasySlip", StatusCode::BAD_GATEWAY, "");
        assert!(err.is_retryable());
        let err = status_error("EasySlip", StatusCode::CONFLICT, "");
        assert!(matches!(err, AppError::ExternalService(_)));
    }
}
