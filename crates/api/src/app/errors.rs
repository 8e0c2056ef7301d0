use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::services::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        ),
        ServiceError::Duplicate(what) => {
            json_error(StatusCode::CONFLICT, "duplicate", format!("{what} already exists"))
        }
        ServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ServiceError::Conflict => json_error(
            StatusCode::CONFLICT,
            "conflict",
            "conflicting update, reload and retry",
        ),
        ServiceError::Cancelled => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "cancelled", "request cancelled")
        }
        ServiceError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "something went wrong",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> Response {
    (
        status,
        axum::Json(json!({
            "status": status.as_u16(),
            "message": message.into(),
            "errors": { "code": code },
        })),
    )
        .into_response()
}
