use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use supplydesk_auth::AuthzError;
use supplydesk_core::DomainError;
use supplydesk_infra::ServiceError;
use supplydesk_infra::store::StoreError;

pub type ApiResult<T> = Result<T, ApiError>;

/// A failed request, already rendered as a JSON error response.
#[derive(Debug)]
pub struct ApiError(Response);

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self(json_error(status, code, message))
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", err.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let message = err.to_string();
        match err {
            DomainError::Validation(_) => Self::bad_request("validation_error", message),
            DomainError::InvalidId(_) => Self::bad_request("invalid_id", message),
            DomainError::InvariantViolation(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
            }
            DomainError::BorrowingBlocked { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "borrowing_blocked", message)
            }
            DomainError::NotFound => Self::not_found(message),
            DomainError::Conflict(_) => Self::new(StatusCode::CONFLICT, "conflict", message),
            DomainError::Unauthorized => Self::new(StatusCode::FORBIDDEN, "unauthorized", message),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => e.into(),
            ServiceError::Forbidden(msg) => Self::new(StatusCode::FORBIDDEN, "forbidden", msg),
            ServiceError::NotFound(what) => Self::not_found(format!("{what} not found")),
            ServiceError::Store(StoreError::Conflict(msg)) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            ServiceError::Store(StoreError::NotFound(msg)) => Self::not_found(msg),
            ServiceError::Store(e @ StoreError::Backend(_)) => {
                error!(error = %e, "storage failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
            }
            ServiceError::Media(e) => {
                error!(error = %e, "media failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "media_error", e.to_string())
            }
            ServiceError::Report(e) => {
                error!(error = %e, "report failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "report_error", e.to_string())
            }
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
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path id, answering 400 `invalid_id` on failure.
pub fn parse_id<T>(raw: &str) -> ApiResult<T>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse().map_err(ApiError::from)
}
