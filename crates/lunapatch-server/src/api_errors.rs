//! HTTP error mapping for installer routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lunapatch_installer::ManagerError;
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::AlreadyRunning => Self::conflict(err.to_string()),
            ManagerError::Spawn(_) => Self::internal(err.to_string()),
            ManagerError::InvalidOptions(_)
            | ManagerError::OptionsMissing
            | ManagerError::StepsMissing
            | ManagerError::StaleSteps => Self::bad_request(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, "invalid_argument", message),
            Self::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", message),
        };
        let body = ErrorEnvelope {
            error: ErrorBody { code, message },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lunapatch_core::OptionsError;

    #[test]
    fn manager_errors_map_to_status_codes() {
        let conflict = ApiError::from(ManagerError::AlreadyRunning).into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let invalid = ApiError::from(ManagerError::InvalidOptions(OptionsError::MissingAction))
            .into_response();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let spawn = ApiError::from(ManagerError::Spawn("no threads".to_string())).into_response();
        assert_eq!(spawn.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
