use crate::models::ErrorResponse;
use crate::validation::ValidationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::Error;

/// Failure of a handler, rendered as `{success:false, error, code}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            body: ErrorResponse::new(error, code),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, e.to_string(), e.code())
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let code = match &e {
            Error::InvalidInput { .. } => "INVALID_REQUEST",
            Error::UnknownPlatform(_) => "INVALID_PLATFORMS",
            Error::PlatformNotConfigured(_) => "PLATFORM_NOT_CONFIGURED",
            Error::NotFound => "NOT_FOUND",
            _ => "INTERNAL_ERROR",
        };
        let status = match &e {
            _ if e.is_caller_error() => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", e);
        }
        ApiError::new(status, e.to_string(), code)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_errors_map_to_bad_request() {
        let err = ApiError::from(Error::PlatformNotConfigured("pdd".into()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "PLATFORM_NOT_CONFIGURED");

        let err = ApiError::from(ValidationError::InvalidKeyword);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.body.code, "INVALID_KEYWORD");
        assert!(!err.body.success);
    }

    #[test]
    fn test_other_errors_map_to_server_error() {
        let err = ApiError::from(Error::Cache("poisoned".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.code, "INTERNAL_ERROR");
    }
}
