//! Wire mapping for UWS errors.
//!
//! Every error leaves the API as `{"detail": [{"msg", "type", "loc"?}]}`,
//! the same shape request validation errors take, so clients parse one
//! format regardless of where the failure happened.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use skycut_core::{Error, ErrorLocation};

/// A UWS error plus the request location it is attributed to.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    location: Option<(ErrorLocation, &'static str)>,
}

impl ApiError {
    /// Attribute the error to a part of the request.
    pub fn at(mut self, location: ErrorLocation, field: &'static str) -> Self {
        self.location = Some((location, field));
        self
    }

    pub fn error(&self) -> &Error {
        &self.error
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            error,
            location: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.error, "Request failed");
        }
        let body = json!({"detail": [self.error.to_wire(self.location)]});
        (status, Json(body)).into_response()
    }
}

/// Attribute job-lookup failures to the `job_id` path parameter.
///
/// Mirrors the attribution the equivalent native validation error would
/// carry; other errors pass through unattributed.
pub fn job_path_error(error: Error) -> ApiError {
    match error {
        Error::UnknownJob(_) | Error::PermissionDenied(_) => {
            ApiError::from(error).at(ErrorLocation::Path, "job_id")
        }
        error => ApiError::from(error),
    }
}
