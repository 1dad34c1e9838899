use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use csm_driver::Error as DriverError;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Driver(e) => match e {
                DriverError::AlreadyExists { .. } | DriverError::HardwareConflict { .. } => {
                    StatusCode::CONFLICT
                }
                DriverError::NotCreated(_) => StatusCode::NOT_FOUND,
                DriverError::KillUnsupported => StatusCode::BAD_REQUEST,
                DriverError::MissingConfig(_)
                | DriverError::InvalidConfig(_)
                | DriverError::UnknownRegion(_)
                | DriverError::TemplateNotFound(_)
                | DriverError::NoProjectsAvailable
                | DriverError::ShrinkNotAllowed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                DriverError::NotReady { .. } => StatusCode::GATEWAY_TIMEOUT,
                DriverError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                DriverError::Api(_)
                | DriverError::UnexpectedVmStatus { .. }
                | DriverError::NoVms(_)
                | DriverError::Bootstrap(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
