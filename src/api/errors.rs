use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::error::{AdminError, ErrorKind};

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::RequiredField
        | ErrorKind::Validation
        | ErrorKind::InvalidArgument
        | ErrorKind::InvalidFeatureConfig => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Duplicate | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::ServiceNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = status_for(self.kind);
        if status.is_server_error() {
            log::error!("request failed: {}", self.message);
        }
        (status, Json(self.to_payload())).into_response()
    }
}
