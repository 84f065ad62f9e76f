use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Request-time and startup faults. Client faults (bad upload) map to 400,
/// everything else to 500.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("malformed upload: {0}")]
    Upload(String),

    #[error("scoring failed: {0}")]
    Scoring(String),

    #[error("model load failed: {0}")]
    ModelLoad(String),
}

impl DetectorError {
    pub fn is_client_fault(&self) -> bool {
        matches!(self, DetectorError::InvalidImage(_) | DetectorError::Upload(_))
    }
}

impl ResponseError for DetectorError {
    fn status_code(&self) -> StatusCode {
        if self.is_client_fault() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        // Client faults carry the decoder's diagnostic; server faults only
        // reach the log, never the response body.
        let error = if self.is_client_fault() {
            self.to_string()
        } else {
            log::error!("{}", self);
            "internal error".to_string()
        };
        HttpResponse::build(self.status_code()).json(ErrorResponse { error })
    }
}
