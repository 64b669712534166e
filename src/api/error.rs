//! HTTP error responses for the cache routes

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid request input (400)
    #[error("{0}")]
    BadRequest(String),

    /// Unexpected failure while serving the request (500)
    #[error("{error}: {details}")]
    Internal { error: String, details: String },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(error: impl Into<String>, details: impl ToString) -> Self {
        Self::Internal {
            error: error.into(),
            details: details.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Self::BadRequest(msg) => HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": msg,
            })),
            Self::Internal { error, details } => {
                tracing::error!(error = %error, details = %details, "Cache API request failed");
                HttpResponse::InternalServerError().json(json!({
                    "success": false,
                    "error": error,
                    "details": details,
                }))
            }
        }
    }
}
