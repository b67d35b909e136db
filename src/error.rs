use axum::{
    Json,
    extract::{multipart::MultipartError, rejection::PathRejection, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared between handlers and tests.
pub mod msg {
    pub const PAGE_NOT_FOUND: &str = "Page not found";
    pub const INVALID_PLAN: &str = "Plan must be BASIC or PREMIUM";
    pub const NAMES_REQUIRED: &str = "Names are required";
    pub const NAMES_TOO_LONG: &str = "Names must be at most 60 characters";
    pub const START_DATE_REQUIRED: &str = "Start date is required";
    pub const START_DATE_INVALID: &str = "Start date must be a date in YYYY-MM-DD format";
    pub const START_DATE_IN_FUTURE: &str = "Start date cannot be in the future";
    pub const PHOTOS_REQUIRED: &str = "At least one photo is required";
    pub const PHOTO_NOT_IMAGE: &str = "Only image files are allowed";
    pub const PHOTO_TOO_LARGE: &str = "Each photo must be at most 5 MB";
    pub const MUSIC_NOT_IN_PLAN: &str = "Background music is only available on the PREMIUM plan";
    pub const MUSIC_URL_INVALID: &str = "Music link must be a valid YouTube URL";
    pub const CONTACT_REQUIRED: &str = "Provide an e-mail or a phone number to receive the link";
    pub const EMAIL_INVALID: &str = "E-mail address is invalid";
    pub const PHONE_INVALID: &str = "Phone number must have 10 to 13 digits";
    pub const INVALID_FORM: &str = "Invalid form submission";
    pub const FORM_TOO_LARGE: &str = "The form is too large, send fewer or smaller photos";
    pub const CHECKOUT_FAILED: &str = "Could not create the payment checkout";
    pub const INTAKE_TIMEOUT: &str = "The request took too long, please try again";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A form rule was violated; `field` names the offending input.
    #[error("Validation failed on {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        tracing::debug!("Multipart error: {}", e.body_text());
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(msg::FORM_TOO_LARGE.into())
        } else {
            AppError::BadRequest(msg::INVALID_FORM.into())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details, field) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone()), None),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()), None)
            }
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                "Bad request",
                Some(message.clone()),
                Some(*field),
            ),
            // Only intake accepts large bodies, and most of that is photos
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Payload too large",
                Some(msg.clone()),
                Some("photos"),
            ),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None, None),
            AppError::Upstream(cause) => {
                tracing::error!("Upstream error: {}", cause);
                (
                    StatusCode::BAD_GATEWAY,
                    "Bad gateway",
                    Some(msg::CHECKOUT_FAILED.to_string()),
                    None,
                )
            }
            AppError::Unavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service unavailable",
                    Some(msg.clone()),
                    None,
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()), None)
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            field,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Turns `Ok(None)` lookups into a 404.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
