mod create_page;
mod get_page;

pub use create_page::*;
pub use get_page::*;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::extractors::Json;
use crate::rate_limit;

/// Whole-request cap for intake: five 5 MiB photos plus form fields.
pub const INTAKE_BODY_LIMIT: usize = 30 * 1024 * 1024;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(limits: RateLimitConfig) -> Router<AppState> {
    let intake = Router::new()
        .route("/api/pages", post(create_page))
        .layer(DefaultBodyLimit::max(INTAKE_BODY_LIMIT))
        .layer(rate_limit::intake_layer(limits.intake_rpm));

    let standard = Router::new()
        .route("/health", get(health))
        .route("/api/pages/{token}", get(get_page))
        .layer(rate_limit::standard_layer(limits.standard_rpm));

    intake.merge(standard)
}
