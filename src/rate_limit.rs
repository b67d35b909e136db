//! Per-IP rate limiting for the public endpoints.
//!
//! Tiers:
//! - Intake: POST /api/pages (photo uploads plus a gateway call)
//! - Standard: GET /api/pages/{token}, /health
//!
//! The payment webhook is not limited; gateway retries must always get through.
//!
//! Configure via environment variables:
//! - RATE_LIMIT_INTAKE_RPM (default: 10)
//! - RATE_LIMIT_STANDARD_RPM (default: 60)

use std::sync::Arc;
use std::time::Duration;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Creates a rate limiter layer allowing a burst of `requests_per_minute`,
/// refilled evenly over the minute.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    let requests_per_minute = requests_per_minute.max(1);

    let period_ms = 60_000 / u64::from(requests_per_minute);
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_millis(period_ms.max(1)))
        .burst_size(requests_per_minute)
        .finish()
        .expect("burst size and period are non-zero");

    GovernorLayer::new(Arc::new(config))
}

/// Layer for page creation.
pub fn intake_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

/// Layer for page lookups and health checks.
pub fn standard_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}
