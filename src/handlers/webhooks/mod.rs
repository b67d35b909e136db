mod abacatepay;

pub use abacatepay::*;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/abacatepay", post(handle_abacatepay_webhook))
}
