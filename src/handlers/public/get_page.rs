use axum::extract::State;
use chrono::Utc;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::id::{is_valid_token, token_prefix};
use crate::models::PublicPage;

/// Public projection of a page. Served whatever the payment status; the
/// client shows a placeholder until it is APPROVED.
pub async fn get_page(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PublicPage>> {
    if !is_valid_token(&token) {
        return Err(AppError::NotFound(msg::PAGE_NOT_FOUND.into()));
    }

    let conn = state.db.get()?;
    let order = queries::get_order(&conn, &token)?.or_not_found(msg::PAGE_NOT_FOUND)?;

    tracing::debug!(
        token = %token_prefix(&token),
        status = order.status.as_ref(),
        "Serving page"
    );

    Ok(Json(order.to_public(Utc::now())))
}
