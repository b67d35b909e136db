//! AbacatePay payment notifications.
//!
//! Gateways retry deliveries and may send them concurrently, so everything
//! that is not an infrastructure failure is acknowledged with 200. The
//! conditional PENDING -> APPROVED update decides which delivery, if any,
//! performed the approval; only that one triggers the customer notification.

use axum::{body::Bytes, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{AppState, queries};
use crate::email::PageReadyNotice;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::id::token_prefix;
use crate::models::Order;
use crate::payments::{PaymentNotice, verify_webhook_secret};

#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    #[serde(rename = "webhookSecret")]
    pub webhook_secret: Option<String>,
}

/// What a delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Body was not JSON
    InvalidPayload,
    MissingToken,
    NotPaid,
    UnknownOrder,
    /// This delivery moved the order to APPROVED
    Approved,
    AlreadyApproved,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        Self {
            received: true,
            outcome,
        }
    }
}

pub async fn handle_abacatepay_webhook(
    State(state): State<AppState>,
    Query(params): Query<WebhookParams>,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    if let Some(expected) = &state.webhook_secret {
        if !verify_webhook_secret(expected, params.webhook_secret.as_deref()) {
            tracing::warn!("AbacatePay webhook rejected: secret mismatch");
            return Err(AppError::Unauthorized);
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, size = body.len(), "AbacatePay webhook body is not JSON");
            return Ok(Json(WebhookOutcome::InvalidPayload.into()));
        }
    };

    let notice = PaymentNotice::from_body(&payload);
    let outcome = process_payment_notice(&state, &notice).await?;

    Ok(Json(outcome.into()))
}

/// Apply one payment notification. Only database errors are returned as `Err`.
pub async fn process_payment_notice(
    state: &AppState,
    notice: &PaymentNotice,
) -> Result<WebhookOutcome> {
    let Some(token) = notice.token.as_deref() else {
        tracing::info!(status = ?notice.status, "Webhook without order token, ignoring");
        return Ok(WebhookOutcome::MissingToken);
    };
    let prefix = token_prefix(token);

    if !notice.is_paid() {
        if !order_exists(state, token)? {
            tracing::warn!(token = %prefix, status = ?notice.status, "Webhook for unknown order");
            return Ok(WebhookOutcome::UnknownOrder);
        }
        tracing::info!(token = %prefix, status = ?notice.status, "Webhook status is not a payment, ignoring");
        return Ok(WebhookOutcome::NotPaid);
    }

    let approved: Option<Order> = {
        let conn = state.db.get()?;
        if queries::try_approve_order(&conn, token)? {
            queries::get_order(&conn, token)?
        } else {
            None
        }
    };

    let Some(order) = approved else {
        return Ok(if order_exists(state, token)? {
            tracing::info!(token = %prefix, "Order already approved, duplicate delivery");
            WebhookOutcome::AlreadyApproved
        } else {
            tracing::warn!(token = %prefix, "Webhook for unknown order");
            WebhookOutcome::UnknownOrder
        });
    };

    tracing::info!(token = %prefix, plan = order.plan.as_ref(), "Order approved");
    notify_page_ready(state, &order).await;

    Ok(WebhookOutcome::Approved)
}

fn order_exists(state: &AppState, token: &str) -> Result<bool> {
    let conn = state.db.get()?;
    Ok(queries::get_order(&conn, token)?.is_some())
}

/// Failures are logged; the approval already happened and stands.
async fn notify_page_ready(state: &AppState, order: &Order) {
    let page_url = state.page_url(&order.token);
    let notice = PageReadyNotice {
        token: &order.token,
        names: &order.names,
        page_url: &page_url,
        contact: &order.contact,
    };

    match state.notifier.page_ready(&notice).await {
        Ok(result) => {
            tracing::debug!(token = %token_prefix(&order.token), ?result, "Notification handled");
        }
        Err(e) => {
            tracing::error!(
                token = %token_prefix(&order.token),
                error = %e,
                "Failed to send page ready notification"
            );
        }
    }
}
