use axum::{
    extract::{Multipart, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::id::{gen_token, token_prefix};
use crate::models::CreateOrder;
use crate::payments::CheckoutRequest;
use crate::storage::photo_key;
use crate::validation::{self, PhotoPart, RawIntake, ValidatedIntake};

#[derive(Debug, Serialize)]
pub struct CreatePageResponse {
    pub token: String,
    /// Where to send the customer next: the checkout, or the page itself
    /// when no payment gateway is configured.
    pub url: String,
    pub page_url: String,
}

/// `POST /api/pages`
///
/// Validates the whole form first; nothing is stored for a rejected
/// submission. Photo uploads, the insert and the checkout call then share one
/// deadline.
pub async fn create_page(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreatePageResponse>)> {
    let raw = read_form(&mut multipart).await?;
    let intake = validation::validate(raw, Utc::now().date_naive())?;

    let token = gen_token();
    let page_url = state.page_url(&token);

    let url = match tokio::time::timeout(
        state.intake_timeout,
        fulfil(&state, &token, &page_url, intake),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            tracing::warn!(
                token = %token_prefix(&token),
                timeout_secs = state.intake_timeout.as_secs(),
                "Intake timed out"
            );
            return Err(AppError::Unavailable(msg::INTAKE_TIMEOUT.into()));
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CreatePageResponse {
            token,
            url,
            page_url,
        }),
    ))
}

/// Collects the multipart fields. Unknown fields are skipped.
async fn read_form(multipart: &mut Multipart) -> Result<RawIntake> {
    let mut raw = RawIntake::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "photos" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                raw.photos.push(PhotoPart {
                    content_type,
                    bytes,
                });
            }
            "plan" => raw.plan = Some(field.text().await?),
            "names" => raw.names = Some(field.text().await?),
            "startDate" => raw.start_date = Some(field.text().await?),
            "message" => raw.message = Some(field.text().await?),
            "musicUrl" => raw.music_url = Some(field.text().await?),
            "email" => raw.email = Some(field.text().await?),
            "phone" => raw.phone = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(raw)
}

/// Store photos, insert the PENDING order, then open the checkout.
/// Returns the URL the client should go to next.
async fn fulfil(
    state: &AppState,
    token: &str,
    page_url: &str,
    intake: ValidatedIntake,
) -> Result<String> {
    let prefix = token_prefix(token);

    let mut photo_urls = Vec::with_capacity(intake.photos.len());
    for (i, photo) in intake.photos.into_iter().enumerate() {
        let key = photo_key(token, i + 1, &photo.content_type);
        let url = state
            .photos
            .put(&key, &photo.content_type, photo.bytes)
            .await?;
        photo_urls.push(url);
    }
    tracing::debug!(
        token = %prefix,
        count = photo_urls.len(),
        backend = state.photos.backend_tag(),
        "Photos stored"
    );

    let input = CreateOrder {
        token: token.to_string(),
        plan: intake.plan,
        names: intake.names,
        start_date: intake.start_date,
        message: intake.message,
        photo_urls,
        music_url: intake.music_url,
        contact: intake.contact,
    };

    {
        let conn = state.db.get()?;
        queries::create_order(&conn, &input)?;
    }
    tracing::info!(token = %prefix, plan = input.plan.as_ref(), "Order created");

    let Some(gateway) = &state.payments else {
        tracing::debug!(token = %prefix, "No payment gateway configured, returning page URL");
        return Ok(page_url.to_string());
    };

    let checkout = gateway
        .create_checkout(&CheckoutRequest {
            token,
            plan: input.plan,
            return_url: page_url,
        })
        .await
        .inspect_err(|e| {
            tracing::error!(
                token = %prefix,
                provider = gateway.provider_name(),
                error = %e,
                "Checkout creation failed, order left PENDING"
            );
        })?;

    tracing::info!(
        token = %prefix,
        provider = gateway.provider_name(),
        billing_id = checkout.id.as_deref().unwrap_or("-"),
        "Checkout created"
    );

    Ok(checkout.url)
}
