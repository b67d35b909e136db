//! "Your page is ready" notification, sent once an order is paid.
//!
//! Delivery goes through the Resend API. Without an API key, or when the
//! order only has a phone contact, nothing is sent and the reason is logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Contact;

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

const RESEND_API_URL: &str = "https://api.resend.com/emails";

pub const DEFAULT_FROM: &str = "Love365 <noreply@love365.app>";

/// Result of attempting to notify a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyResult {
    /// Email was sent successfully via Resend
    Sent,
    /// No Resend API key configured
    NoApiKey,
    /// Contact has no email address (phone-only orders)
    NoEmail,
}

/// What the customer is told once their page is live.
#[derive(Debug, Clone)]
pub struct PageReadyNotice<'a> {
    pub token: &'a str,
    pub names: &'a str,
    pub page_url: &'a str,
    pub contact: &'a Contact,
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn page_ready(&self, notice: &PageReadyNotice<'_>) -> Result<NotifyResult>;
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

/// Email notifier using the Resend API.
#[derive(Clone)]
pub struct EmailService {
    api_key: Option<String>,
    from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            api_key,
            from_email,
            http_client: Client::new(),
        }
    }

    /// Send a request to Resend API with exponential backoff retry.
    ///
    /// Retries on transient errors (network issues, 5xx, 429 rate limit).
    /// Fails immediately on non-transient errors (4xx except 429).
    async fn send_request_with_retry(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
        token_prefix: &str,
    ) -> Result<NotifyResult> {
        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tracing::warn!(
                    attempt,
                    delay_secs,
                    "Retrying email send after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(api_key, request).await {
                Ok(()) => {
                    tracing::info!(
                        attempt,
                        token = %token_prefix,
                        "Page ready email sent via Resend"
                    );
                    return Ok(NotifyResult::Sent);
                }
                Err((error, true)) => last_error = Some(error),
                Err((error, false)) => return Err(error),
            }
        }

        tracing::error!(
            token = %token_prefix,
            attempts = RETRY_DELAYS.len() + 1,
            "Email send failed after all retries"
        );
        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("Email service error: all retries exhausted".into())
        }))
    }

    /// Send a single request to Resend API.
    ///
    /// Returns Ok(()) on success, or Err((AppError, is_transient)) on failure.
    async fn send_resend_request(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<(), (AppError, bool)> {
        let response = self
            .http_client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                (
                    AppError::Internal(format!("Email service error: {}", e)),
                    true,
                )
            })?;

        let status = response.status();

        if status.is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                (AppError::Internal("Email service response error".into()), false)
            })?;
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let is_transient = status.as_u16() == 429 || status.is_server_error();

        if is_transient {
            tracing::warn!(status = %status, body = %body, "Resend API returned transient error");
        } else {
            tracing::error!(status = %status, body = %body, "Resend API returned non-transient error");
        }

        Err((
            AppError::Internal(format!("Email service error: {} - {}", status, body)),
            is_transient,
        ))
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn page_ready(&self, notice: &PageReadyNotice<'_>) -> Result<NotifyResult> {
        let token_prefix = crate::id::token_prefix(notice.token);

        let Some(to_email) = notice.contact.email.as_deref() else {
            tracing::info!(
                token = %token_prefix,
                "Order has no email contact, skipping page ready email"
            );
            return Ok(NotifyResult::NoEmail);
        };

        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(
                token = %token_prefix,
                "No Resend API key configured, cannot send page ready email"
            );
            return Ok(NotifyResult::NoApiKey);
        };

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![to_email],
            subject: subject(notice.names),
            text: render_text(notice),
            html: render_html(notice),
        };

        self.send_request_with_retry(api_key, &request, token_prefix)
            .await
    }
}

fn subject(names: &str) -> String {
    format!("Seu presente para {} está pronto! ❤️", names)
}

fn render_text(notice: &PageReadyNotice<'_>) -> String {
    format!(
        "Seu presente chegou!\n\nOlá, o pagamento da sua página {} foi confirmado com sucesso.\n\nAcesse, salve e compartilhe o seu link:\n{}\n\nEquipe Love365",
        notice.names, notice.page_url
    )
}

fn render_html(notice: &PageReadyNotice<'_>) -> String {
    let names = escape_html(notice.names);
    let url = escape_html(notice.page_url);
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h1 style="color: #e11d48;">Seu presente chegou!</h1>
<p>Olá, o pagamento da sua página <strong>{names}</strong> foi confirmado com sucesso.</p>
<p>Você pode acessar, salvar e compartilhar o seu link através do botão abaixo:</p>
<a href="{url}" style="background-color: #e11d48; color: white; padding: 12px 24px; text-decoration: none; border-radius: 8px; display: inline-block; margin: 20px 0;">Acessar Minha Página</a>
<p>Link direto: <br /> <a href="{url}">{url}</a></p>
<hr style="border: 0; border-top: 1px solid #eee; margin: 20px 0;" />
<p style="font-size: 12px; color: #666;">Equipe Love365</p>
</body>
</html>"#
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
