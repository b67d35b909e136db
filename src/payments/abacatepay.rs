use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use subtle::ConstantTimeEq;

use super::{Checkout, CheckoutRequest, PaymentGateway};
use crate::error::{AppError, Result};

pub const DEFAULT_API_URL: &str = "https://api.abacatepay.com/v1";

/// Places the checkout URL may appear in a billing response, best first.
const CHECKOUT_URL_PATHS: &[&str] = &["/data/url", "/url", "/data/billing/url"];
const CHECKOUT_ID_PATHS: &[&str] = &["/data/id", "/id", "/data/billing/id"];

/// Places the payment status may appear in a webhook body, best first.
///
/// The gateway has shipped several payload shapes; new ones go here.
pub const STATUS_PATHS: &[&str] = &[
    "/data/status",
    "/data/billing/status",
    "/data/payment/status",
    "/billing/status",
    "/status",
];

/// Places the order token (our `externalId`) may appear, best first.
pub const TOKEN_PATHS: &[&str] = &[
    "/data/billing/products/0/externalId",
    "/data/products/0/externalId",
    "/data/billing/externalId",
    "/data/externalId",
    "/data/metadata/externalId",
    "/billing/products/0/externalId",
    "/products/0/externalId",
    "/externalId",
    "/metadata/externalId",
];

/// Normalized statuses meaning the customer has paid.
pub const PAID_STATUSES: &[&str] = &["PAID", "CONFIRMED", "APPROVED", "SUCCEEDED", "SUCCESS"];

/// First non-blank string found at any of `pointers`, tried in order.
pub fn extract_first(body: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| {
        body.pointer(p)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

pub fn normalize_status(status: &str) -> String {
    status.trim().to_ascii_uppercase()
}

pub fn is_paid_status(status: &str) -> bool {
    PAID_STATUSES.contains(&normalize_status(status).as_str())
}

/// The two fields a payment notification is reduced to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentNotice {
    pub token: Option<String>,
    /// Already normalized
    pub status: Option<String>,
}

impl PaymentNotice {
    pub fn from_body(body: &Value) -> Self {
        Self {
            token: extract_first(body, TOKEN_PATHS),
            status: extract_first(body, STATUS_PATHS).map(|s| normalize_status(&s)),
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status.as_deref().is_some_and(is_paid_status)
    }
}

/// Constant-time comparison of the configured webhook secret with the one
/// the gateway put in the callback URL.
pub fn verify_webhook_secret(expected: &str, provided: Option<&str>) -> bool {
    let Some(provided) = provided else {
        return false;
    };
    // Length is not secret; ct_eq on unequal lengths returns false anyway.
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BillingProduct<'a> {
    external_id: &'a str,
    name: &'a str,
    quantity: u32,
    price: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBillingRequest<'a> {
    frequency: &'static str,
    methods: [&'static str; 1],
    products: Vec<BillingProduct<'a>>,
    return_url: &'a str,
    completion_url: &'a str,
}

/// AbacatePay PIX billing client.
#[derive(Debug, Clone)]
pub struct AbacatePayClient {
    client: Client,
    api_url: String,
    api_key: String,
}

impl AbacatePayClient {
    pub fn new(api_key: String, api_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_url: api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        }
    }

    /// Create a one-time PIX billing for an order.
    ///
    /// The order token goes in `externalId` so webhooks can be matched back.
    pub async fn create_billing(&self, request: &CheckoutRequest<'_>) -> Result<Checkout> {
        let body = CreateBillingRequest {
            frequency: "ONE_TIME",
            methods: ["PIX"],
            products: vec![BillingProduct {
                external_id: request.token,
                name: request.plan.product_name(),
                quantity: 1,
                price: request.plan.price_cents(),
            }],
            return_url: request.return_url,
            completion_url: request.return_url,
        };

        let response = self
            .client
            .post(format!("{}/billing/create", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("AbacatePay API error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "AbacatePay API error: {} - {}",
                status, error_text
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            AppError::Upstream(format!("Failed to parse AbacatePay response: {}", e))
        })?;

        checkout_from_response(&payload)
    }
}

fn checkout_from_response(payload: &Value) -> Result<Checkout> {
    if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
        return Err(AppError::Upstream(format!("AbacatePay rejected billing: {}", error)));
    }

    let url = extract_first(payload, CHECKOUT_URL_PATHS)
        .ok_or_else(|| AppError::Upstream("AbacatePay response has no checkout url".into()))?;

    Ok(Checkout {
        id: extract_first(payload, CHECKOUT_ID_PATHS),
        url,
    })
}

#[async_trait]
impl PaymentGateway for AbacatePayClient {
    fn provider_name(&self) -> &'static str {
        "abacatepay"
    }

    async fn create_checkout(&self, request: &CheckoutRequest<'_>) -> Result<Checkout> {
        self.create_billing(request).await
    }
}
