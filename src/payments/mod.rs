mod abacatepay;

pub use abacatepay::*;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Plan;

/// What intake asks the gateway for: one payment for one order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    /// Order token, sent as the external correlation id and echoed back in webhooks
    pub token: &'a str,
    pub plan: Plan,
    /// Where the customer lands after paying (the public page)
    pub return_url: &'a str,
}

#[derive(Debug, Clone)]
pub struct Checkout {
    /// Gateway-side billing id, when the gateway returns one
    pub id: Option<String>,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Provider name for logs (e.g., "abacatepay")
    fn provider_name(&self) -> &'static str;

    async fn create_checkout(&self, request: &CheckoutRequest<'_>) -> Result<Checkout>;
}
