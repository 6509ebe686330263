//! Razorpay REST client.
//!
//! Only order creation goes over the network. Checkout signatures and
//! webhook signatures are verified locally in `emporium_core::signature`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Payment gateway request failed: {0}")]
    Request(String),

    #[error("Payment gateway rejected the request with status {status}")]
    Rejected { status: u16 },
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Request(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    /// Minor units (paise)
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: OrderNotes<'a>,
}

/// Echoed back in webhook payloads as `payload.payment.entity.notes`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderNotes<'a> {
    order_id: &'a str,
    user_id: &'a str,
}

/// An order created on the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        GatewayClient {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.is_empty()
    }

    /// Public key id handed to the storefront checkout widget.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Creates a gateway order for `amount_cents` with the store order id as receipt.
    pub async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        order_id: &str,
        user_id: &str,
    ) -> GatewayResult<GatewayOrder> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let request = CreateOrderRequest {
            amount: amount_cents,
            currency,
            receipt: order_id,
            notes: OrderNotes { order_id, user_id },
        };

        debug!(order_id = %order_id, amount_cents, "Creating gateway order");

        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(order_id = %order_id, status = status.as_u16(), "Gateway rejected order creation");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<GatewayOrder>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let client = GatewayClient::new("https://api.razorpay.com/v1/", "", "");
        assert!(!client.is_configured());

        let result = client.create_order(1300, "INR", "order-1", "user-1").await;
        assert!(matches!(result, Err(GatewayError::NotConfigured)));
    }

    #[test]
    fn test_request_body_shape() {
        let request = CreateOrderRequest {
            amount: 1300,
            currency: "INR",
            receipt: "order-1",
            notes: OrderNotes {
                order_id: "order-1",
                user_id: "user-1",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], 1300);
        assert_eq!(json["notes"]["orderId"], "order-1");
    }
}
