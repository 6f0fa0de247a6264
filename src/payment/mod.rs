//! Payment gateway integration
//!
//! A Razorpay-style gateway: orders are registered with the gateway before
//! checkout, and payment callbacks are authenticated with an HMAC-SHA256
//! signature over `"{gateway_order_id}|{gateway_payment_id}"` keyed by the
//! gateway secret.
//!
//! The [`PaymentGateway`] trait keeps the HTTP client out of the order
//! service so tests can substitute a canned gateway.

use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

/// An order registered with the payment gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    /// Gateway-side order identifier (e.g. `order_xxx`)
    pub id: String,
    /// Amount in the currency's smallest unit (paise)
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
}

/// Gateway operations needed by checkout
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register an order with the gateway.
    ///
    /// `amount` is in paise; `receipt` is our order number, echoed back in
    /// gateway dashboards and webhooks.
    async fn create_order(&self, amount: i64, receipt: &str) -> Result<GatewayOrder>;

    /// Key ID the checkout frontend needs to open the payment widget
    fn key_id(&self) -> &str;

    /// Verify a payment callback signature.
    ///
    /// The signature is the lowercase hex HMAC-SHA256 of
    /// `"{gateway_order_id}|{gateway_payment_id}"` under the key secret.
    /// Comparison is constant-time.
    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool;
}

/// Razorpay REST API client
pub struct RazorpayGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
    currency: String,
}

impl RazorpayGateway {
    /// Create a gateway client from payment configuration
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            currency: config.currency.clone(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, amount: i64, receipt: &str) -> Result<GatewayOrder> {
        let url = format!("{}/orders", self.api_base);
        let body = serde_json::json!({
            "amount": amount,
            "currency": self.currency,
            "receipt": receipt,
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .context("Failed to reach payment gateway")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Payment gateway rejected order creation ({}): {}", status, text);
        }

        let order: GatewayOrder = response
            .json()
            .await
            .context("Failed to parse gateway order response")?;

        tracing::info!(gateway_order_id = %order.id, amount, "Gateway order created");
        Ok(order)
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn verify_signature(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> bool {
        verify_payment_signature(
            &self.key_secret,
            gateway_order_id,
            gateway_payment_id,
            signature,
        )
    }
}

/// Verify a hex-encoded HMAC-SHA256 payment signature.
///
/// Uses `Mac::verify_slice` so the comparison does not leak how many bytes
/// matched.
pub fn verify_payment_signature(
    key_secret: &str,
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
) -> bool {
    let expected = match decode_hex(signature) {
        Some(bytes) => bytes,
        None => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(key_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());

    mac.verify_slice(&expected).is_ok()
}

/// Compute the hex signature for a gateway order/payment pair. Used by
/// tests to build valid callbacks.
pub fn sign_payment(key_secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());

    let bytes = mac.finalize().into_bytes();
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
pub mod testing {
    //! Canned gateway for service tests

    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Gateway that returns deterministic order ids without any HTTP
    pub struct FakeGateway {
        counter: AtomicU64,
        key_secret: String,
    }

    impl FakeGateway {
        pub fn new(key_secret: &str) -> Self {
            Self {
                counter: AtomicU64::new(0),
                key_secret: key_secret.to_string(),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(&self, amount: i64, _receipt: &str) -> Result<GatewayOrder> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(GatewayOrder {
                id: format!("order_fake{:06}", n),
                amount,
                currency: "INR".to_string(),
            })
        }

        fn key_id(&self) -> &str {
            "rzp_test_fake"
        }

        fn verify_signature(
            &self,
            gateway_order_id: &str,
            gateway_payment_id: &str,
            signature: &str,
        ) -> bool {
            verify_payment_signature(
                &self.key_secret,
                gateway_order_id,
                gateway_payment_id,
                signature,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let signature = sign_payment("secret", "order_abc", "pay_xyz");
        assert!(verify_payment_signature(
            "secret",
            "order_abc",
            "pay_xyz",
            &signature
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let signature = sign_payment("secret", "order_abc", "pay_xyz");
        assert!(!verify_payment_signature(
            "other-secret",
            "order_abc",
            "pay_xyz",
            &signature
        ));
    }

    #[test]
    fn test_tampered_ids_rejected() {
        let signature = sign_payment("secret", "order_abc", "pay_xyz");
        assert!(!verify_payment_signature(
            "secret",
            "order_abc",
            "pay_other",
            &signature
        ));
        assert!(!verify_payment_signature(
            "secret",
            "order_other",
            "pay_xyz",
            &signature
        ));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        assert!(!verify_payment_signature(
            "secret",
            "order_abc",
            "pay_xyz",
            "not-hex"
        ));
        assert!(!verify_payment_signature(
            "secret", "order_abc", "pay_xyz", "abc"
        ));
        assert!(!verify_payment_signature("secret", "order_abc", "pay_xyz", ""));
    }

    #[test]
    fn test_signature_is_lowercase_hex() {
        let signature = sign_payment("secret", "order_abc", "pay_xyz");
        assert_eq!(signature.len(), 64);
        assert!(signature
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_known_vector() {
        // HMAC-SHA256("key", "order_1|pay_1")
        let signature = sign_payment("key", "order_1", "pay_1");
        assert!(verify_payment_signature("key", "order_1", "pay_1", &signature));
        // Same input always signs the same
        assert_eq!(signature, sign_payment("key", "order_1", "pay_1"));
    }

    #[tokio::test]
    async fn test_fake_gateway_orders_are_unique() {
        use testing::FakeGateway;

        let gateway = FakeGateway::new("secret");
        let a = gateway.create_order(100000, "EC-1").await.unwrap();
        let b = gateway.create_order(200000, "EC-2").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(b.amount, 200000);
    }
}
