use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::EngineError;

type HmacSha256 = Hmac<Sha256>;

/// Contract the engine expects from the external payment rail. Order creation
/// happens at top-up time; signature verification when the rail calls back.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &serde_json::Value,
    ) -> Result<String, EngineError>;

    /// HMAC-SHA256 over `order_id|payment_id` with the shared secret.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Shared-secret gateway adapter. Orders are issued locally; the rail echoes
/// the order id back with a payment id and a signature we can verify offline.
pub struct HmacGateway {
    secret: String,
}

impl HmacGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Produces the signature the rail is expected to send. Also used by
    /// tests to fabricate valid confirmations.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        hex_encode(&mac.finalize().into_bytes())
    }
}

#[async_trait]
impl PaymentGateway for HmacGateway {
    async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: &serde_json::Value,
    ) -> Result<String, EngineError> {
        let order_id = format!("order_{}", Uuid::new_v4().simple());
        tracing::info!(%order_id, %amount, currency, %metadata, "created gateway order");
        Ok(order_id)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Some(expected) = hex_decode(signature) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
