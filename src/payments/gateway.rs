use crate::payments::error::GatewayResult;
use crate::payments::types::{CheckoutRequest, CheckoutSession, GatewayWebhookPayload};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Payment gateway seam. Implementations make network calls only; all
/// persistence is the caller's responsibility.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted-checkout session for the given amount and customer
    async fn initiate_payment(&self, request: CheckoutRequest) -> GatewayResult<CheckoutSession>;

    /// Query the gateway's own record for a transaction reference
    async fn verify_payment(&self, gateway_reference: &str) -> GatewayResult<JsonValue>;

    /// Validate an inbound webhook signature over the raw body.
    /// Returns true when no webhook secret is configured (development only).
    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool;

    /// Fold the gateway's camelCase/snake_case payload variants into one shape
    fn parse_webhook_payload(&self, payload: &JsonValue) -> GatewayResult<GatewayWebhookPayload>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::GatewayPaymentStatus;

    struct MockGateway;

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn initiate_payment(
            &self,
            request: CheckoutRequest,
        ) -> GatewayResult<CheckoutSession> {
            let _ = request;
            Ok(CheckoutSession {
                checkout_url: "https://checkout.example.com/pay".to_string(),
                gateway_reference: "mock_ref".to_string(),
            })
        }

        async fn verify_payment(&self, _gateway_reference: &str) -> GatewayResult<JsonValue> {
            Ok(serde_json::json!({"status": "successful"}))
        }

        fn verify_webhook_signature(&self, _payload: &[u8], _signature: Option<&str>) -> bool {
            true
        }

        fn parse_webhook_payload(
            &self,
            payload: &JsonValue,
        ) -> GatewayResult<GatewayWebhookPayload> {
            Ok(GatewayWebhookPayload {
                transaction_reference: "mock_ref".to_string(),
                payment_reference: None,
                amount: None,
                currency: "NGN".to_string(),
                payment_method: None,
                payment_status: GatewayPaymentStatus::Successful,
                raw_status: "successful".to_string(),
                paid_at: None,
                customer_email: None,
                raw: payload.clone(),
            })
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_gateway() {
        let gateway: Box<dyn PaymentGateway> = Box::new(MockGateway);
        let session = gateway
            .initiate_payment(CheckoutRequest {
                amount: "1000.00".to_string(),
                currency: "NGN".to_string(),
                payment_reference: "PAY_1".to_string(),
                customer_name: "Test".to_string(),
                customer_email: "test@example.com".to_string(),
                customer_phone: "08031234567".to_string(),
                redirect_url: "https://example.com/callback".to_string(),
                description: "Data purchase".to_string(),
            })
            .await
            .expect("checkout should succeed");
        assert_eq!(session.gateway_reference, "mock_ref");
    }
}
