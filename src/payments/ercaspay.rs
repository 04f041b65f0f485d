use crate::payments::error::{GatewayError, GatewayResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{
    CheckoutRequest, CheckoutSession, GatewayPaymentStatus, GatewayWebhookPayload,
};
use crate::payments::utils::{verify_hmac_sha512_hex, GatewayHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErcasPayEnvironment {
    Sandbox,
    Live,
}

#[derive(Debug, Clone)]
pub struct ErcasPayConfig {
    pub environment: ErcasPayEnvironment,
    pub base_url: String,
    pub secret_key: String,
    pub public_key: Option<String>,
    /// Shared secret for webhook HMAC verification. When absent, signature
    /// checks are skipped; development-only relaxation.
    pub webhook_secret: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ErcasPayConfig {
    fn default() -> Self {
        Self {
            environment: ErcasPayEnvironment::Sandbox,
            base_url: "https://api-staging.ercaspay.com/api/v1".to_string(),
            secret_key: String::new(),
            public_key: None,
            webhook_secret: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl ErcasPayConfig {
    pub fn from_env() -> GatewayResult<Self> {
        let environment = match std::env::var("ERCASPAY_ENVIRONMENT")
            .unwrap_or_else(|_| "sandbox".to_string())
            .to_lowercase()
            .as_str()
        {
            "live" => ErcasPayEnvironment::Live,
            _ => ErcasPayEnvironment::Sandbox,
        };

        let (base_url, secret_key, public_key) = match environment {
            ErcasPayEnvironment::Live => (
                std::env::var("ERCASPAY_LIVE_BASE_URL")
                    .unwrap_or_else(|_| "https://api.ercaspay.com/api/v1".to_string()),
                std::env::var("ERCASPAY_LIVE_SECRET_KEY").unwrap_or_default(),
                std::env::var("ERCASPAY_LIVE_PUBLIC_KEY").ok(),
            ),
            ErcasPayEnvironment::Sandbox => (
                std::env::var("ERCASPAY_SANDBOX_BASE_URL")
                    .unwrap_or_else(|_| "https://api-staging.ercaspay.com/api/v1".to_string()),
                std::env::var("ERCASPAY_SANDBOX_SECRET_KEY").unwrap_or_default(),
                std::env::var("ERCASPAY_SANDBOX_PUBLIC_KEY").ok(),
            ),
        };

        if secret_key.trim().is_empty() {
            return Err(GatewayError::ValidationError {
                message: "ErcasPay secret key is required".to_string(),
                field: Some("ERCASPAY_SECRET_KEY".to_string()),
            });
        }

        Ok(Self {
            environment,
            base_url,
            secret_key,
            public_key,
            webhook_secret: std::env::var("ERCASPAY_WEBHOOK_SECRET")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            timeout_secs: std::env::var("ERCASPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("ERCASPAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        })
    }
}

pub struct ErcasPayGateway {
    config: ErcasPayConfig,
    http: GatewayHttpClient,
}

impl ErcasPayGateway {
    pub fn new(config: ErcasPayConfig) -> GatewayResult<Self> {
        let http =
            GatewayHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> GatewayResult<Self> {
        Self::new(ErcasPayConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Pick the first present string among camelCase/snake_case variants
    fn string_variant(payload: &JsonValue, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|key| payload.get(*key))
            .and_then(|v| match v {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

#[async_trait]
impl PaymentGateway for ErcasPayGateway {
    async fn initiate_payment(&self, request: CheckoutRequest) -> GatewayResult<CheckoutSession> {
        if request.customer_email.trim().is_empty() {
            return Err(GatewayError::ValidationError {
                message: "customer email is required for checkout initialization".to_string(),
                field: Some("customer_email".to_string()),
            });
        }

        let payload = serde_json::json!({
            "amount": request.amount,
            "currency": request.currency,
            "paymentReference": request.payment_reference,
            "customerName": request.customer_name,
            "customerEmail": request.customer_email,
            "customerPhoneNumber": request.customer_phone,
            "redirectUrl": request.redirect_url,
            "description": request.description,
            "paymentMethods": "card,bank-transfer,ussd,qrcode",
            "feeBearer": "customer",
        });

        let raw: ErcasPayEnvelope<ErcasPayInitiateBody> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/payment/initiate"),
                Some(&self.config.secret_key),
                Some(&payload),
                &[("Accept", "application/json")],
            )
            .await?;

        if !raw.request_successful {
            return Err(GatewayError::InitializationFailed {
                message: raw.response_message,
                response_code: Some(raw.response_code),
            });
        }

        let body = raw.response_body.ok_or(GatewayError::UpstreamError {
            message: "gateway response missing responseBody".to_string(),
            response_code: Some(raw.response_code),
            retryable: false,
        })?;

        info!(
            gateway_reference = %body.transaction_reference,
            payment_reference = %request.payment_reference,
            "ercaspay checkout initiated"
        );

        Ok(CheckoutSession {
            checkout_url: body.checkout_url,
            gateway_reference: body.transaction_reference,
        })
    }

    async fn verify_payment(&self, gateway_reference: &str) -> GatewayResult<JsonValue> {
        if gateway_reference.trim().is_empty() {
            return Err(GatewayError::ValidationError {
                message: "gateway reference is required".to_string(),
                field: Some("gateway_reference".to_string()),
            });
        }

        self.http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!(
                    "/payment/transaction/verify/{}",
                    gateway_reference
                )),
                Some(&self.config.secret_key),
                None,
                &[("Accept", "application/json")],
            )
            .await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        let Some(secret) = self.config.webhook_secret.as_deref() else {
            warn!("webhook secret not configured, skipping signature verification");
            return true;
        };

        let Some(signature) = signature else {
            warn!("no signature provided in webhook");
            return false;
        };

        let signature = signature.strip_prefix("sha512=").unwrap_or(signature);
        verify_hmac_sha512_hex(payload, secret, signature)
    }

    fn parse_webhook_payload(&self, payload: &JsonValue) -> GatewayResult<GatewayWebhookPayload> {
        let transaction_reference =
            Self::string_variant(payload, &["transactionReference", "reference"]).ok_or(
                GatewayError::WebhookVerificationError {
                    message: "webhook payload missing transaction reference".to_string(),
                },
            )?;

        let raw_status = Self::string_variant(
            payload,
            &["paymentStatus", "status", "transactionStatus", "transaction_status"],
        )
        .unwrap_or_else(|| "unknown".to_string());

        Ok(GatewayWebhookPayload {
            transaction_reference,
            payment_reference: Self::string_variant(
                payload,
                &["paymentReference", "payment_reference"],
            ),
            amount: Self::string_variant(payload, &["amount"]),
            currency: Self::string_variant(payload, &["currency"])
                .unwrap_or_else(|| "NGN".to_string()),
            payment_method: Self::string_variant(
                payload,
                &["paymentMethod", "payment_method"],
            ),
            payment_status: GatewayPaymentStatus::parse(&raw_status),
            raw_status,
            paid_at: Self::string_variant(payload, &["paidAt", "paid_at"]),
            customer_email: Self::string_variant(payload, &["customerEmail", "customer_email"])
                .or_else(|| {
                    payload
                        .get("customer")
                        .and_then(|c| c.get("email"))
                        .and_then(|v| v.as_str())
                        .map(String::from)
                }),
            raw: payload.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "ercaspay"
    }
}

#[derive(Debug, Deserialize)]
struct ErcasPayEnvelope<T> {
    #[serde(rename = "requestSuccessful")]
    request_successful: bool,
    #[serde(rename = "responseMessage")]
    response_message: String,
    #[serde(rename = "responseCode")]
    response_code: String,
    #[serde(rename = "responseBody")]
    response_body: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErcasPayInitiateBody {
    #[serde(rename = "checkoutUrl")]
    checkout_url: String,
    #[serde(rename = "transactionReference")]
    transaction_reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    fn gateway_with_secret(webhook_secret: Option<&str>) -> ErcasPayGateway {
        ErcasPayGateway::new(ErcasPayConfig {
            environment: ErcasPayEnvironment::Sandbox,
            base_url: "https://api-staging.ercaspay.com/api/v1".to_string(),
            secret_key: "sk_test".to_string(),
            public_key: Some("pk_test".to_string()),
            webhook_secret: webhook_secret.map(String::from),
            timeout_secs: 5,
            max_retries: 1,
        })
        .expect("gateway init should succeed")
    }

    #[test]
    fn webhook_signature_validation_rejects_garbage() {
        let gateway = gateway_with_secret(Some("whsec_test"));
        let payload = br#"{"paymentStatus":"successful"}"#;
        assert!(!gateway.verify_webhook_signature(payload, Some("invalid_signature")));
        assert!(!gateway.verify_webhook_signature(payload, None));
    }

    #[test]
    fn webhook_signature_validation_accepts_valid_hmac() {
        let gateway = gateway_with_secret(Some("whsec_test"));
        let payload = br#"{"paymentStatus":"successful"}"#;
        let mut mac = Hmac::<Sha512>::new_from_slice(b"whsec_test").unwrap();
        mac.update(payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(gateway.verify_webhook_signature(payload, Some(&signature)));
        // "sha512=" prefix is stripped before comparison
        assert!(gateway.verify_webhook_signature(payload, Some(&format!("sha512={}", signature))));
    }

    #[test]
    fn webhook_signature_skipped_without_configured_secret() {
        let gateway = gateway_with_secret(None);
        let payload = br#"{"paymentStatus":"successful"}"#;
        assert!(gateway.verify_webhook_signature(payload, None));
    }

    #[test]
    fn webhook_payload_normalizes_camel_case() {
        let gateway = gateway_with_secret(Some("whsec_test"));
        let payload = serde_json::json!({
            "transactionReference": "ERC-123",
            "paymentReference": "PAY_abc",
            "amount": 1498.0,
            "currency": "NGN",
            "paymentMethod": "card",
            "paymentStatus": "successful",
            "paidAt": "2026-02-12T00:00:00Z"
        });

        let parsed = gateway.parse_webhook_payload(&payload).expect("parse");
        assert_eq!(parsed.transaction_reference, "ERC-123");
        assert_eq!(parsed.payment_reference.as_deref(), Some("PAY_abc"));
        assert_eq!(parsed.payment_status, GatewayPaymentStatus::Successful);
        assert_eq!(parsed.payment_method.as_deref(), Some("card"));
    }

    #[test]
    fn webhook_payload_normalizes_snake_case() {
        let gateway = gateway_with_secret(Some("whsec_test"));
        let payload = serde_json::json!({
            "reference": "ERC-456",
            "payment_reference": "PAY_def",
            "status": "failed",
            "payment_method": "bank-transfer",
            "customer": {"email": "ada@example.com"}
        });

        let parsed = gateway.parse_webhook_payload(&payload).expect("parse");
        assert_eq!(parsed.transaction_reference, "ERC-456");
        assert_eq!(parsed.payment_status, GatewayPaymentStatus::Failed);
        assert_eq!(parsed.customer_email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn webhook_payload_requires_reference() {
        let gateway = gateway_with_secret(Some("whsec_test"));
        let payload = serde_json::json!({"paymentStatus": "successful"});
        assert!(gateway.parse_webhook_payload(&payload).is_err());
    }

    #[test]
    fn envelope_deserializes_gateway_response() {
        let json = serde_json::json!({
            "requestSuccessful": true,
            "responseMessage": "success",
            "responseCode": "success",
            "responseBody": {
                "checkoutUrl": "https://checkout.ercaspay.com/pay/abc",
                "transactionReference": "ERC-789"
            }
        });
        let envelope: ErcasPayEnvelope<ErcasPayInitiateBody> =
            serde_json::from_value(json).expect("deserialize");
        assert!(envelope.request_successful);
        let body = envelope.response_body.unwrap();
        assert_eq!(body.transaction_reference, "ERC-789");
    }
}
