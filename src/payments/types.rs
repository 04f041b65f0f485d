use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Hosted-checkout initiation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Decimal string, e.g. "1498.00"
    pub amount: String,
    pub currency: String,
    /// Merchant-side payment reference (stamped on the transaction)
    pub payment_reference: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    /// Where the gateway redirects the end user after checkout
    pub redirect_url: String,
    pub description: String,
}

/// Hosted-checkout session returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    /// Gateway-assigned transaction reference; the webhook join key
    pub gateway_reference: String,
}

/// Payment status as reported by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Successful,
    Failed,
    Pending,
    Unknown,
}

impl GatewayPaymentStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "successful" | "success" | "paid" | "completed" => GatewayPaymentStatus::Successful,
            "failed" | "declined" => GatewayPaymentStatus::Failed,
            "pending" | "initiated" => GatewayPaymentStatus::Pending,
            _ => GatewayPaymentStatus::Unknown,
        }
    }
}

/// Normalized webhook payload.
///
/// The gateway sends field names in both camelCase and snake_case depending
/// on the event source; `parse_webhook_payload` folds the variants into this
/// one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayWebhookPayload {
    /// Gateway's own transaction reference (joins to Payment)
    pub transaction_reference: String,
    /// Merchant payment reference, when echoed back
    pub payment_reference: Option<String>,
    pub amount: Option<String>,
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_status: GatewayPaymentStatus,
    pub raw_status: String,
    pub paid_at: Option<String>,
    pub customer_email: Option<String>,
    /// Untouched payload, persisted in the webhook audit row
    pub raw: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_parses_variants() {
        assert_eq!(
            GatewayPaymentStatus::parse("SUCCESSFUL"),
            GatewayPaymentStatus::Successful
        );
        assert_eq!(
            GatewayPaymentStatus::parse("failed"),
            GatewayPaymentStatus::Failed
        );
        assert_eq!(
            GatewayPaymentStatus::parse("pending"),
            GatewayPaymentStatus::Pending
        );
        assert_eq!(
            GatewayPaymentStatus::parse("reversed"),
            GatewayPaymentStatus::Unknown
        );
    }

    #[test]
    fn checkout_request_serializes_to_json() {
        let request = CheckoutRequest {
            amount: "1498.00".to_string(),
            currency: "NGN".to_string(),
            payment_reference: "PAY_abc_123".to_string(),
            customer_name: "Ada".to_string(),
            customer_email: "ada@example.com".to_string(),
            customer_phone: "08031234567".to_string(),
            redirect_url: "https://shop.example.com/payment/callback".to_string(),
            description: "Data purchase".to_string(),
        };
        let json = serde_json::to_value(&request).expect("serialization should succeed");
        assert_eq!(json["currency"], "NGN");
        assert_eq!(json["payment_reference"], "PAY_abc_123");
    }
}
