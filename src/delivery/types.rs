use crate::validation::Network;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Vendor-neutral purchase request produced by the orchestrator
#[derive(Debug, Clone)]
pub struct DataPurchaseRequest {
    pub network: Network,
    /// Target recipient; any accepted input format, reformatted per vendor
    pub phone_number: String,
    /// The vendor's own plan identifier (from the provider plan mapping)
    pub vendor_plan_id: i64,
    /// Our transaction id, used to derive the vendor correlation token
    pub transaction_id: Uuid,
    /// Number retained across a network switch; vendors need this flag to
    /// route correctly
    pub ported_number: bool,
}

/// Vendor-neutral receipt for a submitted purchase
#[derive(Debug, Clone)]
pub struct VendorReceipt {
    /// The vendor's own transaction id, stamped as `provider_reference`
    pub provider_reference: String,
    /// Vendor-reported status string (already known successful)
    pub status: String,
    /// Vendor balance after the purchase, when reported
    pub balance_after: Option<String>,
    /// Full response body, persisted as `provider_response`
    pub raw: JsonValue,
}

/// Vendor account balance, surfaced through the health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorBalance {
    pub balance: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "NGN".to_string()
}
