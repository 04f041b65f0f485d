//! GladTidings data aggregator client.
//!
//! Submits bundle purchases to the aggregator's `/v2/api/data/` endpoint.
//! Phone numbers are reformatted to the aggregator's expected local format
//! and network names mapped to its numeric codes before the call.

use crate::delivery::error::{DeliveryError, DeliveryResult};
use crate::delivery::types::{DataPurchaseRequest, VendorBalance, VendorReceipt};
use crate::delivery::vendor::DataVendor;
use crate::validation::Network;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct GladTidingsConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for GladTidingsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.gladtidingsdata.com".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl GladTidingsConfig {
    pub fn from_env() -> DeliveryResult<Self> {
        let api_key = std::env::var("GLADTIDINGS_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(DeliveryError::InvalidResponse {
                message: "GLADTIDINGS_API_KEY environment variable is required".to_string(),
            });
        }

        Ok(Self {
            base_url: std::env::var("GLADTIDINGS_BASE_URL")
                .unwrap_or_else(|_| "https://api.gladtidingsdata.com".to_string()),
            api_key,
            timeout_secs: std::env::var("GLADTIDINGS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("GLADTIDINGS_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

pub struct GladTidingsClient {
    config: GladTidingsConfig,
    client: Client,
}

impl GladTidingsClient {
    pub fn new(config: GladTidingsConfig) -> DeliveryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeliveryError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    pub fn from_env() -> DeliveryResult<Self> {
        Self::new(GladTidingsConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// The aggregator's numeric code for a network
    pub fn network_code(network: Network) -> u8 {
        match network {
            Network::Mtn => 1,
            Network::Glo => 2,
            Network::Airtel => 3,
            Network::NineMobile => 4,
        }
    }

    /// Reformat to the aggregator's expected local format: 11 digits with a
    /// leading zero, country code stripped.
    pub fn format_phone_number(phone: &str) -> String {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

        if let Some(local) = digits.strip_prefix("234") {
            format!("0{}", local)
        } else if digits.starts_with('0') {
            digits
        } else {
            format!("0{}", digits)
        }
    }

    /// Deterministic correlation token sent so the aggregator can
    /// de-duplicate on its end. The millisecond timestamp component makes
    /// successive retries distinct, so the protection only covers duplicate
    /// submission of a single attempt.
    pub fn generate_ident(transaction_id: Uuid) -> String {
        let compact = transaction_id.simple().to_string();
        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut ident = format!("Data{}{}", &compact[..10], timestamp);
        ident.truncate(30);
        ident
    }

    fn mask_phone(phone: &str) -> String {
        if phone.len() < 8 {
            return phone.to_string();
        }
        format!("{}****{}", &phone[..4], &phone[phone.len() - 4..])
    }

    async fn post_with_retry(&self, url: &str, body: &JsonValue) -> DeliveryResult<JsonValue> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            let response = self
                .client
                .post(url)
                .header("Authorization", format!("Token {}", self.config.api_key))
                .json(body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();

                    if status.is_success() {
                        return serde_json::from_str(&text).map_err(|e| {
                            DeliveryError::InvalidResponse {
                                message: format!("invalid JSON from data provider: {}", e),
                            }
                        });
                    }

                    if status.is_server_error() && attempt < self.config.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "data provider server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    let message = extract_error_message(&text)
                        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                    return Err(if status.is_server_error() {
                        DeliveryError::ServiceUnavailable {
                            status: status.as_u16(),
                            message,
                        }
                    } else {
                        DeliveryError::RequestRejected {
                            status: status.as_u16(),
                            message,
                        }
                    });
                }
                Err(e) => {
                    let err = if e.is_timeout() {
                        DeliveryError::Timeout {
                            seconds: self.config.timeout_secs,
                        }
                    } else {
                        DeliveryError::NetworkError {
                            message: e.to_string(),
                        }
                    };
                    last_error = Some(err);
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(DeliveryError::NetworkError {
            message: "data provider request failed".to_string(),
        }))
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed: JsonValue = serde_json::from_str(body).ok()?;
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| parsed.get(*key))
        .and_then(|v| v.as_str())
        .map(String::from)
}

#[async_trait]
impl DataVendor for GladTidingsClient {
    async fn purchase_data(&self, request: &DataPurchaseRequest) -> DeliveryResult<VendorReceipt> {
        let network_code = Self::network_code(request.network);
        let mobile_number = Self::format_phone_number(&request.phone_number);
        let ident = Self::generate_ident(request.transaction_id);

        let body = serde_json::json!({
            "network": network_code,
            "mobile_number": mobile_number,
            "plan": request.vendor_plan_id,
            "Ported_number": request.ported_number,
            "ident": ident,
        });

        info!(
            mobile_number = %Self::mask_phone(&mobile_number),
            plan = request.vendor_plan_id,
            network = %request.network,
            transaction_id = %request.transaction_id,
            "submitting data purchase"
        );

        let raw = self
            .post_with_retry(&self.endpoint("/v2/api/data/"), &body)
            .await?;

        let receipt: GladTidingsDataResponse =
            serde_json::from_value(raw.clone()).map_err(|e| DeliveryError::InvalidResponse {
                message: format!("unexpected data provider response shape: {}", e),
            })?;

        // A non-"successful" body status is a business-level decline even
        // though the HTTP call itself succeeded.
        if !receipt.status.eq_ignore_ascii_case("successful") {
            return Err(DeliveryError::Declined {
                message: receipt
                    .api_response
                    .unwrap_or_else(|| format!("provider status '{}'", receipt.status)),
            });
        }

        info!(
            provider_id = receipt.id,
            transaction_id = %request.transaction_id,
            "data purchase successful"
        );

        Ok(VendorReceipt {
            provider_reference: receipt.id.to_string(),
            status: receipt.status,
            balance_after: receipt.balance_after,
            raw,
        })
    }

    async fn check_balance(&self) -> DeliveryResult<VendorBalance> {
        let response = self
            .client
            .get(self.endpoint("/api/balance/"))
            .header("Authorization", format!("Token {}", self.config.api_key))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout {
                        seconds: self.config.timeout_secs,
                    }
                } else {
                    DeliveryError::NetworkError {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DeliveryError::RequestRejected {
                status: status.as_u16(),
                message: extract_error_message(&text)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            });
        }

        serde_json::from_str(&text).map_err(|e| DeliveryError::InvalidResponse {
            message: format!("invalid balance response: {}", e),
        })
    }

    fn name(&self) -> &'static str {
        "gladtidings"
    }
}

/// Purchase response as the aggregator returns it
#[derive(Debug, Clone, Deserialize)]
pub struct GladTidingsDataResponse {
    pub id: i64,
    #[serde(default)]
    pub ident: Option<String>,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(default)]
    pub api_response: Option<String>,
    #[serde(default)]
    pub balance_after: Option<String>,
    #[serde(default)]
    pub mobile_number: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub plan_amount: Option<String>,
    #[serde(default)]
    pub create_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_codes_match_aggregator_table() {
        assert_eq!(GladTidingsClient::network_code(Network::Mtn), 1);
        assert_eq!(GladTidingsClient::network_code(Network::Glo), 2);
        assert_eq!(GladTidingsClient::network_code(Network::Airtel), 3);
        assert_eq!(GladTidingsClient::network_code(Network::NineMobile), 4);
    }

    #[test]
    fn phone_formatting_produces_local_format() {
        assert_eq!(
            GladTidingsClient::format_phone_number("+2348031234567"),
            "08031234567"
        );
        assert_eq!(
            GladTidingsClient::format_phone_number("2348031234567"),
            "08031234567"
        );
        assert_eq!(
            GladTidingsClient::format_phone_number("08031234567"),
            "08031234567"
        );
        assert_eq!(
            GladTidingsClient::format_phone_number("8031234567"),
            "08031234567"
        );
    }

    #[test]
    fn ident_is_bounded_and_prefixed() {
        let id = Uuid::new_v4();
        let ident = GladTidingsClient::generate_ident(id);
        assert!(ident.starts_with("Data"));
        assert!(ident.len() <= 30);
        assert!(ident.contains(&id.simple().to_string()[..10]));
    }

    #[test]
    fn phone_masking_preserves_edges_only() {
        assert_eq!(
            GladTidingsClient::mask_phone("08031234567"),
            "0803****4567"
        );
        assert_eq!(GladTidingsClient::mask_phone("0803"), "0803");
    }

    #[test]
    fn successful_response_deserializes() {
        let raw = serde_json::json!({
            "id": 987654,
            "ident": "Dataabc123def1708012345678",
            "network": 1,
            "balance_before": "5000.00",
            "balance_after": "3552.00",
            "mobile_number": "08031234567",
            "plan": 167,
            "Status": "successful",
            "api_response": "Dear Customer, You have successfully shared 2GB",
            "plan_network": "MTN",
            "plan_name": "2 GB",
            "plan_amount": "1448.00",
            "create_date": "2026-02-12T00:00:00",
            "Ported_number": true
        });

        let receipt: GladTidingsDataResponse = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(receipt.id, 987654);
        assert_eq!(receipt.status, "successful");
        assert_eq!(receipt.balance_after.as_deref(), Some("3552.00"));
    }

    #[test]
    fn error_message_extraction_checks_known_keys() {
        assert_eq!(
            extract_error_message(r#"{"error":"Insufficient balance"}"#).as_deref(),
            Some("Insufficient balance")
        );
        assert_eq!(
            extract_error_message(r#"{"message":"Invalid plan"}"#).as_deref(),
            Some("Invalid plan")
        );
        assert_eq!(extract_error_message("not json"), None);
    }
}
