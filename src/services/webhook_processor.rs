//! Webhook processing service.
//!
//! Authenticates and de-duplicates inbound callbacks, records the audit
//! trail, and drives the transaction state machine. The delivery call
//! triggered by a successful payment is spawned, never awaited: the
//! webhook response goes back to the gateway as soon as payment-state
//! persistence completes, and the delivery outcome is observable only via
//! status polls.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::payment_repository::PaymentRepository;
use crate::database::transaction_repository::TransactionRepository;
use crate::database::webhook_repository::WebhookRepository;
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::GatewayPaymentStatus;
use crate::services::data_purchase::{DataPurchaseService, TransactionStatus};

pub const GATEWAY_SOURCE: &str = "ercaspay";
pub const VENDOR_SOURCE: &str = "gladtidings";

#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Already processed")]
    AlreadyProcessed,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Payment not found for reference {0}")]
    PaymentNotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<crate::database::error::DatabaseError> for WebhookProcessorError {
    fn from(err: crate::database::error::DatabaseError) -> Self {
        WebhookProcessorError::DatabaseError(err.to_string())
    }
}

pub struct WebhookProcessor {
    webhooks: Arc<WebhookRepository>,
    payments: Arc<PaymentRepository>,
    transactions: Arc<TransactionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    purchases: Arc<DataPurchaseService>,
}

impl WebhookProcessor {
    pub fn new(
        webhooks: Arc<WebhookRepository>,
        payments: Arc<PaymentRepository>,
        transactions: Arc<TransactionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        purchases: Arc<DataPurchaseService>,
    ) -> Self {
        Self {
            webhooks,
            payments,
            transactions,
            gateway,
            purchases,
        }
    }

    /// Process a payment-gateway callback. `raw_body` is the exact bytes the
    /// gateway sent; the HMAC is computed over them, not a re-serialization.
    pub async fn process_gateway_webhook(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), WebhookProcessorError> {
        let payload: JsonValue = serde_json::from_slice(raw_body)
            .map_err(|e| WebhookProcessorError::InvalidPayload(format!("invalid JSON: {}", e)))?;

        let event_type = payload
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("payment_update")
            .to_string();

        if !self.gateway.verify_webhook_signature(raw_body, signature) {
            error!(source = GATEWAY_SOURCE, "invalid webhook signature");
            // Audit the rejected attempt; the reference is best-effort here
            let reference = self
                .gateway
                .parse_webhook_payload(&payload)
                .map(|p| p.transaction_reference)
                .unwrap_or_else(|_| "unknown".to_string());
            self.webhooks
                .record_rejected(GATEWAY_SOURCE, &event_type, &reference, payload.clone())
                .await?;
            return Err(WebhookProcessorError::InvalidSignature);
        }

        let parsed = self
            .gateway
            .parse_webhook_payload(&payload)
            .map_err(|e| WebhookProcessorError::InvalidPayload(e.to_string()))?;

        // Idempotency: a reference we already processed returns success
        // without touching Payment or Transaction again.
        if self
            .webhooks
            .find_processed(GATEWAY_SOURCE, &parsed.transaction_reference)
            .await?
            .is_some()
        {
            info!(
                reference = %parsed.transaction_reference,
                "webhook already processed, skipping"
            );
            return Err(WebhookProcessorError::AlreadyProcessed);
        }

        let audit = self
            .webhooks
            .record(
                GATEWAY_SOURCE,
                &event_type,
                &parsed.transaction_reference,
                None,
                payload.clone(),
            )
            .await?;

        let payment = match self
            .payments
            .find_by_gateway_reference(&parsed.transaction_reference)
            .await?
        {
            Some(payment) => payment,
            None => {
                // A callback for an unknown payment is audited but never
                // retried by the gateway
                warn!(
                    reference = %parsed.transaction_reference,
                    "payment not found for webhook reference"
                );
                self.webhooks.mark_failed(audit.id).await?;
                return Err(WebhookProcessorError::PaymentNotFound(
                    parsed.transaction_reference,
                ));
            }
        };

        let payment_status = match parsed.payment_status {
            GatewayPaymentStatus::Successful => Some("completed"),
            GatewayPaymentStatus::Failed => Some("failed"),
            _ => None,
        };

        if let Some(new_status) = payment_status {
            self.payments
                .record_gateway_result(payment.id, new_status, parsed.payment_method.as_deref())
                .await?;

            let transaction_status = if new_status == "completed" {
                TransactionStatus::PaymentCompleted
            } else {
                TransactionStatus::PaymentFailed
            };

            let updated = self
                .transactions
                .transition_status(
                    payment.transaction_id,
                    transaction_status.as_str(),
                    &[TransactionStatus::Pending.as_str()],
                )
                .await?;
            if updated.is_none() {
                warn!(
                    transaction_id = %payment.transaction_id,
                    target = %transaction_status,
                    "transaction was not pending; payment milestone not applied"
                );
            }

            info!(
                transaction_id = %payment.transaction_id,
                payment_status = %new_status,
                "payment webhook applied"
            );
        } else {
            info!(
                reference = %parsed.transaction_reference,
                raw_status = %parsed.raw_status,
                "gateway status not final, leaving payment untouched"
            );
        }

        self.webhooks.mark_processed(audit.id).await?;

        // Fire-and-forget delivery: the webhook response must not wait on the
        // aggregator, and a delivery failure must not affect it.
        if parsed.payment_status == GatewayPaymentStatus::Successful {
            let purchases = Arc::clone(&self.purchases);
            let transaction_id = payment.transaction_id;
            tokio::spawn(async move {
                match purchases.process(transaction_id).await {
                    Ok(outcome) if outcome.success => {
                        info!(
                            transaction_id = %transaction_id,
                            provider_reference = ?outcome.provider_reference,
                            "post-payment data purchase succeeded"
                        );
                    }
                    Ok(outcome) => {
                        error!(
                            transaction_id = %transaction_id,
                            error = ?outcome.error,
                            should_retry = outcome.should_retry,
                            "post-payment data purchase failed"
                        );
                    }
                    Err(e) => {
                        error!(
                            transaction_id = %transaction_id,
                            error = %e,
                            "unexpected error during post-payment data purchase"
                        );
                    }
                }
            });
        }

        Ok(())
    }

    /// Process an aggregator delivery-status callback. No signature scheme
    /// exists for this source; the payload is recorded verbatim.
    pub async fn process_vendor_webhook(
        &self,
        payload: &JsonValue,
    ) -> Result<(), WebhookProcessorError> {
        let event_type = payload
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("data_delivery")
            .to_string();

        let reference = payload
            .get("reference")
            .or_else(|| payload.get("transaction_id"))
            .and_then(|v| match v {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let Some(reference) = reference else {
            warn!("vendor webhook without reference, recording only");
            let audit = self
                .webhooks
                .record(VENDOR_SOURCE, &event_type, "unknown", None, payload.clone())
                .await?;
            self.webhooks.mark_failed(audit.id).await?;
            return Ok(());
        };

        let audit = self
            .webhooks
            .record(VENDOR_SOURCE, &event_type, &reference, None, payload.clone())
            .await?;

        let raw_status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_lowercase();

        let status = match raw_status.as_str() {
            "successful" | "completed" | "success" => TransactionStatus::Completed,
            "failed" => TransactionStatus::Failed,
            _ => TransactionStatus::Processing,
        };

        let updated = self
            .transactions
            .update_from_vendor_callback(&reference, status.as_str(), payload.clone())
            .await?;

        match updated {
            Some(transaction) => {
                info!(
                    transaction_id = %transaction.id,
                    status = %status,
                    "vendor delivery callback applied"
                );
            }
            None => {
                warn!(
                    reference = %reference,
                    "vendor callback did not match any transaction"
                );
            }
        }

        self.webhooks.mark_processed(audit.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_stable() {
        assert_eq!(
            WebhookProcessorError::InvalidSignature.to_string(),
            "Invalid signature"
        );
        assert_eq!(
            WebhookProcessorError::AlreadyProcessed.to_string(),
            "Already processed"
        );
        assert_eq!(
            WebhookProcessorError::PaymentNotFound("ERC-1".to_string()).to_string(),
            "Payment not found for reference ERC-1"
        );
    }

    #[test]
    fn vendor_status_mapping_matches_contract() {
        for (raw, expected) in [
            ("successful", TransactionStatus::Completed),
            ("completed", TransactionStatus::Completed),
            ("failed", TransactionStatus::Failed),
            ("queued", TransactionStatus::Processing),
            ("", TransactionStatus::Processing),
        ] {
            let status = match raw {
                "successful" | "completed" | "success" => TransactionStatus::Completed,
                "failed" => TransactionStatus::Failed,
                _ => TransactionStatus::Processing,
            };
            assert_eq!(status, expected, "mapping failed for '{raw}'");
        }
    }

    #[test]
    fn gateway_statuses_map_to_payment_milestones() {
        let to_milestone = |s: GatewayPaymentStatus| match s {
            GatewayPaymentStatus::Successful => Some(TransactionStatus::PaymentCompleted),
            GatewayPaymentStatus::Failed => Some(TransactionStatus::PaymentFailed),
            _ => None,
        };

        assert_eq!(
            to_milestone(GatewayPaymentStatus::Successful),
            Some(TransactionStatus::PaymentCompleted)
        );
        assert_eq!(
            to_milestone(GatewayPaymentStatus::Failed),
            Some(TransactionStatus::PaymentFailed)
        );
        assert_eq!(to_milestone(GatewayPaymentStatus::Pending), None);
        assert_eq!(to_milestone(GatewayPaymentStatus::Unknown), None);
    }
}
