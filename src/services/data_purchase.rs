//! Data Purchase Orchestrator
//!
//! The state-machine core: decides, for a given transaction, whether to
//! trigger delivery, mark failure, or allow retry. Every status move is a
//! conditional update against the transactions table. The claim pattern
//! closes the race where two handlers observe `payment_completed` at the
//! same time, because only one of them gets a row back from the claim.

use crate::database::catalog_repository::CatalogRepository;
use crate::database::transaction_repository::{Transaction, TransactionRepository};
use crate::delivery::error::DeliveryError;
use crate::delivery::types::DataPurchaseRequest;
use crate::delivery::vendor::DataVendor;
use crate::error::{AppError, DomainError};
use crate::validation::Network;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Transaction Status State Machine
// ============================================================================

/// Transaction lifecycle status.
///
/// `payment_completed` / `payment_failed` are payment-only milestones,
/// distinct from the delivery outcome carried by `processing` /
/// `completed` / `failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created, payment not yet confirmed
    Pending,
    /// Gateway confirmed payment; delivery not yet attempted
    PaymentCompleted,
    /// Gateway reported the payment as failed
    PaymentFailed,
    /// Delivery attempt in flight
    Processing,
    /// Bundle delivered; terminal
    Completed,
    /// Delivery failed; recoverable via retry
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::PaymentCompleted => "payment_completed",
            TransactionStatus::PaymentFailed => "payment_failed",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn valid_transitions(&self) -> Vec<TransactionStatus> {
        match self {
            TransactionStatus::Pending => vec![
                TransactionStatus::PaymentCompleted,
                TransactionStatus::PaymentFailed,
                TransactionStatus::Processing,
            ],
            TransactionStatus::PaymentCompleted => vec![TransactionStatus::Processing],
            TransactionStatus::Processing => {
                vec![TransactionStatus::Completed, TransactionStatus::Failed]
            }
            // Retry resets a failed delivery back to the paid milestone
            TransactionStatus::Failed => vec![TransactionStatus::PaymentCompleted],
            TransactionStatus::PaymentFailed => vec![],
            TransactionStatus::Completed => vec![],
        }
    }

    /// `completed` is the only hard-terminal state; `failed` is terminal
    /// only until a retry is requested.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed)
    }

    pub fn allows_retry(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Failed | TransactionStatus::PaymentCompleted
        )
    }

    /// Whether a delivery attempt may claim the transaction from this state
    pub fn allows_delivery(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Pending | TransactionStatus::PaymentCompleted
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "payment_completed" => Ok(TransactionStatus::PaymentCompleted),
            "payment_failed" => Ok(TransactionStatus::PaymentFailed),
            "processing" => Ok(TransactionStatus::Processing),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            _ => Err(()),
        }
    }
}

// ============================================================================
// Delivery Outcome
// ============================================================================

/// Result of one delivery attempt, persisted and surfaced to clients
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub transaction_id: Uuid,
    pub provider_reference: Option<String>,
    pub error: Option<String>,
    pub should_retry: bool,
}

impl DeliveryOutcome {
    fn succeeded(transaction_id: Uuid, provider_reference: String) -> Self {
        Self {
            success: true,
            transaction_id,
            provider_reference: Some(provider_reference),
            error: None,
            should_retry: false,
        }
    }

    fn failed(transaction_id: Uuid, error: String, should_retry: bool) -> Self {
        Self {
            success: false,
            transaction_id,
            provider_reference: None,
            error: Some(error),
            should_retry,
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct DataPurchaseService {
    transactions: Arc<TransactionRepository>,
    catalog: Arc<CatalogRepository>,
    vendor: Arc<dyn DataVendor>,
}

impl DataPurchaseService {
    pub fn new(
        transactions: Arc<TransactionRepository>,
        catalog: Arc<CatalogRepository>,
        vendor: Arc<dyn DataVendor>,
    ) -> Self {
        Self {
            transactions,
            catalog,
            vendor,
        }
    }

    /// Attempt delivery for a transaction whose payment is settled (or which
    /// is being driven synchronously while still `pending`).
    pub async fn process(&self, transaction_id: Uuid) -> Result<DeliveryOutcome, AppError> {
        let transaction = self
            .transactions
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::TransactionNotFound {
                    transaction_id: transaction_id.to_string(),
                })
            })?;

        // Re-entrant attempts on a finished transaction report the existing
        // provider reference instead of re-calling the aggregator.
        if transaction.status == TransactionStatus::Completed.as_str() {
            info!(transaction_id = %transaction_id, "transaction already completed");
            return Ok(DeliveryOutcome::succeeded(
                transaction_id,
                transaction.provider_reference.clone().unwrap_or_default(),
            ));
        }

        // Only deliverable states may proceed; everything else is a conflict
        // reported without mutating the row.
        let status = TransactionStatus::from_str(&transaction.status).ok();
        if !status.map(|s| s.allows_delivery()).unwrap_or(false) {
            return Err(AppError::domain(DomainError::InvalidTransactionStatus {
                current: transaction.status,
                operation: "purchase data".to_string(),
            }));
        }

        let route = match self.catalog.find_active_route(transaction.data_plan_id).await? {
            Some(route) => route,
            None => {
                // No plan-to-provider mapping: permanent failure, no retry
                self.mark_failed(transaction_id, "Provider mapping not found")
                    .await;
                return Err(AppError::domain(DomainError::ProviderMappingNotFound {
                    plan_id: transaction.data_plan_id.to_string(),
                }));
            }
        };

        if !route.provider.is_active {
            // Retryable once the provider is re-activated
            self.mark_failed(transaction_id, "Provider is inactive").await;
            return Err(AppError::domain(DomainError::ProviderUnavailable {
                provider: route.provider.name.clone(),
            }));
        }

        // Claim the transaction. Zero rows back means another handler won
        // the race (or the status does not allow delivery); never proceed.
        let claimed = self
            .transactions
            .claim_for_delivery(transaction_id, route.provider.id)
            .await?;

        let claimed = match claimed {
            Some(tx) => tx,
            None => {
                // Re-read to distinguish "already done" from a genuine conflict
                let current = self.transactions.find_by_id(transaction_id).await?;
                if let Some(current) = &current {
                    if current.status == TransactionStatus::Completed.as_str() {
                        return Ok(DeliveryOutcome::succeeded(
                            transaction_id,
                            current.provider_reference.clone().unwrap_or_default(),
                        ));
                    }
                }
                let status = current.map(|t| t.status).unwrap_or_default();
                warn!(
                    transaction_id = %transaction_id,
                    status = %status,
                    "delivery claim lost; transaction not in a deliverable state"
                );
                return Err(AppError::domain(DomainError::InvalidTransactionStatus {
                    current: status,
                    operation: "purchase data".to_string(),
                }));
            }
        };

        self.submit_to_vendor(&claimed, &route.mapping.provider_plan_id)
            .await
    }

    /// Retry a failed (or paid-but-undelivered) transaction.
    /// Any other source state is rejected.
    pub async fn retry(&self, transaction_id: Uuid) -> Result<DeliveryOutcome, AppError> {
        let transaction = self
            .transactions
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::TransactionNotFound {
                    transaction_id: transaction_id.to_string(),
                })
            })?;

        let status = TransactionStatus::from_str(&transaction.status).ok();
        if !status.map(|s| s.allows_retry()).unwrap_or(false) {
            return Err(AppError::domain(DomainError::InvalidTransactionStatus {
                current: transaction.status,
                operation: "retry data purchase".to_string(),
            }));
        }

        // Reset to the paid milestone, then re-enter the delivery path
        let reset = self
            .transactions
            .transition_status(
                transaction_id,
                TransactionStatus::PaymentCompleted.as_str(),
                &[
                    TransactionStatus::Failed.as_str(),
                    TransactionStatus::PaymentCompleted.as_str(),
                ],
            )
            .await?;

        if reset.is_none() {
            // Status changed between the read and the reset
            let current = self
                .transactions
                .find_by_id(transaction_id)
                .await?
                .map(|t| t.status)
                .unwrap_or_default();
            return Err(AppError::domain(DomainError::InvalidTransactionStatus {
                current,
                operation: "retry data purchase".to_string(),
            }));
        }

        info!(transaction_id = %transaction_id, "retrying data purchase");
        self.process(transaction_id).await
    }

    async fn submit_to_vendor(
        &self,
        transaction: &Transaction,
        provider_plan_id: &str,
    ) -> Result<DeliveryOutcome, AppError> {
        let network = match Network::from_str(&transaction.network) {
            Ok(network) => network,
            Err(_) => {
                self.mark_failed(transaction.id, "Unknown network on transaction")
                    .await;
                return Ok(DeliveryOutcome::failed(
                    transaction.id,
                    format!("Unsupported network '{}'", transaction.network),
                    false,
                ));
            }
        };

        let vendor_plan_id = match provider_plan_id.parse::<i64>() {
            Ok(id) => id,
            Err(_) => {
                self.mark_failed(transaction.id, "Malformed provider plan id")
                    .await;
                return Ok(DeliveryOutcome::failed(
                    transaction.id,
                    format!("Malformed provider plan id '{}'", provider_plan_id),
                    false,
                ));
            }
        };

        let request = DataPurchaseRequest {
            network,
            phone_number: transaction.phone_number.clone(),
            vendor_plan_id,
            transaction_id: transaction.id,
            ported_number: true,
        };

        match self.vendor.purchase_data(&request).await {
            Ok(receipt) => {
                let completed = self
                    .transactions
                    .complete_delivery(transaction.id, &receipt.provider_reference, receipt.raw)
                    .await?;

                if completed.is_none() {
                    // The row left `processing` underneath us; the vendor
                    // call still went through, so log loudly but report the
                    // reference we got.
                    error!(
                        transaction_id = %transaction.id,
                        provider_reference = %receipt.provider_reference,
                        "delivery completed but transaction was no longer processing"
                    );
                }

                info!(
                    transaction_id = %transaction.id,
                    provider_reference = %receipt.provider_reference,
                    "data purchase completed"
                );
                Ok(DeliveryOutcome::succeeded(
                    transaction.id,
                    receipt.provider_reference,
                ))
            }
            Err(err) => {
                let should_retry = err.retryable();
                self.record_vendor_failure(transaction.id, &err).await;
                warn!(
                    transaction_id = %transaction.id,
                    error = %err,
                    should_retry,
                    "data purchase failed"
                );
                Ok(DeliveryOutcome::failed(
                    transaction.id,
                    err.to_string(),
                    should_retry,
                ))
            }
        }
    }

    async fn record_vendor_failure(&self, transaction_id: Uuid, err: &DeliveryError) {
        let detail = serde_json::json!({
            "error": err.to_string(),
            "retryable": err.retryable(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Err(db_err) = self.transactions.fail_delivery(transaction_id, detail).await {
            error!(
                transaction_id = %transaction_id,
                error = %db_err,
                "failed to persist delivery failure"
            );
        }
    }

    async fn mark_failed(&self, transaction_id: Uuid, reason: &str) {
        let detail = serde_json::json!({
            "error": reason,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Err(db_err) = self.transactions.fail_delivery(transaction_id, detail).await {
            error!(
                transaction_id = %transaction_id,
                error = %db_err,
                "failed to persist failure state"
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_allows_payment_outcomes_and_direct_delivery() {
        let transitions = TransactionStatus::Pending.valid_transitions();
        assert!(transitions.contains(&TransactionStatus::PaymentCompleted));
        assert!(transitions.contains(&TransactionStatus::PaymentFailed));
        assert!(transitions.contains(&TransactionStatus::Processing));
    }

    #[test]
    fn payment_completed_only_moves_to_processing() {
        assert_eq!(
            TransactionStatus::PaymentCompleted.valid_transitions(),
            vec![TransactionStatus::Processing]
        );
    }

    #[test]
    fn processing_resolves_to_completed_or_failed() {
        let transitions = TransactionStatus::Processing.valid_transitions();
        assert!(transitions.contains(&TransactionStatus::Completed));
        assert!(transitions.contains(&TransactionStatus::Failed));
        assert_eq!(transitions.len(), 2);
    }

    #[test]
    fn completed_is_the_only_hard_terminal_state() {
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Completed.valid_transitions().is_empty());

        // failed stays recoverable until a retry exhausts it
        assert!(!TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Failed
            .valid_transitions()
            .contains(&TransactionStatus::PaymentCompleted));
    }

    #[test]
    fn retry_is_limited_to_failed_and_payment_completed() {
        assert!(TransactionStatus::Failed.allows_retry());
        assert!(TransactionStatus::PaymentCompleted.allows_retry());

        assert!(!TransactionStatus::Pending.allows_retry());
        assert!(!TransactionStatus::Processing.allows_retry());
        assert!(!TransactionStatus::Completed.allows_retry());
        assert!(!TransactionStatus::PaymentFailed.allows_retry());
    }

    #[test]
    fn delivery_claims_only_from_pending_or_payment_completed() {
        assert!(TransactionStatus::Pending.allows_delivery());
        assert!(TransactionStatus::PaymentCompleted.allows_delivery());

        assert!(!TransactionStatus::Processing.allows_delivery());
        assert!(!TransactionStatus::Completed.allows_delivery());
        assert!(!TransactionStatus::Failed.allows_delivery());
        assert!(!TransactionStatus::PaymentFailed.allows_delivery());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::PaymentCompleted,
            TransactionStatus::PaymentFailed,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
        ] {
            assert_eq!(
                TransactionStatus::from_str(status.as_str()),
                Ok(status),
                "round trip failed for {status}"
            );
        }
        assert!(TransactionStatus::from_str("refunded").is_err());
    }

    #[test]
    fn outcome_constructors_set_retry_flag() {
        let id = Uuid::new_v4();
        let ok = DeliveryOutcome::succeeded(id, "12345".to_string());
        assert!(ok.success);
        assert_eq!(ok.provider_reference.as_deref(), Some("12345"));

        let failed = DeliveryOutcome::failed(id, "timeout".to_string(), true);
        assert!(!failed.success);
        assert!(failed.should_retry);
    }
}
