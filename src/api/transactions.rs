use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::catalog_repository::CatalogRepository;
use crate::database::transaction_repository::{Transaction, TransactionRepository};
use crate::error::{AppError, DomainError, ValidationError};
use crate::services::data_purchase::DataPurchaseService;
use crate::validation::{validate_phone, Network};

pub struct TransactionsState {
    pub transactions: Arc<TransactionRepository>,
    pub catalog: Arc<CatalogRepository>,
    pub purchases: Arc<DataPurchaseService>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub phone_number: Option<String>,
    pub network: Option<String>,
    pub data_plan_id: Option<Uuid>,
    /// Accepted as a JSON string or number; always compared as a decimal
    pub amount: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub phone_number: String,
    pub network: String,
    pub data_plan_name: String,
    pub amount: String,
    pub status: String,
    pub payment_reference: Option<String>,
    pub provider_reference: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            phone_number: tx.phone_number,
            network: tx.network,
            data_plan_name: tx.data_plan_name,
            amount: tx.amount.to_string(),
            status: tx.status,
            payment_reference: tx.payment_reference,
            provider_reference: tx.provider_reference,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| {
        AppError::validation(ValidationError::MissingField {
            field: field.to_string(),
        })
    })
}

fn parse_amount(value: &JsonValue) -> Result<BigDecimal, AppError> {
    let text = match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        other => {
            return Err(AppError::validation(ValidationError::InvalidAmount {
                amount: other.to_string(),
                reason: "amount must be a decimal string or number".to_string(),
            }))
        }
    };
    BigDecimal::from_str(&text).map_err(|_| {
        AppError::validation(ValidationError::InvalidAmount {
            amount: text,
            reason: "not a valid decimal".to_string(),
        })
    })
}

/// POST /api/transactions
pub async fn create_transaction(
    State(state): State<Arc<TransactionsState>>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<Json<TransactionView>, AppError> {
    let request_id = crate::middleware::error::get_request_id_from_headers(&headers);
    create_transaction_inner(state, payload)
        .await
        .map_err(|e| match request_id {
            Some(id) => e.with_request_id(id),
            None => e,
        })
}

async fn create_transaction_inner(
    state: Arc<TransactionsState>,
    payload: CreateTransactionRequest,
) -> Result<Json<TransactionView>, AppError> {
    let phone_number = require(payload.phone_number, "phone_number")?;
    let network_raw = require(payload.network, "network")?;
    let data_plan_id = require(payload.data_plan_id, "data_plan_id")?;
    let amount = parse_amount(&require(payload.amount, "amount")?)?;

    let network = Network::from_str(&network_raw)?;
    let phone = validate_phone(&phone_number, network)?;

    let plan = state
        .catalog
        .find_plan(data_plan_id)
        .await?
        .ok_or_else(|| {
            AppError::domain(DomainError::DataPlanNotFound {
                plan_id: data_plan_id.to_string(),
            })
        })?;

    if !plan.is_available {
        return Err(AppError::domain(DomainError::DataPlanUnavailable {
            plan_id: data_plan_id.to_string(),
        }));
    }

    // The transaction records the request's amount, which must equal the
    // plan's price at this moment; price drift afterwards is not re-checked.
    if amount != plan.price {
        return Err(AppError::domain(DomainError::AmountMismatch {
            expected: plan.price.to_string(),
            provided: amount.to_string(),
        }));
    }

    let transaction = state
        .transactions
        .create(
            &phone.normalized,
            network.as_str(),
            plan.id,
            &plan.plan_name,
            amount,
        )
        .await?;

    info!(
        transaction_id = %transaction.id,
        network = %network,
        plan = %transaction.data_plan_name,
        "transaction created"
    );

    Ok(Json(transaction.into()))
}

/// GET /api/transactions/{id}/status
pub async fn transaction_status(
    State(state): State<Arc<TransactionsState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionView>, AppError> {
    let transaction = state.transactions.find_by_id(id).await?.ok_or_else(|| {
        AppError::domain(DomainError::TransactionNotFound {
            transaction_id: id.to_string(),
        })
    })?;

    Ok(Json(transaction.into()))
}

#[derive(Debug, Serialize)]
pub struct PurchaseDataResponse {
    pub success: bool,
    pub transaction_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_retry: Option<bool>,
    pub message: String,
}

/// POST /api/transactions/{id}/purchase-data
///
/// Synchronous delivery attempt; the client gets the aggregator outcome in
/// the response rather than via a later status poll.
pub async fn purchase_data(
    State(state): State<Arc<TransactionsState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.purchases.process(id).await?;

    if outcome.success {
        Ok((
            StatusCode::OK,
            Json(PurchaseDataResponse {
                success: true,
                transaction_id: id,
                status: "completed".to_string(),
                provider_reference: outcome.provider_reference,
                error: None,
                can_retry: None,
                message: "Data purchase completed successfully".to_string(),
            }),
        ))
    } else {
        Ok((
            StatusCode::BAD_GATEWAY,
            Json(PurchaseDataResponse {
                success: false,
                transaction_id: id,
                status: "failed".to_string(),
                provider_reference: None,
                error: outcome.error,
                can_retry: Some(outcome.should_retry),
                message: "Data purchase failed".to_string(),
            }),
        ))
    }
}

/// POST /api/transactions/{id}/retry-data-purchase
pub async fn retry_data_purchase(
    State(state): State<Arc<TransactionsState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state.purchases.retry(id).await?;

    if outcome.success {
        Ok((
            StatusCode::OK,
            Json(PurchaseDataResponse {
                success: true,
                transaction_id: id,
                status: "completed".to_string(),
                provider_reference: outcome.provider_reference,
                error: None,
                can_retry: None,
                message: "Data purchase retry successful".to_string(),
            }),
        ))
    } else {
        Ok((
            StatusCode::BAD_REQUEST,
            Json(PurchaseDataResponse {
                success: false,
                transaction_id: id,
                status: "failed".to_string(),
                provider_reference: None,
                error: outcome.error,
                can_retry: Some(outcome.should_retry),
                message: "Data purchase retry failed".to_string(),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_parses_from_string_and_number() {
        let from_string = parse_amount(&serde_json::json!("1498.00")).unwrap();
        let from_number = parse_amount(&serde_json::json!(1498.0)).unwrap();
        assert_eq!(from_string, BigDecimal::from_str("1498.00").unwrap());
        assert_eq!(from_number, BigDecimal::from_str("1498").unwrap());
    }

    #[test]
    fn amount_rejects_non_numeric_values() {
        assert!(parse_amount(&serde_json::json!("two thousand")).is_err());
        assert!(parse_amount(&serde_json::json!({"value": 100})).is_err());
        assert!(parse_amount(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn require_reports_missing_field() {
        let err = require::<String>(None, "phone_number").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.user_message().contains("phone_number"));
    }
}
