use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::payment_repository::PaymentRepository;
use crate::database::transaction_repository::TransactionRepository;
use crate::error::{AppError, DomainError, ValidationError};
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::CheckoutRequest;
use crate::services::data_purchase::TransactionStatus;

pub struct PaymentsState {
    pub transactions: Arc<TransactionRepository>,
    pub payments: Arc<PaymentRepository>,
    pub gateway: Arc<dyn PaymentGateway>,
    /// Base URL the gateway redirects the customer back to after checkout
    pub frontend_url: String,
}

#[derive(Debug, Deserialize)]
pub struct InitializePaymentRequest {
    pub transaction_id: Option<Uuid>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InitializePaymentResponse {
    pub payment_url: String,
    pub payment_reference: String,
    pub ercaspay_reference: String,
    pub amount: String,
    pub currency: String,
}

/// POST /api/payments/initialize
pub async fn initialize_payment(
    State(state): State<Arc<PaymentsState>>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<InitializePaymentRequest>,
) -> Result<Json<InitializePaymentResponse>, AppError> {
    let request_id = crate::middleware::error::get_request_id_from_headers(&headers);
    initialize_payment_inner(state, payload)
        .await
        .map_err(|e| match request_id {
            Some(id) => e.with_request_id(id),
            None => e,
        })
}

async fn initialize_payment_inner(
    state: Arc<PaymentsState>,
    payload: InitializePaymentRequest,
) -> Result<Json<InitializePaymentResponse>, AppError> {
    let transaction_id = payload.transaction_id.ok_or_else(|| {
        AppError::validation(ValidationError::MissingField {
            field: "transaction_id".to_string(),
        })
    })?;
    let customer_email = payload
        .customer_email
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            AppError::validation(ValidationError::MissingField {
                field: "customer_email".to_string(),
            })
        })?;

    let transaction = state
        .transactions
        .find_by_id(transaction_id)
        .await?
        .ok_or_else(|| {
            AppError::domain(DomainError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })
        })?;

    // Payment may be initiated only from exactly `pending`
    if transaction.status != TransactionStatus::Pending.as_str() {
        return Err(AppError::domain(DomainError::InvalidTransactionStatus {
            current: transaction.status,
            operation: "initialize payment".to_string(),
        }));
    }

    let payment_reference = format!(
        "PAY_{}_{}",
        transaction.id,
        chrono::Utc::now().timestamp_millis()
    );

    let session = state
        .gateway
        .initiate_payment(CheckoutRequest {
            amount: transaction.amount.to_string(),
            currency: "NGN".to_string(),
            payment_reference: payment_reference.clone(),
            customer_name: payload
                .customer_name
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "Customer".to_string()),
            customer_email,
            customer_phone: transaction.phone_number.clone(),
            redirect_url: format!(
                "{}/payment/callback?reference={}",
                state.frontend_url, payment_reference
            ),
            description: format!(
                "Data purchase for {} - {}",
                transaction.phone_number, transaction.data_plan_name
            ),
        })
        .await?;

    state
        .payments
        .create(
            transaction.id,
            &session.gateway_reference,
            transaction.amount.clone(),
        )
        .await?;

    state
        .transactions
        .set_payment_reference(transaction.id, &payment_reference)
        .await?;

    info!(
        transaction_id = %transaction.id,
        payment_reference = %payment_reference,
        gateway_reference = %session.gateway_reference,
        "payment initialized"
    );

    Ok(Json(InitializePaymentResponse {
        payment_url: session.checkout_url,
        payment_reference,
        ercaspay_reference: session.gateway_reference,
        amount: transaction.amount.to_string(),
        currency: "NGN".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub transaction_id: Uuid,
    pub transaction_status: String,
    pub payment_status: String,
    pub ercaspay_reference: Option<String>,
    pub gateway_response: serde_json::Value,
}

/// GET /api/payments/verify/{payment_reference}
///
/// Reconciliation endpoint keyed by the merchant payment reference (the one
/// embedded in the checkout redirect URL): looks up the transaction and its
/// latest payment attempt, then asks the gateway for its own record.
pub async fn verify_payment_status(
    State(state): State<Arc<PaymentsState>>,
    Path(payment_reference): Path<String>,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let transaction = state
        .transactions
        .find_by_payment_reference(&payment_reference)
        .await?
        .ok_or_else(|| {
            AppError::domain(DomainError::TransactionNotFound {
                transaction_id: payment_reference.clone(),
            })
        })?;

    let payment = state
        .payments
        .find_by_transaction(transaction.id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            AppError::domain(DomainError::PaymentNotFound {
                reference: payment_reference.clone(),
            })
        })?;

    let gateway_reference = payment.ercaspay_reference.clone().ok_or_else(|| {
        AppError::domain(DomainError::PaymentNotFound {
            reference: payment_reference.clone(),
        })
    })?;

    let gateway_response = state.gateway.verify_payment(&gateway_reference).await?;

    Ok(Json(VerifyPaymentResponse {
        transaction_id: transaction.id,
        transaction_status: transaction.status,
        payment_status: payment.status,
        ercaspay_reference: payment.ercaspay_reference,
        gateway_response,
    }))
}
