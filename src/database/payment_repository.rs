use crate::database::error::DatabaseError;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Payment entity: one gateway collection attempt for a transaction.
///
/// `ercaspay_reference` is the gateway-assigned reference the webhook uses
/// to locate this row; it is unique per attempt.
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub ercaspay_reference: Option<String>,
    pub amount: BigDecimal,
    pub status: String,
    pub payment_method: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

const PAYMENT_COLUMNS: &str =
    "id, transaction_id, ercaspay_reference, amount, status, payment_method, created_at";

pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a pending payment row once checkout has been initiated
    pub async fn create(
        &self,
        transaction_id: Uuid,
        ercaspay_reference: &str,
        amount: BigDecimal,
    ) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (transaction_id, ercaspay_reference, amount, status) \
             VALUES ($1, $2, $3, 'pending') \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(transaction_id)
        .bind(ercaspay_reference)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_gateway_reference(
        &self,
        ercaspay_reference: &str,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE ercaspay_reference = $1"
        ))
        .bind(ercaspay_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE transaction_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Apply the gateway's webhook verdict. Updated exactly once per payment;
    /// redelivered webhooks are short-circuited before reaching this point.
    pub async fn record_gateway_result(
        &self,
        id: Uuid,
        status: &str,
        payment_method: Option<&str>,
    ) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments \
             SET status = $2, payment_method = COALESCE($3, payment_method) \
             WHERE id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(payment_method)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
