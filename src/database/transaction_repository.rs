use crate::database::error::DatabaseError;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Transaction entity: one end-to-end purchase attempt (payment plus delivery)
#[derive(Debug, Clone, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub phone_number: String,
    pub network: String,
    pub data_plan_id: Uuid,
    pub data_plan_name: String,
    pub amount: BigDecimal,
    pub status: String,
    pub payment_reference: Option<String>,
    pub data_provider_id: Option<Uuid>,
    pub provider_reference: Option<String>,
    pub provider_response: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

const TRANSACTION_COLUMNS: &str = "id, phone_number, network, data_plan_id, data_plan_name, \
     amount, status, payment_reference, data_provider_id, provider_reference, \
     provider_response, created_at, updated_at";

/// Repository for managing transactions.
///
/// All status mutations are conditional updates with the expected current
/// status baked into the WHERE clause; zero rows affected means the
/// precondition failed (another handler won the race or the transaction is
/// in the wrong state) and is reported as `None`, never as success.
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new transaction in `pending` status
    pub async fn create(
        &self,
        phone_number: &str,
        network: &str,
        data_plan_id: Uuid,
        data_plan_name: &str,
        amount: BigDecimal,
    ) -> Result<Transaction, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "INSERT INTO transactions \
             (phone_number, network, data_plan_id, data_plan_name, amount, status) \
             VALUES ($1, $2, $3, $4, $5, 'pending') \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(phone_number)
        .bind(network)
        .bind(data_plan_id)
        .bind(data_plan_name)
        .bind(amount)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_payment_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE payment_reference = $1"
        ))
        .bind(payment_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Stamp the merchant payment reference once checkout has been created
    pub async fn set_payment_reference(
        &self,
        id: Uuid,
        payment_reference: &str,
    ) -> Result<Transaction, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions \
             SET payment_reference = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id)
        .bind(payment_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Conditionally move a transaction to `status` if its current status is
    /// one of `expected`. Returns `None` when zero rows were affected.
    pub async fn transition_status(
        &self,
        id: Uuid,
        status: &str,
        expected: &[&str],
    ) -> Result<Option<Transaction>, DatabaseError> {
        let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions \
             SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($3) \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(&expected)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Claim a transaction for delivery: `pending`/`payment_completed` →
    /// `processing`, stamping the provider. `None` means another handler
    /// already claimed it (or the status was wrong).
    pub async fn claim_for_delivery(
        &self,
        id: Uuid,
        data_provider_id: Uuid,
    ) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions \
             SET status = 'processing', data_provider_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status IN ('pending', 'payment_completed') \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id)
        .bind(data_provider_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Record a successful delivery: `processing` → `completed` with the
    /// aggregator's reference and full response.
    pub async fn complete_delivery(
        &self,
        id: Uuid,
        provider_reference: &str,
        provider_response: serde_json::Value,
    ) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions \
             SET status = 'completed', provider_reference = $2, provider_response = $3, \
                 updated_at = NOW() \
             WHERE id = $1 AND status = 'processing' \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id)
        .bind(provider_reference)
        .bind(provider_response)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Record a failed delivery, preserving the error detail for diagnostics
    pub async fn fail_delivery(
        &self,
        id: Uuid,
        provider_response: serde_json::Value,
    ) -> Result<Transaction, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions \
             SET status = 'failed', provider_response = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(id)
        .bind(provider_response)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Apply an aggregator delivery-status callback, located by the
    /// aggregator's own reference. Stores the raw payload verbatim.
    pub async fn update_from_vendor_callback(
        &self,
        provider_reference: &str,
        status: &str,
        payload: serde_json::Value,
    ) -> Result<Option<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "UPDATE transactions \
             SET status = $2, provider_response = $3, updated_at = NOW() \
             WHERE provider_reference = $1 \
             RETURNING {TRANSACTION_COLUMNS}"
        ))
        .bind(provider_reference)
        .bind(status)
        .bind(payload)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Transactions whose payment confirmed but whose delivery never ran to
    /// an outcome because the in-process delivery task was lost (crash,
    /// restart).
    /// Scanned by the delivery monitor worker.
    pub async fn find_stuck_deliveries(
        &self,
        stuck_after_secs: i64,
        window_hours: i32,
        limit: i64,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        sqlx::query_as::<_, Transaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE status = 'payment_completed' \
               AND updated_at < NOW() - INTERVAL '1 second' * $1 \
               AND created_at > NOW() - INTERVAL '1 hour' * $2 \
             ORDER BY updated_at ASC \
             LIMIT $3"
        ))
        .bind(stuck_after_secs)
        .bind(window_hours)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
