//! Audit trail of every inbound callback. Used for idempotency detection
//! and diagnostics; never mutates business state directly.

use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct WebhookRecord {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub reference_id: String,
    pub transaction_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub status: String,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

const WEBHOOK_COLUMNS: &str =
    "id, source, event_type, reference_id, transaction_id, payload, status, processed_at, created_at";

pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an inbound callback with status `received`
    pub async fn record(
        &self,
        source: &str,
        event_type: &str,
        reference_id: &str,
        transaction_id: Option<Uuid>,
        payload: serde_json::Value,
    ) -> Result<WebhookRecord, DatabaseError> {
        sqlx::query_as::<_, WebhookRecord>(&format!(
            "INSERT INTO webhooks (source, event_type, reference_id, transaction_id, payload, status) \
             VALUES ($1, $2, $3, $4, $5, 'received') \
             RETURNING {WEBHOOK_COLUMNS}"
        ))
        .bind(source)
        .bind(event_type)
        .bind(reference_id)
        .bind(transaction_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Look up an already-processed callback for the same source and
    /// reference. Drives the webhook idempotency short-circuit.
    pub async fn find_processed(
        &self,
        source: &str,
        reference_id: &str,
    ) -> Result<Option<WebhookRecord>, DatabaseError> {
        sqlx::query_as::<_, WebhookRecord>(&format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhooks \
             WHERE source = $1 AND reference_id = $2 AND status = 'processed' \
             ORDER BY created_at DESC \
             LIMIT 1"
        ))
        .bind(source)
        .bind(reference_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn mark_processed(&self, id: Uuid) -> Result<WebhookRecord, DatabaseError> {
        sqlx::query_as::<_, WebhookRecord>(&format!(
            "UPDATE webhooks SET status = 'processed', processed_at = NOW() \
             WHERE id = $1 \
             RETURNING {WEBHOOK_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn mark_failed(&self, id: Uuid) -> Result<WebhookRecord, DatabaseError> {
        sqlx::query_as::<_, WebhookRecord>(&format!(
            "UPDATE webhooks SET status = 'failed', processed_at = NOW() \
             WHERE id = $1 \
             RETURNING {WEBHOOK_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Record a callback that was rejected before processing (for example an
    /// invalid signature), so the attempt is still auditable.
    pub async fn record_rejected(
        &self,
        source: &str,
        event_type: &str,
        reference_id: &str,
        payload: serde_json::Value,
    ) -> Result<WebhookRecord, DatabaseError> {
        sqlx::query_as::<_, WebhookRecord>(&format!(
            "INSERT INTO webhooks (source, event_type, reference_id, payload, status, processed_at) \
             VALUES ($1, $2, $3, $4, 'failed', NOW()) \
             RETURNING {WEBHOOK_COLUMNS}"
        ))
        .bind(source)
        .bind(event_type)
        .bind(reference_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
