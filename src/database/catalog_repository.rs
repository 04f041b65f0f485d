//! Read-mostly catalog: data plans, delivery providers, and the mapping
//! between a catalog plan and a provider's own plan identifier.

use crate::database::error::DatabaseError;
use serde::Serialize;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Catalog entry, provider-agnostic
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DataPlan {
    pub id: Uuid,
    pub network: String,
    pub plan_name: String,
    pub data_amount: String,
    pub price: BigDecimal,
    pub cost_price: Option<BigDecimal>,
    pub validity: String,
    pub plan_type: Option<String>,
    pub is_available: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Configured upstream aggregator
#[derive(Debug, Clone, FromRow)]
pub struct DataProvider {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub config: Option<serde_json::Value>,
    pub is_active: bool,
    pub priority: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Join row giving a provider's own plan id for a catalog plan
#[derive(Debug, Clone, FromRow)]
pub struct ProviderPlanMapping {
    pub id: Uuid,
    pub data_plan_id: Uuid,
    pub data_provider_id: Uuid,
    pub provider_plan_id: String,
    pub provider_network_id: Option<String>,
    pub provider_metadata: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A plan joined to its delivery route: the provider and the mapping row
#[derive(Debug, Clone)]
pub struct PlanRoute {
    pub plan: DataPlan,
    pub provider: DataProvider,
    pub mapping: ProviderPlanMapping,
}

const PLAN_COLUMNS: &str = "id, network, plan_name, data_amount, price, cost_price, validity, \
     plan_type, is_available, created_at, updated_at";

pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Available plans for a network, cheapest first
    pub async fn list_available_plans(
        &self,
        network: &str,
    ) -> Result<Vec<DataPlan>, DatabaseError> {
        sqlx::query_as::<_, DataPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM data_plans \
             WHERE network = $1 AND is_available = TRUE \
             ORDER BY price ASC"
        ))
        .bind(network)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_plan(&self, id: Uuid) -> Result<Option<DataPlan>, DatabaseError> {
        sqlx::query_as::<_, DataPlan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM data_plans WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Resolve the delivery route for a plan: the active mapping and its
    /// provider, highest-priority provider first. More than one active
    /// mapping per (plan, provider) is not expected; the first row wins.
    pub async fn find_active_route(
        &self,
        data_plan_id: Uuid,
    ) -> Result<Option<PlanRoute>, DatabaseError> {
        #[derive(FromRow)]
        struct RouteRow {
            // data_plans
            plan_id: Uuid,
            network: String,
            plan_name: String,
            data_amount: String,
            price: BigDecimal,
            cost_price: Option<BigDecimal>,
            validity: String,
            plan_type: Option<String>,
            is_available: bool,
            plan_created_at: chrono::DateTime<chrono::Utc>,
            plan_updated_at: chrono::DateTime<chrono::Utc>,
            // data_providers
            provider_id: Uuid,
            provider_name: String,
            display_name: String,
            base_url: String,
            api_key: Option<String>,
            config: Option<serde_json::Value>,
            provider_is_active: bool,
            priority: i32,
            provider_created_at: chrono::DateTime<chrono::Utc>,
            provider_updated_at: chrono::DateTime<chrono::Utc>,
            // provider_plan_mappings
            mapping_id: Uuid,
            provider_plan_id: String,
            provider_network_id: Option<String>,
            provider_metadata: Option<serde_json::Value>,
            mapping_is_active: bool,
            mapping_created_at: chrono::DateTime<chrono::Utc>,
            mapping_updated_at: chrono::DateTime<chrono::Utc>,
        }

        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT \
                 p.id AS plan_id, p.network, p.plan_name, p.data_amount, p.price, \
                 p.cost_price, p.validity, p.plan_type, p.is_available, \
                 p.created_at AS plan_created_at, p.updated_at AS plan_updated_at, \
                 d.id AS provider_id, d.name AS provider_name, d.display_name, d.base_url, \
                 d.api_key, d.config, d.is_active AS provider_is_active, d.priority, \
                 d.created_at AS provider_created_at, d.updated_at AS provider_updated_at, \
                 m.id AS mapping_id, m.provider_plan_id, m.provider_network_id, \
                 m.provider_metadata, m.is_active AS mapping_is_active, \
                 m.created_at AS mapping_created_at, m.updated_at AS mapping_updated_at \
             FROM data_plans p \
             INNER JOIN provider_plan_mappings m ON m.data_plan_id = p.id \
             INNER JOIN data_providers d ON d.id = m.data_provider_id \
             WHERE p.id = $1 AND m.is_active = TRUE \
             ORDER BY d.priority ASC \
             LIMIT 1",
        )
        .bind(data_plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|r| PlanRoute {
            plan: DataPlan {
                id: r.plan_id,
                network: r.network,
                plan_name: r.plan_name,
                data_amount: r.data_amount,
                price: r.price,
                cost_price: r.cost_price,
                validity: r.validity,
                plan_type: r.plan_type,
                is_available: r.is_available,
                created_at: r.plan_created_at,
                updated_at: r.plan_updated_at,
            },
            provider: DataProvider {
                id: r.provider_id,
                name: r.provider_name,
                display_name: r.display_name,
                base_url: r.base_url,
                api_key: r.api_key,
                config: r.config,
                is_active: r.provider_is_active,
                priority: r.priority,
                created_at: r.provider_created_at,
                updated_at: r.provider_updated_at,
            },
            mapping: ProviderPlanMapping {
                id: r.mapping_id,
                data_plan_id,
                data_provider_id: r.provider_id,
                provider_plan_id: r.provider_plan_id,
                provider_network_id: r.provider_network_id,
                provider_metadata: r.provider_metadata,
                is_active: r.mapping_is_active,
                created_at: r.mapping_created_at,
                updated_at: r.mapping_updated_at,
            },
        }))
    }
}
