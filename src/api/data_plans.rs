use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::catalog_repository::CatalogRepository;
use crate::error::AppError;
use crate::validation::Network;

pub struct CatalogState {
    pub catalog: Arc<CatalogRepository>,
}

#[derive(Debug, Serialize)]
pub struct DataPlanView {
    pub id: Uuid,
    pub plan_name: String,
    pub data_amount: String,
    pub price: String,
    pub validity: String,
}

#[derive(Debug, Serialize)]
pub struct DataPlansResponse {
    pub network: String,
    pub plans: Vec<DataPlanView>,
}

/// GET /api/data-plans/{network}
pub async fn list_plans(
    State(state): State<Arc<CatalogState>>,
    Path(network): Path<String>,
) -> Result<Json<DataPlansResponse>, AppError> {
    let network = Network::from_str(&network)?;

    let plans = state.catalog.list_available_plans(network.as_str()).await?;
    info!(network = %network, count = plans.len(), "listed data plans");

    Ok(Json(DataPlansResponse {
        network: network.as_str().to_string(),
        plans: plans
            .into_iter()
            .map(|plan| DataPlanView {
                id: plan.id,
                plan_name: plan.plan_name,
                data_amount: plan.data_amount,
                price: plan.price.to_string(),
                validity: plan.validity,
            })
            .collect(),
    }))
}
