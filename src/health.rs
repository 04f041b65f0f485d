//! Health check module
//! Provides health status for the application and its dependencies

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::delivery::vendor::DataVendor;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: sqlx::PgPool,
    vendor: Arc<dyn DataVendor>,
}

impl HealthChecker {
    pub fn new(db_pool: sqlx::PgPool, vendor: Arc<dyn DataVendor>) -> Self {
        Self { db_pool, vendor }
    }

    /// Perform comprehensive health check
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let mut overall_healthy = true;
        let mut degraded = false;

        // Database is load-bearing: down database means unhealthy
        match timeout(Duration::from_secs(5), check_database_health(&self.db_pool)).await {
            Ok(Ok(response_time)) => {
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::up(Some(response_time)),
                );
            }
            Ok(Err(e)) => {
                overall_healthy = false;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::down(Some(e.to_string())),
                );
                error!("Database health check failed: {}", e);
            }
            Err(_) => {
                overall_healthy = false;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::down(Some("Timeout".to_string())),
                );
                error!("Database health check timed out");
            }
        }

        // Vendor balance is diagnostic: failure degrades but does not fail
        // readiness, since payment collection still works without it
        match timeout(Duration::from_secs(5), self.check_vendor()).await {
            Ok(Ok((response_time, balance))) => {
                health_status.checks.insert(
                    "data_vendor".to_string(),
                    ComponentHealth {
                        status: ComponentState::Up,
                        response_time_ms: Some(response_time),
                        details: Some(format!("balance {}", balance)),
                    },
                );
            }
            Ok(Err(e)) => {
                degraded = true;
                health_status.checks.insert(
                    "data_vendor".to_string(),
                    ComponentHealth::warning(None, Some(e)),
                );
            }
            Err(_) => {
                degraded = true;
                health_status.checks.insert(
                    "data_vendor".to_string(),
                    ComponentHealth::warning(None, Some("Timeout".to_string())),
                );
            }
        }

        health_status.status = if !overall_healthy {
            HealthState::Unhealthy
        } else if degraded {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        info!(status = ?health_status.status, "health check completed");
        health_status
    }

    async fn check_vendor(&self) -> Result<(u128, String), String> {
        let start = Instant::now();
        match self.vendor.check_balance().await {
            Ok(balance) => Ok((start.elapsed().as_millis(), balance.balance)),
            Err(e) => Err(e.to_string()),
        }
    }
}

async fn check_database_health(
    pool: &sqlx::PgPool,
) -> Result<u128, crate::database::error::DatabaseError> {
    let start = Instant::now();
    crate::database::health_check(pool).await?;
    Ok(start.elapsed().as_millis())
}
