//! Delivery monitor worker.
//!
//! The delivery call after a successful payment webhook is spawned in
//! process and not awaited; if the process restarts (or the spawn itself
//! fails) the transaction is left in `payment_completed` with nothing
//! driving it. This worker periodically re-drives such rows through the
//! orchestrator. The conditional claim in the orchestrator makes the
//! re-drive safe against a still-running in-process attempt.

use crate::database::transaction_repository::TransactionRepository;
use crate::services::data_purchase::DataPurchaseService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct DeliveryMonitorConfig {
    /// How often the worker wakes up to scan for stuck rows
    pub poll_interval: Duration,
    /// Rows must have sat in `payment_completed` at least this long before
    /// the worker touches them, to leave room for the in-process task
    pub stuck_after: Duration,
    /// Maximum rows re-driven per cycle
    pub batch_size: i64,
    /// How far back (in hours) to search
    pub window_hours: i32,
}

impl Default for DeliveryMonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            stuck_after: Duration::from_secs(120),
            batch_size: 20,
            window_hours: 24,
        }
    }
}

impl DeliveryMonitorConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.poll_interval = Duration::from_secs(
            std::env::var("DELIVERY_MONITOR_POLL_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.poll_interval.as_secs()),
        );
        cfg.stuck_after = Duration::from_secs(
            std::env::var("DELIVERY_MONITOR_STUCK_AFTER_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(cfg.stuck_after.as_secs()),
        );
        cfg.batch_size = std::env::var("DELIVERY_MONITOR_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(cfg.batch_size);
        cfg.window_hours = std::env::var("DELIVERY_MONITOR_WINDOW_HOURS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(cfg.window_hours);
        cfg
    }
}

pub struct DeliveryMonitorWorker {
    transactions: Arc<TransactionRepository>,
    purchases: Arc<DataPurchaseService>,
    config: DeliveryMonitorConfig,
}

impl DeliveryMonitorWorker {
    pub fn new(
        transactions: Arc<TransactionRepository>,
        purchases: Arc<DataPurchaseService>,
        config: DeliveryMonitorConfig,
    ) -> Self {
        Self {
            transactions,
            purchases,
            config,
        }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            stuck_after_secs = self.config.stuck_after.as_secs(),
            batch_size = self.config.batch_size,
            window_hours = self.config.window_hours,
            "delivery monitor worker started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("delivery monitor worker stopping");
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.run_cycle().await {
                        warn!(error = %e, "delivery monitor cycle failed");
                    }
                }
            }
        }

        info!("delivery monitor worker stopped");
    }

    async fn run_cycle(&self) -> anyhow::Result<()> {
        let stuck = self
            .transactions
            .find_stuck_deliveries(
                self.config.stuck_after.as_secs() as i64,
                self.config.window_hours,
                self.config.batch_size,
            )
            .await?;

        if stuck.is_empty() {
            return Ok(());
        }

        info!(count = stuck.len(), "re-driving stuck deliveries");

        for transaction in stuck {
            match self.purchases.process(transaction.id).await {
                Ok(outcome) if outcome.success => {
                    info!(
                        transaction_id = %transaction.id,
                        provider_reference = ?outcome.provider_reference,
                        "stuck delivery completed"
                    );
                }
                Ok(outcome) => {
                    warn!(
                        transaction_id = %transaction.id,
                        error = ?outcome.error,
                        should_retry = outcome.should_retry,
                        "stuck delivery attempt failed"
                    );
                }
                Err(e) => {
                    // A conflict here usually means an in-process task beat
                    // us to the claim; nothing to do
                    error!(
                        transaction_id = %transaction.id,
                        error = %e,
                        "stuck delivery re-drive errored"
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = DeliveryMonitorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert!(config.stuck_after >= Duration::from_secs(60));
        assert!(config.batch_size > 0);
    }
}
