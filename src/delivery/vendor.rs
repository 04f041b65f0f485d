use crate::delivery::error::DeliveryResult;
use crate::delivery::types::{DataPurchaseRequest, VendorBalance, VendorReceipt};
use async_trait::async_trait;

/// Telecom aggregator seam. Implementations make network calls only; the
/// orchestrator owns every database write.
#[async_trait]
pub trait DataVendor: Send + Sync {
    /// Submit a data bundle purchase. A success return means the vendor
    /// reported the purchase as successful; business-level declines are
    /// errors even when the HTTP call itself succeeded.
    async fn purchase_data(&self, request: &DataPurchaseRequest) -> DeliveryResult<VendorReceipt>;

    /// Vendor account balance, best effort
    async fn check_balance(&self) -> DeliveryResult<VendorBalance>;

    fn name(&self) -> &'static str;
}
