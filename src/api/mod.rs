//! Service-level API surface. Transport (HTTP or otherwise) is the host's
//! concern; callers embed [`ReconApi`] directly.

pub mod models;
pub mod results;

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinHandle;
use validator::Validate;

use crate::error::ReconResult;
use crate::ledger::models::{ExceptionRecord, NotifyLog, ReconStatus, ReconSummary, RefundSplit};
use crate::ledger::ReconStore;
use crate::recon::{PendingRecon, RealtimeReconService, TimingReconService};

pub use models::{
    OrderReconRequest, RefundReconRequest, RefundSplitRequest, SplitDetailRequest, SubOrderRequest,
};
pub use results::{OrderDetail, ReconOutcome, TimingReconReport};

/// Unified entry point: submit reconciliations, trigger the batch sweep and
/// query persisted state. Construct once via [`crate::bootstrap`]; requests
/// are validated here before they reach the pipeline.
pub struct ReconApi {
    realtime: RealtimeReconService,
    timing: TimingReconService,
    store: Arc<dyn ReconStore>,
    timing_task: Option<JoinHandle<()>>,
}

impl ReconApi {
    pub(crate) fn new(
        realtime: RealtimeReconService,
        timing: TimingReconService,
        store: Arc<dyn ReconStore>,
        timing_task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            realtime,
            timing,
            store,
            timing_task,
        }
    }

    // ========== REALTIME RECONCILIATION ==========

    pub async fn recon_order(&self, request: &OrderReconRequest) -> ReconResult<ReconOutcome> {
        request.validate()?;
        Ok(self.realtime.recon_order(request).await)
    }

    pub async fn recon_order_async(
        &self,
        request: OrderReconRequest,
    ) -> ReconResult<PendingRecon> {
        request.validate()?;
        Ok(self.realtime.recon_order_async(request).await)
    }

    pub async fn recon_refund(&self, request: &RefundReconRequest) -> ReconResult<ReconOutcome> {
        request.validate()?;
        Ok(self.realtime.recon_refund(request).await)
    }

    pub async fn recon_refund_async(
        &self,
        request: RefundReconRequest,
    ) -> ReconResult<PendingRecon> {
        request.validate()?;
        Ok(self.realtime.recon_refund_async(request).await)
    }

    /// Explicitly re-run the decision for an unresolved or failed order.
    pub async fn retry_recon(&self, order_no: &str) -> ReconOutcome {
        self.realtime.retry_recon(order_no).await
    }

    // ========== TIMING RECONCILIATION ==========

    pub async fn do_timing_recon(&self, date: NaiveDate) -> ReconResult<TimingReconReport> {
        self.timing.do_timing_recon(date).await
    }

    // ========== QUERIES ==========

    pub async fn get_recon_status(&self, order_no: &str) -> ReconResult<Option<ReconStatus>> {
        Ok(self
            .store
            .get_order_by_no(order_no)
            .await?
            .map(|header| header.recon_status))
    }

    pub async fn get_order_detail(&self, order_no: &str) -> ReconResult<Option<OrderDetail>> {
        let Some(header) = self.store.get_order_by_no(order_no).await? else {
            return Ok(None);
        };
        Ok(Some(OrderDetail {
            sub_orders: self.store.get_sub_orders(order_no).await?,
            split_details: self.store.get_split_details(order_no).await?,
            settlements: self.store.get_merchant_settlements(order_no).await?,
            refund_splits: self.store.get_refund_splits(order_no).await?,
            header,
        }))
    }

    pub async fn get_exceptions(&self, order_no: &str) -> ReconResult<Vec<ExceptionRecord>> {
        self.store.get_exceptions(order_no).await
    }

    pub async fn get_refund_splits(&self, order_no: &str) -> ReconResult<Vec<RefundSplit>> {
        self.store.get_refund_splits(order_no).await
    }

    pub async fn get_notify_logs(&self, order_no: &str) -> ReconResult<Vec<NotifyLog>> {
        self.store.get_notify_logs(order_no).await
    }

    pub async fn get_summary(&self, date: NaiveDate) -> ReconResult<ReconSummary> {
        self.store.get_summary(date).await
    }
}

impl Drop for ReconApi {
    fn drop(&mut self) {
        // The daily trigger lives only as long as the API it serves. A
        // sweep already in flight completes on its own.
        if let Some(task) = &self.timing_task {
            task.abort();
        }
    }
}
