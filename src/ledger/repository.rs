use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::models::*;
use crate::error::ReconResult;

/// Persistence collaborator for the reconciliation core.
///
/// All writes must be idempotent under natural business keys (order_no for
/// the header, (order_no, sub_order_no) for intent rows, (order_no,
/// merchant_id) for fact/settlement/refund rows) so that at-least-once
/// delivery from retries and batch re-sweeps never duplicates rows.
/// Last-writer-wins is acceptable for header status columns only.
///
/// Timeout and retry discipline belongs to the implementation, not to the
/// services calling it.
#[async_trait]
pub trait ReconStore: Send + Sync {
    async fn save_order_header(&self, header: &OrderHeader) -> ReconResult<()>;
    async fn batch_save_sub_orders(&self, subs: &[SubOrder]) -> ReconResult<()>;
    async fn batch_save_split_details(&self, details: &[SplitDetail]) -> ReconResult<()>;
    async fn batch_save_merchant_settlements(
        &self,
        settlements: &[MerchantSettlement],
    ) -> ReconResult<()>;
    async fn batch_save_refund_splits(&self, splits: &[RefundSplit]) -> ReconResult<()>;

    /// Append-only; never overwrites earlier records.
    async fn save_exception(&self, record: &ExceptionRecord) -> ReconResult<()>;
    async fn save_notify_log(&self, log: &NotifyLog) -> ReconResult<()>;

    async fn get_order_by_no(&self, order_no: &str) -> ReconResult<Option<OrderHeader>>;
    async fn get_sub_orders(&self, order_no: &str) -> ReconResult<Vec<SubOrder>>;
    async fn get_split_details(&self, order_no: &str) -> ReconResult<Vec<SplitDetail>>;
    async fn get_merchant_settlements(&self, order_no: &str)
        -> ReconResult<Vec<MerchantSettlement>>;
    async fn get_refund_splits(&self, order_no: &str) -> ReconResult<Vec<RefundSplit>>;
    async fn get_exceptions(&self, order_no: &str) -> ReconResult<Vec<ExceptionRecord>>;
    async fn get_notify_logs(&self, order_no: &str) -> ReconResult<Vec<NotifyLog>>;

    /// Page of PENDING orders created on `date`, oldest first.
    async fn get_pending_orders(
        &self,
        date: NaiveDate,
        offset: i64,
        limit: i64,
    ) -> ReconResult<Vec<OrderHeader>>;

    async fn update_recon_status(&self, order_no: &str, status: ReconStatus) -> ReconResult<()>;
    async fn update_refund_status(
        &self,
        order_no: &str,
        status: RefundStatus,
        refund_amount_fen: i64,
        refund_time: Option<DateTime<Utc>>,
    ) -> ReconResult<()>;

    async fn find_order_no_by_sub_order(
        &self,
        merchant_id: &str,
        sub_order_no: &str,
    ) -> ReconResult<Option<String>>;
    async fn find_order_no_by_merchant_order(
        &self,
        merchant_id: &str,
        merchant_order_no: &str,
    ) -> ReconResult<Option<String>>;

    async fn get_summary(&self, date: NaiveDate) -> ReconResult<ReconSummary>;
}
