use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use super::models::*;
use super::repository::ReconStore;
use crate::error::{ReconError, ReconResult};

/// Thread-safe in-memory [`ReconStore`].
///
/// Backs the test suite and embedded use where durability is not required.
/// Upsert keys mirror the SQL adapter: order_no for headers, (order_no,
/// sub_order_no) for intent rows, (order_no, merchant_id) for fact,
/// settlement and refund rows.
#[derive(Default, Clone)]
pub struct MemoryReconStore {
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    orders: BTreeMap<String, OrderHeader>,
    sub_orders: BTreeMap<String, Vec<SubOrder>>,
    split_details: BTreeMap<String, Vec<SplitDetail>>,
    settlements: BTreeMap<String, Vec<MerchantSettlement>>,
    refund_splits: BTreeMap<String, Vec<RefundSplit>>,
    exceptions: Vec<ExceptionRecord>,
    notify_logs: Vec<NotifyLog>,
}

impl MemoryReconStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert_by_key<T: Clone>(rows: &mut Vec<T>, row: &T, same_key: impl Fn(&T, &T) -> bool) {
    match rows.iter_mut().find(|existing| same_key(existing, row)) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

#[async_trait]
impl ReconStore for MemoryReconStore {
    async fn save_order_header(&self, header: &OrderHeader) -> ReconResult<()> {
        let mut state = self.state.write().await;
        state.orders.insert(header.order_no.clone(), header.clone());
        Ok(())
    }

    async fn batch_save_sub_orders(&self, subs: &[SubOrder]) -> ReconResult<()> {
        let mut state = self.state.write().await;
        for sub in subs {
            let rows = state.sub_orders.entry(sub.order_no.clone()).or_default();
            upsert_by_key(rows, sub, |a, b| a.sub_order_no == b.sub_order_no);
        }
        Ok(())
    }

    async fn batch_save_split_details(&self, details: &[SplitDetail]) -> ReconResult<()> {
        let mut state = self.state.write().await;
        for detail in details {
            let rows = state.split_details.entry(detail.order_no.clone()).or_default();
            upsert_by_key(rows, detail, |a, b| a.merchant_id == b.merchant_id);
        }
        Ok(())
    }

    async fn batch_save_merchant_settlements(
        &self,
        settlements: &[MerchantSettlement],
    ) -> ReconResult<()> {
        let mut state = self.state.write().await;
        for settlement in settlements {
            let rows = state.settlements.entry(settlement.order_no.clone()).or_default();
            upsert_by_key(rows, settlement, |a, b| a.merchant_id == b.merchant_id);
        }
        Ok(())
    }

    async fn batch_save_refund_splits(&self, splits: &[RefundSplit]) -> ReconResult<()> {
        let mut state = self.state.write().await;
        for split in splits {
            let rows = state.refund_splits.entry(split.order_no.clone()).or_default();
            upsert_by_key(rows, split, |a, b| a.merchant_id == b.merchant_id);
        }
        Ok(())
    }

    async fn save_exception(&self, record: &ExceptionRecord) -> ReconResult<()> {
        let mut state = self.state.write().await;
        state.exceptions.push(record.clone());
        Ok(())
    }

    async fn save_notify_log(&self, log: &NotifyLog) -> ReconResult<()> {
        let mut state = self.state.write().await;
        state.notify_logs.push(log.clone());
        Ok(())
    }

    async fn get_order_by_no(&self, order_no: &str) -> ReconResult<Option<OrderHeader>> {
        let state = self.state.read().await;
        Ok(state.orders.get(order_no).cloned())
    }

    async fn get_sub_orders(&self, order_no: &str) -> ReconResult<Vec<SubOrder>> {
        let state = self.state.read().await;
        Ok(state.sub_orders.get(order_no).cloned().unwrap_or_default())
    }

    async fn get_split_details(&self, order_no: &str) -> ReconResult<Vec<SplitDetail>> {
        let state = self.state.read().await;
        Ok(state.split_details.get(order_no).cloned().unwrap_or_default())
    }

    async fn get_merchant_settlements(
        &self,
        order_no: &str,
    ) -> ReconResult<Vec<MerchantSettlement>> {
        let state = self.state.read().await;
        Ok(state.settlements.get(order_no).cloned().unwrap_or_default())
    }

    async fn get_refund_splits(&self, order_no: &str) -> ReconResult<Vec<RefundSplit>> {
        let state = self.state.read().await;
        Ok(state.refund_splits.get(order_no).cloned().unwrap_or_default())
    }

    async fn get_exceptions(&self, order_no: &str) -> ReconResult<Vec<ExceptionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .exceptions
            .iter()
            .filter(|e| e.order_no == order_no)
            .cloned()
            .collect())
    }

    async fn get_notify_logs(&self, order_no: &str) -> ReconResult<Vec<NotifyLog>> {
        let state = self.state.read().await;
        Ok(state
            .notify_logs
            .iter()
            .filter(|l| l.order_no == order_no)
            .cloned()
            .collect())
    }

    async fn get_pending_orders(
        &self,
        date: NaiveDate,
        offset: i64,
        limit: i64,
    ) -> ReconResult<Vec<OrderHeader>> {
        let state = self.state.read().await;
        let mut pending: Vec<OrderHeader> = state
            .orders
            .values()
            .filter(|o| o.recon_status == ReconStatus::Pending && o.created_at.date_naive() == date)
            .cloned()
            .collect();
        pending.sort_by_key(|o| o.created_at);
        Ok(pending
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_recon_status(&self, order_no: &str, status: ReconStatus) -> ReconResult<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(order_no)
            .ok_or_else(|| ReconError::NotFound(format!("order {order_no}")))?;
        order.recon_status = status;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn update_refund_status(
        &self,
        order_no: &str,
        status: RefundStatus,
        refund_amount_fen: i64,
        refund_time: Option<DateTime<Utc>>,
    ) -> ReconResult<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(order_no)
            .ok_or_else(|| ReconError::NotFound(format!("order {order_no}")))?;
        order.refund_status = Some(status);
        order.refund_amount_fen = Some(refund_amount_fen);
        order.refund_time = refund_time;
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn find_order_no_by_sub_order(
        &self,
        merchant_id: &str,
        sub_order_no: &str,
    ) -> ReconResult<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .sub_orders
            .values()
            .flatten()
            .find(|s| s.merchant_id == merchant_id && s.sub_order_no == sub_order_no)
            .map(|s| s.order_no.clone()))
    }

    async fn find_order_no_by_merchant_order(
        &self,
        merchant_id: &str,
        merchant_order_no: &str,
    ) -> ReconResult<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .sub_orders
            .values()
            .flatten()
            .find(|s| {
                s.merchant_id == merchant_id
                    && s.merchant_order_no.as_deref() == Some(merchant_order_no)
            })
            .map(|s| s.order_no.clone()))
    }

    async fn get_summary(&self, date: NaiveDate) -> ReconResult<ReconSummary> {
        let state = self.state.read().await;
        let mut summary = ReconSummary {
            summary_date: date,
            total_orders: 0,
            success_count: 0,
            fail_count: 0,
            pending_count: 0,
            total_amount_fen: 0,
        };
        for order in state.orders.values() {
            if order.created_at.date_naive() != date {
                continue;
            }
            summary.total_orders += 1;
            summary.total_amount_fen += order.pay_amount_fen;
            match order.recon_status {
                ReconStatus::Success => summary.success_count += 1,
                ReconStatus::Failure => summary.fail_count += 1,
                ReconStatus::Pending => summary.pending_count += 1,
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(order_no: &str, recon_status: ReconStatus) -> OrderHeader {
        let now = Utc::now();
        OrderHeader {
            order_no: order_no.into(),
            pay_amount_fen: 10000,
            platform_income_fen: 0,
            pay_fee_fen: 0,
            split_total_amount_fen: 10000,
            pay_status: BusinessStatus::Success,
            split_status: BusinessStatus::Success,
            notify_status: BusinessStatus::Success,
            recon_status,
            refund_amount_fen: None,
            refund_status: None,
            refund_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn header_save_is_idempotent_by_order_no() {
        let store = MemoryReconStore::new();
        let h = header("ORD-1", ReconStatus::Pending);
        store.save_order_header(&h).await.unwrap();
        store.save_order_header(&h).await.unwrap();
        let pending = store
            .get_pending_orders(h.created_at.date_naive(), 0, 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn settlement_upsert_never_duplicates_merchant_rows() {
        let store = MemoryReconStore::new();
        let now = Utc::now();
        let row = MerchantSettlement {
            order_no: "ORD-1".into(),
            merchant_id: "M_A".into(),
            settlement_type: SettlementType::DirectToMerchant,
            order_amount_fen: 5000,
            split_amount_fen: 5000,
            split_fee_fen: 0,
            arrival_amount_fen: 5000,
            created_at: now,
            updated_at: now,
        };
        store.batch_save_merchant_settlements(&[row.clone()]).await.unwrap();
        store.batch_save_merchant_settlements(&[row]).await.unwrap();
        assert_eq!(store.get_merchant_settlements("ORD-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pending_page_excludes_resolved_orders() {
        let store = MemoryReconStore::new();
        store.save_order_header(&header("ORD-1", ReconStatus::Pending)).await.unwrap();
        store.save_order_header(&header("ORD-2", ReconStatus::Success)).await.unwrap();
        let date = Utc::now().date_naive();
        let page = store.get_pending_orders(date, 0, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].order_no, "ORD-1");
    }

    #[tokio::test]
    async fn notify_logs_append_per_order() {
        let store = MemoryReconStore::new();
        let log = NotifyLog {
            order_no: "ORD-1".into(),
            sub_order_no: Some("SUB-1".into()),
            merchant_id: "M_A".into(),
            notify_url: Some("https://merchant.example/notify".into()),
            notify_status: BusinessStatus::Success,
            notify_result: Some("ok".into()),
            created_at: Utc::now(),
        };
        store.save_notify_log(&log).await.unwrap();
        store.save_notify_log(&log).await.unwrap();
        assert_eq!(store.get_notify_logs("ORD-1").await.unwrap().len(), 2);
        assert!(store.get_notify_logs("ORD-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_counts_by_status() {
        let store = MemoryReconStore::new();
        store.save_order_header(&header("ORD-1", ReconStatus::Success)).await.unwrap();
        store.save_order_header(&header("ORD-2", ReconStatus::Failure)).await.unwrap();
        store.save_order_header(&header("ORD-3", ReconStatus::Pending)).await.unwrap();
        let summary = store.get_summary(Utc::now().date_naive()).await.unwrap();
        assert_eq!(summary.total_orders, 3);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.fail_count, 1);
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.total_amount_fen, 30000);
    }
}
