//! Reconciliation services: the realtime pipeline, the timing batch sweep,
//! the daily trigger and the worker pool backing the async entry points.

pub mod realtime;
pub mod scheduler;
pub mod timing;
pub mod worker;

use std::collections::BTreeMap;

use crate::api::results::ReconOutcome;
use crate::ledger::models::{OrderHeader, SplitDetail, SubOrder};
use crate::settlement::FactTotals;

pub use realtime::RealtimeReconService;
pub use scheduler::TimingTrigger;
pub use timing::TimingReconService;
pub use worker::{PendingResult, ReconWorkerPool};

/// Handle to an in-flight async reconciliation.
pub type PendingRecon = PendingResult<ReconOutcome>;

/// Intent layer totals: merchant -> Σ declared split value (order amount
/// when no split value was given).
pub(crate) fn intent_map(subs: &[SubOrder]) -> BTreeMap<String, i64> {
    let mut map = BTreeMap::new();
    for sub in subs {
        *map.entry(sub.merchant_id.clone()).or_insert(0) += sub.intent_amount_fen();
    }
    map
}

/// Fact layer totals: merchant -> aggregated confirmed amounts.
pub(crate) fn fact_totals_map(details: &[SplitDetail]) -> BTreeMap<String, FactTotals> {
    let mut map: BTreeMap<String, FactTotals> = BTreeMap::new();
    for detail in details {
        let totals = map.entry(detail.merchant_id.clone()).or_default();
        totals.split_amount_fen += detail.split_amount_fen;
        totals.split_fee_fen += detail.split_fee_fen;
        totals.arrival_amount_fen += detail.arrival_amount_fen;
    }
    map
}

/// Signed difference between what was paid and what the fact layer accounts
/// for: `pay - (Σ fact split + platform income + pay fee)`.
pub(crate) fn aggregate_delta(header: &OrderHeader, fact_split_total_fen: i64) -> i64 {
    header.pay_amount_fen
        - (fact_split_total_fen + header.platform_income_fen + header.pay_fee_fen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{BusinessStatus, ReconStatus};
    use chrono::Utc;

    #[test]
    fn intent_map_sums_per_merchant_with_fallback() {
        let now = Utc::now();
        let sub = |no: &str, merchant: &str, order: i64, split: Option<i64>| SubOrder {
            order_no: "ORD-1".into(),
            sub_order_no: no.into(),
            merchant_order_no: None,
            merchant_id: merchant.into(),
            order_amount_fen: order,
            split_amount_fen: split,
            fee_fen: 0,
            split_ratio: None,
            created_at: now,
            updated_at: now,
        };
        let map = intent_map(&[
            sub("SUB-1", "M_A", 3000, Some(2500)),
            sub("SUB-2", "M_A", 1000, None),
            sub("SUB-3", "M_B", 4000, Some(4000)),
        ]);
        assert_eq!(map["M_A"], 3500);
        assert_eq!(map["M_B"], 4000);
    }

    #[test]
    fn aggregate_delta_accounts_for_platform_and_fee() {
        let now = Utc::now();
        let header = OrderHeader {
            order_no: "ORD-1".into(),
            pay_amount_fen: 10000,
            platform_income_fen: 150,
            pay_fee_fen: 50,
            split_total_amount_fen: 9800,
            pay_status: BusinessStatus::Success,
            split_status: BusinessStatus::Success,
            notify_status: BusinessStatus::Success,
            recon_status: ReconStatus::Pending,
            refund_amount_fen: None,
            refund_status: None,
            refund_time: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(aggregate_delta(&header, 9800), 0);
        assert_eq!(aggregate_delta(&header, 9700), 100);
    }
}
