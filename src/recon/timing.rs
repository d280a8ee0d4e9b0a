use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{error, info};

use crate::alarm::AlarmService;
use crate::api::results::TimingReconReport;
use crate::config::ReconConfig;
use crate::error::ReconResult;
use crate::exception::ExceptionRecordService;
use crate::ledger::models::*;
use crate::ledger::ReconStore;
use crate::settlement::classify_settlements;

use super::{aggregate_delta, fact_totals_map, intent_map};

enum SweepDecision {
    Resolved,
    Failed,
    Skipped,
}

/// Timing reconciliation: the periodic sweep over orders left PENDING by
/// the realtime path. This is the primary recovery mechanism for orders
/// whose fact data arrived after the realtime attempt.
#[derive(Clone)]
pub struct TimingReconService {
    store: Arc<dyn ReconStore>,
    exceptions: Arc<ExceptionRecordService>,
    alarms: Arc<AlarmService>,
    config: ReconConfig,
}

impl TimingReconService {
    pub fn new(
        store: Arc<dyn ReconStore>,
        exceptions: Arc<ExceptionRecordService>,
        alarms: Arc<AlarmService>,
        config: ReconConfig,
    ) -> Self {
        Self {
            store,
            exceptions,
            alarms,
            config,
        }
    }

    /// Sweep the PENDING orders created on `date`, oldest first, until an
    /// empty page is returned. A single order's error never aborts the
    /// sweep; one summary alarm is emitted at the end.
    pub async fn do_timing_recon(&self, date: NaiveDate) -> ReconResult<TimingReconReport> {
        let mut report = TimingReconReport {
            date,
            processed: 0,
            resolved: 0,
            failed: 0,
            skipped: 0,
        };
        let limit = self.config.batch_page_size;
        let mut offset = 0i64;

        loop {
            let page = match self.store.get_pending_orders(date, offset, limit).await {
                Ok(page) => page,
                Err(e) => {
                    error!(%date, "timing sweep aborted while fetching pending orders: {e}");
                    self.alarms
                        .send_alarm(&format!("timing reconciliation run failed [{date}]: {e}"))
                        .await;
                    return Err(e);
                }
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len() as i64;

            for order in page {
                report.processed += 1;
                match self.process_pending_order(&order).await {
                    Ok(SweepDecision::Resolved) => report.resolved += 1,
                    Ok(SweepDecision::Failed) => report.failed += 1,
                    Ok(SweepDecision::Skipped) => report.skipped += 1,
                    Err(e) => {
                        // Isolate the order: audit it and keep sweeping.
                        error!(order_no = %order.order_no, "timing sweep order fault: {e}");
                        self.exceptions
                            .record(
                                &order.order_no,
                                ORDER_LEVEL_MERCHANT,
                                &format!("timing reconciliation fault: {e}"),
                                ExceptionStep::Other,
                            )
                            .await;
                    }
                }
            }

            offset += limit;
            if page_len < limit {
                break;
            }
        }

        info!(%date, processed = report.processed, "timing sweep finished");
        self.alarms
            .send_alarm(&format!(
                "timing reconciliation finished [{date}], processed {} orders",
                report.processed
            ))
            .await;
        Ok(report)
    }

    async fn process_pending_order(&self, order: &OrderHeader) -> ReconResult<SweepDecision> {
        // Facts still in flight: leave the order PENDING for a later sweep.
        if order.pay_status == BusinessStatus::Processing
            || order.split_status == BusinessStatus::Processing
            || order.notify_status == BusinessStatus::Processing
        {
            return Ok(SweepDecision::Skipped);
        }

        let split_details = self.store.get_split_details(&order.order_no).await?;
        let split_total_fen: i64 = split_details.iter().map(|d| d.split_amount_fen).sum();

        let delta = aggregate_delta(order, split_total_fen);
        if delta.abs() > self.config.amount_tolerance_fen {
            let message = format!(
                "timing reconciliation failed: pay amount differs from accounted total by {delta} fen"
            );
            self.exceptions
                .record(&order.order_no, ORDER_LEVEL_MERCHANT, &message, ExceptionStep::AmountCheck)
                .await;
            self.alarms
                .send_recon_alarm(&order.order_no, ORDER_LEVEL_MERCHANT, &message)
                .await;
            self.store
                .update_recon_status(&order.order_no, ReconStatus::Failure)
                .await?;
            return Ok(SweepDecision::Failed);
        }

        // Facts arrived after the realtime attempt: recompute the settlement
        // rows before flipping the status.
        let sub_orders = self.store.get_sub_orders(&order.order_no).await?;
        let intent = intent_map(&sub_orders);
        let facts = fact_totals_map(&split_details);
        let now = Utc::now();
        let settlements: Vec<MerchantSettlement> =
            classify_settlements(&intent, &facts, self.config.amount_tolerance_fen)
                .into_iter()
                .map(|row| MerchantSettlement {
                    order_no: order.order_no.clone(),
                    merchant_id: row.merchant_id,
                    settlement_type: row.settlement_type,
                    order_amount_fen: row.order_amount_fen,
                    split_amount_fen: row.split_amount_fen,
                    split_fee_fen: row.split_fee_fen,
                    arrival_amount_fen: row.arrival_amount_fen,
                    created_at: now,
                    updated_at: now,
                })
                .collect();
        self.store.batch_save_merchant_settlements(&settlements).await?;
        self.store
            .update_recon_status(&order.order_no, ReconStatus::Success)
            .await?;
        Ok(SweepDecision::Resolved)
    }
}
