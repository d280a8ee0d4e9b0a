use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::alarm::AlarmService;
use crate::api::models::{OrderReconRequest, RefundReconRequest};
use crate::api::results::ReconOutcome;
use crate::config::ReconConfig;
use crate::error::ReconResult;
use crate::exception::ExceptionRecordService;
use crate::ledger::models::*;
use crate::ledger::ReconStore;
use crate::money::optional_fen;
use crate::settlement::classify_settlements;

use super::worker::ReconWorkerPool;
use super::{aggregate_delta, fact_totals_map, intent_map, PendingRecon};

/// Realtime reconciliation: validates a single order or refund against its
/// channel-confirmed facts and persists the derived settlement state.
///
/// Every entry point returns a [`ReconOutcome`]; domain failures pair with
/// an exception record and an alarm, and an unexpected fault is converted at
/// this boundary into an OTHER-classified outcome instead of propagating.
#[derive(Clone)]
pub struct RealtimeReconService {
    store: Arc<dyn ReconStore>,
    exceptions: Arc<ExceptionRecordService>,
    alarms: Arc<AlarmService>,
    pool: Arc<ReconWorkerPool>,
    config: ReconConfig,
}

impl RealtimeReconService {
    pub fn new(
        store: Arc<dyn ReconStore>,
        exceptions: Arc<ExceptionRecordService>,
        alarms: Arc<AlarmService>,
        pool: Arc<ReconWorkerPool>,
        config: ReconConfig,
    ) -> Self {
        Self {
            store,
            exceptions,
            alarms,
            pool,
            config,
        }
    }

    // ========== ORDER RECONCILIATION ==========

    pub async fn recon_order(&self, request: &OrderReconRequest) -> ReconOutcome {
        match self.recon_order_inner(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(order_no = %request.order_no, "order reconciliation fault: {e}");
                let message = format!("reconciliation fault: {e}");
                self.record_failure(&request.order_no, ORDER_LEVEL_MERCHANT, &message, ExceptionStep::Other)
                    .await;
                ReconOutcome::fail(&request.order_no, ExceptionStep::Other, message)
            }
        }
    }

    /// Same contract as [`recon_order`], executed on the bounded worker
    /// pool. Dropping the returned handle is advisory only: it cannot
    /// retract a write already issued.
    ///
    /// [`recon_order`]: RealtimeReconService::recon_order
    pub async fn recon_order_async(&self, request: OrderReconRequest) -> PendingRecon {
        let service = self.clone();
        self.pool
            .submit(async move { service.recon_order(&request).await })
            .await
    }

    async fn recon_order_inner(&self, request: &OrderReconRequest) -> ReconResult<ReconOutcome> {
        let order_no = request.order_no.clone();
        let now = Utc::now();

        // Normalize every amount to minor units at the boundary.
        let pay_amount_fen = request.pay_amount.to_fen()?;
        let platform_income_fen = request.platform_income.to_fen()?;
        let pay_fee_fen = request.pay_fee.to_fen()?;

        let sub_orders = build_sub_orders(request, now)?;
        let split_details = build_split_details(request, now)?;
        let split_total_fen: i64 = split_details.iter().map(|d| d.split_amount_fen).sum();

        let mut header = OrderHeader {
            order_no: order_no.clone(),
            pay_amount_fen,
            platform_income_fen,
            pay_fee_fen,
            split_total_amount_fen: split_total_fen,
            pay_status: request.pay_status,
            split_status: request.split_status,
            notify_status: request.notify_status,
            recon_status: ReconStatus::Pending,
            refund_amount_fen: None,
            refund_status: None,
            refund_time: None,
            created_at: now,
            updated_at: now,
        };

        // 1. Pay-status gate: anything but a confirmed payment fails the
        //    order outright; only the header is persisted.
        if request.pay_status != BusinessStatus::Success {
            header.recon_status = ReconStatus::Failure;
            self.store.save_order_header(&header).await?;
            let message = "pay status is not success";
            self.record_failure(&order_no, ORDER_LEVEL_MERCHANT, message, ExceptionStep::PayStatus)
                .await;
            return Ok(ReconOutcome::fail(&order_no, ExceptionStep::PayStatus, message));
        }

        // 2. Split / notify failure gates.
        if request.split_status == BusinessStatus::Failure {
            header.recon_status = ReconStatus::Failure;
            self.store.save_order_header(&header).await?;
            let message = "split status is failure";
            self.record_failure(&order_no, ORDER_LEVEL_MERCHANT, message, ExceptionStep::SplitStatus)
                .await;
            return Ok(ReconOutcome::fail(&order_no, ExceptionStep::SplitStatus, message));
        }
        if request.notify_status == BusinessStatus::Failure {
            header.recon_status = ReconStatus::Failure;
            self.store.save_order_header(&header).await?;
            let message = "notify status is failure";
            self.record_failure(&order_no, ORDER_LEVEL_MERCHANT, message, ExceptionStep::NotifyStatus)
                .await;
            return Ok(ReconOutcome::fail(&order_no, ExceptionStep::NotifyStatus, message));
        }

        // 3. A side still processing means the facts are not final: persist
        //    what arrived as PENDING and let the timing sweep resolve it.
        //    No exception record; nothing is wrong yet.
        if request.split_status == BusinessStatus::Processing
            || request.notify_status == BusinessStatus::Processing
        {
            self.store.save_order_header(&header).await?;
            self.store.batch_save_sub_orders(&sub_orders).await?;
            self.store.batch_save_split_details(&split_details).await?;
            info!(order_no = %order_no, "facts not final, order left pending for timing sweep");
            return Ok(ReconOutcome::ok_with(
                &order_no,
                "facts pending, order queued for timing reconciliation",
            ));
        }

        // 4. Aggregate check: the paid amount must be fully accounted for by
        //    the fact layer plus platform income and fee.
        let delta = aggregate_delta(&header, split_total_fen);
        if delta.abs() > self.config.amount_tolerance_fen {
            header.recon_status = ReconStatus::Failure;
            self.store.save_order_header(&header).await?;
            self.store.batch_save_sub_orders(&sub_orders).await?;
            self.store.batch_save_split_details(&split_details).await?;
            let message = format!(
                "amount check failed: pay amount differs from accounted total by {delta} fen"
            );
            self.record_failure(&order_no, ORDER_LEVEL_MERCHANT, &message, ExceptionStep::AmountCheck)
                .await;
            return Ok(ReconOutcome::fail(&order_no, ExceptionStep::AmountCheck, message));
        }

        // 5. Infer the settlement type per merchant and persist the full
        //    reconciled state. All writes are idempotent upserts; a fault
        //    mid-write surfaces as an OTHER outcome for later retry.
        let settlements = self.build_settlements(&order_no, &sub_orders, &split_details, now);
        header.recon_status = ReconStatus::Success;
        self.store.save_order_header(&header).await?;
        self.store.batch_save_sub_orders(&sub_orders).await?;
        self.store.batch_save_split_details(&split_details).await?;
        self.store.batch_save_merchant_settlements(&settlements).await?;

        info!(
            order_no = %order_no,
            merchants = settlements.len(),
            "order reconciled"
        );
        Ok(ReconOutcome::ok(&order_no))
    }

    // ========== REFUND RECONCILIATION ==========

    pub async fn recon_refund(&self, request: &RefundReconRequest) -> ReconOutcome {
        let fallback_no = request.order_no.clone().unwrap_or_default();
        match self.recon_refund_inner(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(order_no = %fallback_no, "refund reconciliation fault: {e}");
                let message = format!("refund reconciliation fault: {e}");
                self.record_failure(&fallback_no, ORDER_LEVEL_MERCHANT, &message, ExceptionStep::Other)
                    .await;
                ReconOutcome::fail(&fallback_no, ExceptionStep::Other, message)
            }
        }
    }

    pub async fn recon_refund_async(&self, request: RefundReconRequest) -> PendingRecon {
        let service = self.clone();
        self.pool
            .submit(async move { service.recon_refund(&request).await })
            .await
    }

    async fn recon_refund_inner(&self, request: &RefundReconRequest) -> ReconResult<ReconOutcome> {
        let Some(order_no) = self.resolve_refund_order(request).await? else {
            let reference = request
                .order_no
                .clone()
                .or_else(|| request.merchant_order_no.clone())
                .or_else(|| request.sub_order_no.clone())
                .unwrap_or_default();
            return Ok(ReconOutcome::not_found(reference));
        };

        let Some(header) = self.store.get_order_by_no(&order_no).await? else {
            return Ok(ReconOutcome::not_found(&order_no));
        };

        let refund_amount_fen = request.refund_amount.to_fen()?;
        if refund_amount_fen > header.pay_amount_fen {
            let message = "refund amount exceeds pay amount";
            self.record_failure(&order_no, ORDER_LEVEL_MERCHANT, message, ExceptionStep::AmountCheck)
                .await;
            return Ok(ReconOutcome::fail(&order_no, ExceptionStep::AmountCheck, message));
        }

        let now = Utc::now();
        let mut refund_splits = Vec::with_capacity(request.refund_splits.len());
        let mut split_total_fen = 0i64;
        for split in &request.refund_splits {
            let amount_fen = split.refund_split_amount.to_fen()?;
            split_total_fen += amount_fen;
            refund_splits.push(RefundSplit {
                order_no: order_no.clone(),
                merchant_id: split.merchant_id.clone(),
                refund_split_amount_fen: amount_fen,
                created_at: now,
                updated_at: now,
            });
        }
        if split_total_fen > refund_amount_fen {
            let message = "refund split total exceeds refund amount";
            self.record_failure(&order_no, ORDER_LEVEL_MERCHANT, message, ExceptionStep::AmountCheck)
                .await;
            return Ok(ReconOutcome::fail(&order_no, ExceptionStep::AmountCheck, message));
        }

        self.store
            .update_refund_status(
                &order_no,
                request.refund_status,
                refund_amount_fen,
                request.refund_time.or(Some(now)),
            )
            .await?;
        self.store.batch_save_refund_splits(&refund_splits).await?;

        info!(order_no = %order_no, refund_amount_fen, "refund reconciled");
        Ok(ReconOutcome::ok(&order_no))
    }

    /// Resolve the parent order: order_no wins; otherwise look the order up
    /// through its sub-orders by merchant order no, then by sub-order no.
    async fn resolve_refund_order(
        &self,
        request: &RefundReconRequest,
    ) -> ReconResult<Option<String>> {
        if let Some(order_no) = &request.order_no {
            return Ok(Some(order_no.clone()));
        }
        let Some(merchant_id) = &request.merchant_id else {
            return Ok(None);
        };
        if let Some(merchant_order_no) = &request.merchant_order_no {
            if let Some(found) = self
                .store
                .find_order_no_by_merchant_order(merchant_id, merchant_order_no)
                .await?
            {
                return Ok(Some(found));
            }
        }
        if let Some(sub_order_no) = &request.sub_order_no {
            if let Some(found) = self
                .store
                .find_order_no_by_sub_order(merchant_id, sub_order_no)
                .await?
            {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    // ========== RETRY ==========

    /// Re-run the reconciliation decision for an order from its previously
    /// persisted request. Succeeds only if the triggering condition no
    /// longer holds; a persistent mismatch is reported again, not ignored.
    pub async fn retry_recon(&self, order_no: &str) -> ReconOutcome {
        match self.retry_recon_inner(order_no).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(order_no, "retry fault: {e}");
                let message = format!("retry fault: {e}");
                self.record_failure(order_no, ORDER_LEVEL_MERCHANT, &message, ExceptionStep::Other)
                    .await;
                ReconOutcome::fail(order_no, ExceptionStep::Other, message)
            }
        }
    }

    async fn retry_recon_inner(&self, order_no: &str) -> ReconResult<ReconOutcome> {
        let Some(header) = self.store.get_order_by_no(order_no).await? else {
            return Ok(ReconOutcome::not_found(order_no));
        };
        if header.recon_status == ReconStatus::Success {
            return Ok(ReconOutcome::ok_with(order_no, "already reconciled"));
        }

        let sub_orders = self.store.get_sub_orders(order_no).await?;
        let split_details = self.store.get_split_details(order_no).await?;
        let split_total_fen: i64 = split_details.iter().map(|d| d.split_amount_fen).sum();

        let delta = aggregate_delta(&header, split_total_fen);
        if delta.abs() > self.config.amount_tolerance_fen {
            let message = format!(
                "retry failed: pay amount still differs from accounted total by {delta} fen"
            );
            self.record_failure(order_no, ORDER_LEVEL_MERCHANT, &message, ExceptionStep::AmountCheck)
                .await;
            self.store
                .update_recon_status(order_no, ReconStatus::Failure)
                .await?;
            return Ok(ReconOutcome::fail(order_no, ExceptionStep::AmountCheck, message));
        }

        let settlements =
            self.build_settlements(order_no, &sub_orders, &split_details, Utc::now());
        self.store.batch_save_merchant_settlements(&settlements).await?;
        self.store
            .update_recon_status(order_no, ReconStatus::Success)
            .await?;

        info!(order_no, "retry reconciled order");
        Ok(ReconOutcome::ok(order_no))
    }

    // ========== SHARED ==========

    fn build_settlements(
        &self,
        order_no: &str,
        sub_orders: &[SubOrder],
        split_details: &[SplitDetail],
        now: chrono::DateTime<Utc>,
    ) -> Vec<MerchantSettlement> {
        let intent = intent_map(sub_orders);
        let facts = fact_totals_map(split_details);
        classify_settlements(&intent, &facts, self.config.amount_tolerance_fen)
            .into_iter()
            .map(|row| MerchantSettlement {
                order_no: order_no.to_string(),
                merchant_id: row.merchant_id,
                settlement_type: row.settlement_type,
                order_amount_fen: row.order_amount_fen,
                split_amount_fen: row.split_amount_fen,
                split_fee_fen: row.split_fee_fen,
                arrival_amount_fen: row.arrival_amount_fen,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }

    async fn record_failure(
        &self,
        order_no: &str,
        merchant_id: &str,
        message: &str,
        step: ExceptionStep,
    ) {
        self.exceptions.record(order_no, merchant_id, message, step).await;
        self.alarms.send_recon_alarm(order_no, merchant_id, message).await;
    }
}

fn build_sub_orders(
    request: &OrderReconRequest,
    now: chrono::DateTime<Utc>,
) -> ReconResult<Vec<SubOrder>> {
    request
        .sub_orders
        .iter()
        .map(|sub| {
            Ok(SubOrder {
                order_no: request.order_no.clone(),
                sub_order_no: sub.sub_order_no.clone(),
                merchant_order_no: sub.merchant_order_no.clone(),
                merchant_id: sub.merchant_id.clone(),
                order_amount_fen: sub.order_amount.to_fen()?,
                split_amount_fen: optional_fen(sub.split_amount)?,
                fee_fen: optional_fen(sub.fee)?.unwrap_or(0),
                split_ratio: sub.split_ratio,
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}

/// Fact rows are aggregated to one per merchant before persistence.
fn build_split_details(
    request: &OrderReconRequest,
    now: chrono::DateTime<Utc>,
) -> ReconResult<Vec<SplitDetail>> {
    let mut by_merchant: std::collections::BTreeMap<String, SplitDetail> =
        std::collections::BTreeMap::new();
    for detail in &request.split_details {
        let split_fen = detail.split_amount.to_fen()?;
        let arrival_fen = optional_fen(detail.arrival_amount)?.unwrap_or(0);
        let fee_fen = optional_fen(detail.split_fee)?.unwrap_or(0);
        let entry = by_merchant
            .entry(detail.merchant_id.clone())
            .or_insert_with(|| SplitDetail {
                order_no: request.order_no.clone(),
                merchant_id: detail.merchant_id.clone(),
                split_amount_fen: 0,
                arrival_amount_fen: 0,
                split_fee_fen: 0,
                created_at: now,
                updated_at: now,
            });
        entry.split_amount_fen += split_fen;
        entry.arrival_amount_fen += arrival_fen;
        entry.split_fee_fen += fee_fen;
    }
    Ok(by_merchant.into_values().collect())
}
