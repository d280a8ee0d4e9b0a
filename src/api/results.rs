use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::models::{
    ExceptionStep, MerchantSettlement, OrderHeader, RefundSplit, SplitDetail, SubOrder,
};

/// Result of one reconciliation attempt. A failure result is final for that
/// attempt; the timing sweep or an explicit retry is the recovery path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconOutcome {
    pub success: bool,
    pub order_no: String,
    pub message: String,
    /// Pipeline step the failure is attributed to; `None` for successes and
    /// for lookup misses (which produce no exception record).
    pub step: Option<ExceptionStep>,
}

impl ReconOutcome {
    pub fn ok(order_no: impl Into<String>) -> Self {
        Self {
            success: true,
            order_no: order_no.into(),
            message: "reconciled".into(),
            step: None,
        }
    }

    pub fn ok_with(order_no: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            order_no: order_no.into(),
            message: message.into(),
            step: None,
        }
    }

    pub fn fail(
        order_no: impl Into<String>,
        step: ExceptionStep,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            order_no: order_no.into(),
            message: message.into(),
            step: Some(step),
        }
    }

    pub fn not_found(order_no: impl Into<String>) -> Self {
        Self {
            success: false,
            order_no: order_no.into(),
            message: "order not found".into(),
            step: None,
        }
    }
}

/// Full persisted view of one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub header: OrderHeader,
    pub sub_orders: Vec<SubOrder>,
    pub split_details: Vec<SplitDetail>,
    pub settlements: Vec<MerchantSettlement>,
    pub refund_splits: Vec<RefundSplit>,
}

/// Outcome of one timing sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingReconReport {
    pub date: NaiveDate,
    /// Orders examined, including skipped ones.
    pub processed: u64,
    pub resolved: u64,
    pub failed: u64,
    /// Orders left PENDING because a business side is still processing.
    pub skipped: u64,
}
