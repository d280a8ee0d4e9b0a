use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ledger::models::{BusinessStatus, RefundStatus};
use crate::money::AmountInput;

// ========== REQUEST MODELS ==========

fn zero_amount() -> AmountInput {
    AmountInput::Fen(0)
}

/// Order reconciliation request: the intent layer (sub-orders) plus the
/// channel-confirmed fact layer (split details). Amounts arrive as either
/// minor units or decimals and are normalized to minor units before the
/// pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderReconRequest {
    #[validate(length(min = 1, max = 64))]
    pub order_no: String,

    pub pay_amount: AmountInput,
    #[serde(default = "zero_amount")]
    pub platform_income: AmountInput,
    #[serde(default = "zero_amount")]
    pub pay_fee: AmountInput,

    #[serde(default)]
    pub pay_status: BusinessStatus,
    #[serde(default)]
    pub split_status: BusinessStatus,
    #[serde(default)]
    pub notify_status: BusinessStatus,

    /// Intent layer: what the business declared each merchant should get.
    #[validate]
    #[serde(default)]
    pub sub_orders: Vec<SubOrderRequest>,

    /// Fact layer: what the channel confirmed it distributed.
    #[validate]
    #[serde(default)]
    pub split_details: Vec<SplitDetailRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubOrderRequest {
    #[validate(length(min = 1, max = 64))]
    pub sub_order_no: String,
    #[validate(length(min = 1, max = 64))]
    pub merchant_id: String,
    pub merchant_order_no: Option<String>,

    pub order_amount: AmountInput,
    /// Intended split value; falls back to the order amount when absent.
    pub split_amount: Option<AmountInput>,
    pub fee: Option<AmountInput>,
    /// Basis points, 0..=10000.
    #[validate(range(min = 0, max = 10000))]
    pub split_ratio: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SplitDetailRequest {
    #[validate(length(min = 1, max = 64))]
    pub merchant_id: String,
    pub split_amount: AmountInput,
    /// Net amount that reached the merchant.
    pub arrival_amount: Option<AmountInput>,
    pub split_fee: Option<AmountInput>,
}

/// Refund reconciliation request. The parent order is resolved by order_no
/// when present, otherwise by (merchant_id, merchant_order_no) or
/// (merchant_id, sub_order_no).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefundReconRequest {
    pub order_no: Option<String>,
    pub merchant_id: Option<String>,
    pub merchant_order_no: Option<String>,
    pub sub_order_no: Option<String>,

    pub refund_amount: AmountInput,
    #[serde(default)]
    pub refund_status: RefundStatus,
    pub refund_time: Option<DateTime<Utc>>,

    #[validate]
    #[serde(default)]
    pub refund_splits: Vec<RefundSplitRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RefundSplitRequest {
    #[validate(length(min = 1, max = 64))]
    pub merchant_id: String,
    pub refund_split_amount: AmountInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_statuses_and_zero_amounts() {
        let request: OrderReconRequest = serde_json::from_str(
            r#"{"order_no":"ORD-1","pay_amount":{"fen":5000}}"#,
        )
        .unwrap();
        assert_eq!(request.pay_status, BusinessStatus::Success);
        assert_eq!(request.platform_income.to_fen().unwrap(), 0);
        assert!(request.sub_orders.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn split_ratio_outside_basis_points_is_rejected() {
        let request = OrderReconRequest {
            order_no: "ORD-1".into(),
            pay_amount: AmountInput::Fen(5000),
            platform_income: AmountInput::Fen(0),
            pay_fee: AmountInput::Fen(0),
            pay_status: BusinessStatus::Success,
            split_status: BusinessStatus::Success,
            notify_status: BusinessStatus::Success,
            sub_orders: vec![SubOrderRequest {
                sub_order_no: "SUB-1".into(),
                merchant_id: "M_A".into(),
                merchant_order_no: None,
                order_amount: AmountInput::Fen(5000),
                split_amount: None,
                fee: None,
                split_ratio: Some(10001),
            }],
            split_details: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn empty_order_no_is_rejected() {
        let request: OrderReconRequest = serde_json::from_str(
            r#"{"order_no":"","pay_amount":{"fen":5000}}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }
}
