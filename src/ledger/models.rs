use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::money::fen_to_decimal;

/// Merchant id used for order-level (non-merchant) audit records.
pub const ORDER_LEVEL_MERCHANT: &str = "SELF";

/// Status of one business side of an order (pay / split / notify).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum BusinessStatus {
    Processing = 0,
    Success = 1,
    Failure = 2,
}

impl Default for BusinessStatus {
    fn default() -> Self {
        BusinessStatus::Success
    }
}

/// Reconciliation lifecycle of an order.
///
/// Transitions PENDING -> {SUCCESS, FAILURE} monotonically; returning to
/// PENDING requires an explicit retry call, never an implicit side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum ReconStatus {
    Pending = 0,
    Success = 1,
    Failure = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum RefundStatus {
    Processing = 0,
    Success = 1,
    Failure = 2,
}

impl Default for RefundStatus {
    fn default() -> Self {
        RefundStatus::Success
    }
}

/// How a merchant's funds arrived, derived by comparing the intent and fact
/// layers. `Unknown` marks the anomalous case of a fact amount exceeding the
/// declared intent beyond tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum SettlementType {
    Unknown = 0,
    PlatformCollection = 1,
    DirectToMerchant = 2,
    RealtimeSplit = 3,
}

/// Pipeline step an exception record is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum ExceptionStep {
    PayStatus = 1,
    SplitStatus = 2,
    NotifyStatus = 3,
    AmountCheck = 4,
    Other = 5,
}

impl ExceptionStep {
    pub fn code(self) -> i16 {
        self as i16
    }
}

/// Order header. All monetary fields are minor units; the decimal views are
/// derived accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OrderHeader {
    pub order_no: String,
    pub pay_amount_fen: i64,
    pub platform_income_fen: i64,
    pub pay_fee_fen: i64,
    pub split_total_amount_fen: i64,
    pub pay_status: BusinessStatus,
    pub split_status: BusinessStatus,
    pub notify_status: BusinessStatus,
    pub recon_status: ReconStatus,
    pub refund_amount_fen: Option<i64>,
    pub refund_status: Option<RefundStatus>,
    pub refund_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderHeader {
    pub fn pay_amount(&self) -> Decimal {
        fen_to_decimal(self.pay_amount_fen)
    }

    pub fn platform_income(&self) -> Decimal {
        fen_to_decimal(self.platform_income_fen)
    }

    pub fn pay_fee(&self) -> Decimal {
        fen_to_decimal(self.pay_fee_fen)
    }

    pub fn split_total_amount(&self) -> Decimal {
        fen_to_decimal(self.split_total_amount_fen)
    }

    pub fn refund_amount(&self) -> Option<Decimal> {
        self.refund_amount_fen.map(fen_to_decimal)
    }
}

/// Intent layer: what the business declared a merchant should receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SubOrder {
    pub order_no: String,
    pub sub_order_no: String,
    pub merchant_order_no: Option<String>,
    pub merchant_id: String,
    pub order_amount_fen: i64,
    pub split_amount_fen: Option<i64>,
    pub fee_fen: i64,
    /// Basis points, 0..=10000.
    pub split_ratio: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubOrder {
    /// The amount this sub-order contributes to the intent map: the declared
    /// split value, or the full order amount when no split was given.
    pub fn intent_amount_fen(&self) -> i64 {
        self.split_amount_fen.unwrap_or(self.order_amount_fen)
    }
}

/// Fact layer: what the channel confirmed for a merchant, aggregated to one
/// row per merchant per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SplitDetail {
    pub order_no: String,
    pub merchant_id: String,
    pub split_amount_fen: i64,
    pub arrival_amount_fen: i64,
    pub split_fee_fen: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived settlement row, one per merchant key in intent ∪ fact. Append-only
/// once computed; recomputation upserts by (order_no, merchant_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MerchantSettlement {
    pub order_no: String,
    pub merchant_id: String,
    pub settlement_type: SettlementType,
    pub order_amount_fen: i64,
    pub split_amount_fen: i64,
    pub split_fee_fen: i64,
    pub arrival_amount_fen: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RefundSplit {
    pub order_no: String,
    pub merchant_id: String,
    pub refund_split_amount_fen: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit record for a reconciliation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExceptionRecord {
    pub order_no: String,
    pub merchant_id: String,
    pub exception_msg: String,
    pub exception_step: ExceptionStep,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NotifyLog {
    pub order_no: String,
    pub sub_order_no: Option<String>,
    pub merchant_id: String,
    pub notify_url: Option<String>,
    pub notify_status: BusinessStatus,
    pub notify_result: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Daily reconciliation summary, computed from the order headers of a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReconSummary {
    pub summary_date: NaiveDate,
    pub total_orders: i64,
    pub success_count: i64,
    pub fail_count: i64,
    pub pending_count: i64,
    pub total_amount_fen: i64,
}

impl ReconSummary {
    pub fn total_amount(&self) -> Decimal {
        fen_to_decimal(self.total_amount_fen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_views_are_derived_from_fen() {
        let header = OrderHeader {
            order_no: "ORD-1".into(),
            pay_amount_fen: 12345,
            platform_income_fen: 200,
            pay_fee_fen: 45,
            split_total_amount_fen: 12100,
            pay_status: BusinessStatus::Success,
            split_status: BusinessStatus::Success,
            notify_status: BusinessStatus::Success,
            recon_status: ReconStatus::Pending,
            refund_amount_fen: None,
            refund_status: None,
            refund_time: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(header.pay_amount(), dec!(123.45));
        assert_eq!(header.pay_fee(), dec!(0.45));
        assert_eq!(header.refund_amount(), None);
    }

    #[test]
    fn intent_amount_falls_back_to_order_amount() {
        let now = Utc::now();
        let mut sub = SubOrder {
            order_no: "ORD-1".into(),
            sub_order_no: "SUB-1".into(),
            merchant_order_no: None,
            merchant_id: "M_A".into(),
            order_amount_fen: 5000,
            split_amount_fen: None,
            fee_fen: 0,
            split_ratio: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(sub.intent_amount_fen(), 5000);
        sub.split_amount_fen = Some(4500);
        assert_eq!(sub.intent_amount_fen(), 4500);
    }
}
