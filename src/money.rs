//! Canonical amount handling.
//!
//! Every amount in the system is stored as an i64 count of minor units
//! (fen). The decimal major-unit view is derived on read and never stored,
//! so the two representations cannot drift.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ReconError, ReconResult};

pub const FEN_PER_YUAN: i64 = 100;

/// Derived decimal view of a minor-unit amount (scale 2, exact).
pub fn fen_to_decimal(fen: i64) -> Decimal {
    Decimal::new(fen, 2)
}

/// Minor-unit value of a decimal amount: multiplied by 100 and truncated.
/// Exact for inputs already expressed to two-decimal precision.
pub fn decimal_to_fen(value: Decimal) -> ReconResult<i64> {
    let scaled = value
        .checked_mul(Decimal::from(FEN_PER_YUAN))
        .ok_or_else(|| ReconError::InvalidAmount(format!("amount out of range: {value}")))?;
    scaled
        .trunc()
        .to_i64()
        .ok_or_else(|| ReconError::InvalidAmount(format!("amount out of range: {value}")))
}

/// An amount as submitted by a caller: either the authoritative minor-unit
/// integer or the decimal major-unit form. Normalized to fen at the ingress
/// boundary; nothing downstream ever sees both representations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountInput {
    Fen(i64),
    Decimal(Decimal),
}

impl AmountInput {
    pub fn to_fen(self) -> ReconResult<i64> {
        match self {
            AmountInput::Fen(fen) => Ok(fen),
            AmountInput::Decimal(value) => decimal_to_fen(value),
        }
    }
}

/// Null in one representation yields null in the derived one.
pub fn optional_fen(amount: Option<AmountInput>) -> ReconResult<Option<i64>> {
    amount.map(AmountInput::to_fen).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn two_decimal_inputs_convert_exactly() {
        assert_eq!(decimal_to_fen(dec!(50.00)).unwrap(), 5000);
        assert_eq!(decimal_to_fen(dec!(0.01)).unwrap(), 1);
        assert_eq!(decimal_to_fen(dec!(38.50)).unwrap(), 3850);
        assert_eq!(decimal_to_fen(dec!(0)).unwrap(), 0);
    }

    #[test]
    fn sub_cent_precision_truncates() {
        assert_eq!(decimal_to_fen(dec!(1.239)).unwrap(), 123);
    }

    #[test]
    fn decimal_view_round_trips() {
        assert_eq!(fen_to_decimal(5000), dec!(50.00));
        assert_eq!(decimal_to_fen(fen_to_decimal(12345)).unwrap(), 12345);
    }

    #[test]
    fn fen_input_is_authoritative() {
        assert_eq!(AmountInput::Fen(4200).to_fen().unwrap(), 4200);
        assert_eq!(AmountInput::Decimal(dec!(42.00)).to_fen().unwrap(), 4200);
    }

    #[test]
    fn none_maps_to_none() {
        assert_eq!(optional_fen(None).unwrap(), None);
        assert_eq!(
            optional_fen(Some(AmountInput::Fen(7))).unwrap(),
            Some(7)
        );
    }

    #[test]
    fn tagged_serde_form() {
        let json = serde_json::to_string(&AmountInput::Fen(5000)).unwrap();
        assert_eq!(json, r#"{"fen":5000}"#);
        let parsed: AmountInput = serde_json::from_str(r#"{"decimal":50.0}"#).unwrap();
        assert_eq!(parsed.to_fen().unwrap(), 5000);
    }
}
