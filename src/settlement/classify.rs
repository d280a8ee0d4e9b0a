//! Settlement-type inference.
//!
//! Pure classification over the intent layer (declared per-merchant split
//! expectations) and the fact layer (channel-confirmed distribution). No
//! I/O; deterministic for fixed inputs, independent of invocation order.

use std::collections::{BTreeMap, BTreeSet};

use crate::ledger::models::SettlementType;

/// Aggregated fact-side totals for one merchant of one order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FactTotals {
    pub split_amount_fen: i64,
    pub split_fee_fen: i64,
    pub arrival_amount_fen: i64,
}

/// One classification per merchant key in intent ∪ fact. Fact-side fields
/// are zero for intent-only merchants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantClassification {
    pub merchant_id: String,
    pub settlement_type: SettlementType,
    pub order_amount_fen: i64,
    pub split_amount_fen: i64,
    pub split_fee_fen: i64,
    pub arrival_amount_fen: i64,
}

/// Classify every merchant of an order.
///
/// - DIRECT_TO_MERCHANT: present in both layers and fact equals intent
///   within `tolerance_fen`, funds went straight through;
/// - REALTIME_SPLIT: present in both layers with fact strictly below
///   intent, the channel withheld a portion during distribution;
/// - PLATFORM_COLLECTION: present in exactly one layer, the platform holds
///   the money (fact-only: no declared recipient; intent-only: the
///   recipient never received it);
/// - UNKNOWN: fact above intent beyond tolerance, anomalous.
pub fn classify_settlements(
    intent: &BTreeMap<String, i64>,
    facts: &BTreeMap<String, FactTotals>,
    tolerance_fen: i64,
) -> Vec<MerchantClassification> {
    let merchants: BTreeSet<&String> = intent.keys().chain(facts.keys()).collect();

    merchants
        .into_iter()
        .map(|merchant_id| {
            let declared = intent.get(merchant_id).copied();
            let confirmed = facts.get(merchant_id).copied();

            let settlement_type = match (declared, confirmed) {
                (Some(intent_fen), Some(fact)) => {
                    if (fact.split_amount_fen - intent_fen).abs() <= tolerance_fen {
                        SettlementType::DirectToMerchant
                    } else if fact.split_amount_fen < intent_fen {
                        SettlementType::RealtimeSplit
                    } else {
                        SettlementType::Unknown
                    }
                }
                _ => SettlementType::PlatformCollection,
            };

            let fact = confirmed.unwrap_or_default();
            MerchantClassification {
                merchant_id: merchant_id.clone(),
                settlement_type,
                order_amount_fen: declared.unwrap_or(0),
                split_amount_fen: fact.split_amount_fen,
                split_fee_fen: fact.split_fee_fen,
                arrival_amount_fen: fact.arrival_amount_fen,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(m, v)| (m.to_string(), *v)).collect()
    }

    fn facts(pairs: &[(&str, i64)]) -> BTreeMap<String, FactTotals> {
        pairs
            .iter()
            .map(|(m, v)| {
                (
                    m.to_string(),
                    FactTotals {
                        split_amount_fen: *v,
                        split_fee_fen: 0,
                        arrival_amount_fen: *v,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn equal_amounts_classify_as_direct_to_merchant() {
        let rows = classify_settlements(&intent(&[("M_A", 5000)]), &facts(&[("M_A", 5000)]), 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].settlement_type, SettlementType::DirectToMerchant);
        assert_eq!(rows[0].order_amount_fen, 5000);
        assert_eq!(rows[0].split_amount_fen, 5000);
    }

    #[test]
    fn withheld_portion_classifies_as_realtime_split() {
        let rows = classify_settlements(&intent(&[("M_B", 4000)]), &facts(&[("M_B", 3800)]), 1);
        assert_eq!(rows[0].settlement_type, SettlementType::RealtimeSplit);
    }

    #[test]
    fn intent_only_classifies_as_platform_collection() {
        let rows = classify_settlements(&intent(&[("M_C", 1000)]), &facts(&[]), 1);
        assert_eq!(rows[0].settlement_type, SettlementType::PlatformCollection);
        assert_eq!(rows[0].order_amount_fen, 1000);
        assert_eq!(rows[0].split_amount_fen, 0);
        assert_eq!(rows[0].arrival_amount_fen, 0);
    }

    #[test]
    fn fact_only_classifies_as_platform_collection() {
        let rows = classify_settlements(&intent(&[]), &facts(&[("M_P", 1200)]), 1);
        assert_eq!(rows[0].settlement_type, SettlementType::PlatformCollection);
        assert_eq!(rows[0].order_amount_fen, 0);
        assert_eq!(rows[0].split_amount_fen, 1200);
    }

    #[test]
    fn equality_applies_configured_tolerance() {
        let rows = classify_settlements(&intent(&[("M_A", 5000)]), &facts(&[("M_A", 4999)]), 1);
        assert_eq!(rows[0].settlement_type, SettlementType::DirectToMerchant);

        let rows = classify_settlements(&intent(&[("M_A", 5000)]), &facts(&[("M_A", 4998)]), 1);
        assert_eq!(rows[0].settlement_type, SettlementType::RealtimeSplit);
    }

    #[test]
    fn fact_exceeding_intent_is_unknown() {
        let rows = classify_settlements(&intent(&[("M_A", 5000)]), &facts(&[("M_A", 5500)]), 1);
        assert_eq!(rows[0].settlement_type, SettlementType::Unknown);
    }

    #[test]
    fn output_covers_union_and_is_deterministic() {
        let i = intent(&[("M_A", 5000), ("M_C", 1000)]);
        let f = facts(&[("M_A", 5000), ("M_P", 1200)]);
        let first = classify_settlements(&i, &f, 1);
        let second = classify_settlements(&i, &f, 1);
        assert_eq!(first, second);
        let merchants: Vec<&str> = first.iter().map(|r| r.merchant_id.as_str()).collect();
        assert_eq!(merchants, vec!["M_A", "M_C", "M_P"]);
    }
}
