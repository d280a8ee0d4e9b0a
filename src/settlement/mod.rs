//! Settlement-type inference over the intent and fact layers.

pub mod classify;

pub use classify::{classify_settlements, FactTotals, MerchantClassification};
