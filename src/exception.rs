use std::sync::Arc;

use chrono::Utc;
use tracing::error;

use crate::ledger::models::{ExceptionRecord, ExceptionStep};
use crate::ledger::ReconStore;

/// Append-only audit trail for reconciliation failures.
///
/// Recording never raises: the audit trail is best-effort and must not turn
/// a domain failure into an infrastructure one. Store errors are logged and
/// swallowed.
pub struct ExceptionRecordService {
    store: Arc<dyn ReconStore>,
}

impl ExceptionRecordService {
    pub fn new(store: Arc<dyn ReconStore>) -> Self {
        Self { store }
    }

    /// `merchant_id` is `"SELF"` for order-level records.
    pub async fn record(
        &self,
        order_no: &str,
        merchant_id: &str,
        message: &str,
        step: ExceptionStep,
    ) {
        let record = ExceptionRecord {
            order_no: order_no.to_string(),
            merchant_id: merchant_id.to_string(),
            exception_msg: message.to_string(),
            exception_step: step,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.save_exception(&record).await {
            error!(order_no, step = step.code(), "failed to persist exception record: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryReconStore;

    #[tokio::test]
    async fn records_append_without_overwriting() {
        let store = Arc::new(MemoryReconStore::new());
        let service = ExceptionRecordService::new(store.clone());

        service
            .record("ORD-1", "SELF", "pay status failure", ExceptionStep::PayStatus)
            .await;
        service
            .record("ORD-1", "M_A", "amount mismatch", ExceptionStep::AmountCheck)
            .await;

        let records = store.get_exceptions("ORD-1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].exception_step, ExceptionStep::PayStatus);
        assert_eq!(records[1].merchant_id, "M_A");
    }
}
