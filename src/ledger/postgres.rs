use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use super::models::*;
use super::repository::ReconStore;
use crate::error::{ReconError, ReconResult};

/// Postgres-backed [`ReconStore`].
///
/// Statements are limited to what the trait needs; every write is an
/// idempotent upsert on the natural business key so realtime retries and
/// batch re-sweeps can safely replay.
pub struct PgReconStore {
    pool: PgPool,
}

impl PgReconStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> ReconResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ReconStore for PgReconStore {
    async fn save_order_header(&self, header: &OrderHeader) -> ReconResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recon_order
                (order_no, pay_amount_fen, platform_income_fen, pay_fee_fen,
                 split_total_amount_fen, pay_status, split_status, notify_status,
                 recon_status, refund_amount_fen, refund_status, refund_time,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (order_no) DO UPDATE SET
                pay_amount_fen = EXCLUDED.pay_amount_fen,
                platform_income_fen = EXCLUDED.platform_income_fen,
                pay_fee_fen = EXCLUDED.pay_fee_fen,
                split_total_amount_fen = EXCLUDED.split_total_amount_fen,
                pay_status = EXCLUDED.pay_status,
                split_status = EXCLUDED.split_status,
                notify_status = EXCLUDED.notify_status,
                recon_status = EXCLUDED.recon_status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&header.order_no)
        .bind(header.pay_amount_fen)
        .bind(header.platform_income_fen)
        .bind(header.pay_fee_fen)
        .bind(header.split_total_amount_fen)
        .bind(header.pay_status)
        .bind(header.split_status)
        .bind(header.notify_status)
        .bind(header.recon_status)
        .bind(header.refund_amount_fen)
        .bind(header.refund_status)
        .bind(header.refund_time)
        .bind(header.created_at)
        .bind(header.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn batch_save_sub_orders(&self, subs: &[SubOrder]) -> ReconResult<()> {
        for sub in subs {
            sqlx::query(
                r#"
                INSERT INTO recon_sub_order
                    (order_no, sub_order_no, merchant_order_no, merchant_id,
                     order_amount_fen, split_amount_fen, fee_fen, split_ratio,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (order_no, sub_order_no) DO UPDATE SET
                    merchant_order_no = EXCLUDED.merchant_order_no,
                    merchant_id = EXCLUDED.merchant_id,
                    order_amount_fen = EXCLUDED.order_amount_fen,
                    split_amount_fen = EXCLUDED.split_amount_fen,
                    fee_fen = EXCLUDED.fee_fen,
                    split_ratio = EXCLUDED.split_ratio,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&sub.order_no)
            .bind(&sub.sub_order_no)
            .bind(&sub.merchant_order_no)
            .bind(&sub.merchant_id)
            .bind(sub.order_amount_fen)
            .bind(sub.split_amount_fen)
            .bind(sub.fee_fen)
            .bind(sub.split_ratio)
            .bind(sub.created_at)
            .bind(sub.updated_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn batch_save_split_details(&self, details: &[SplitDetail]) -> ReconResult<()> {
        for detail in details {
            sqlx::query(
                r#"
                INSERT INTO recon_split_detail
                    (order_no, merchant_id, split_amount_fen, arrival_amount_fen,
                     split_fee_fen, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (order_no, merchant_id) DO UPDATE SET
                    split_amount_fen = EXCLUDED.split_amount_fen,
                    arrival_amount_fen = EXCLUDED.arrival_amount_fen,
                    split_fee_fen = EXCLUDED.split_fee_fen,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&detail.order_no)
            .bind(&detail.merchant_id)
            .bind(detail.split_amount_fen)
            .bind(detail.arrival_amount_fen)
            .bind(detail.split_fee_fen)
            .bind(detail.created_at)
            .bind(detail.updated_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn batch_save_merchant_settlements(
        &self,
        settlements: &[MerchantSettlement],
    ) -> ReconResult<()> {
        for settlement in settlements {
            sqlx::query(
                r#"
                INSERT INTO recon_merchant_settlement
                    (order_no, merchant_id, settlement_type, order_amount_fen,
                     split_amount_fen, split_fee_fen, arrival_amount_fen,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (order_no, merchant_id) DO UPDATE SET
                    settlement_type = EXCLUDED.settlement_type,
                    order_amount_fen = EXCLUDED.order_amount_fen,
                    split_amount_fen = EXCLUDED.split_amount_fen,
                    split_fee_fen = EXCLUDED.split_fee_fen,
                    arrival_amount_fen = EXCLUDED.arrival_amount_fen,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&settlement.order_no)
            .bind(&settlement.merchant_id)
            .bind(settlement.settlement_type)
            .bind(settlement.order_amount_fen)
            .bind(settlement.split_amount_fen)
            .bind(settlement.split_fee_fen)
            .bind(settlement.arrival_amount_fen)
            .bind(settlement.created_at)
            .bind(settlement.updated_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn batch_save_refund_splits(&self, splits: &[RefundSplit]) -> ReconResult<()> {
        for split in splits {
            sqlx::query(
                r#"
                INSERT INTO recon_refund_split
                    (order_no, merchant_id, refund_split_amount_fen, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (order_no, merchant_id) DO UPDATE SET
                    refund_split_amount_fen = EXCLUDED.refund_split_amount_fen,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&split.order_no)
            .bind(&split.merchant_id)
            .bind(split.refund_split_amount_fen)
            .bind(split.created_at)
            .bind(split.updated_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn save_exception(&self, record: &ExceptionRecord) -> ReconResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recon_exception
                (order_no, merchant_id, exception_msg, exception_step, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.order_no)
        .bind(&record.merchant_id)
        .bind(&record.exception_msg)
        .bind(record.exception_step)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_notify_log(&self, log: &NotifyLog) -> ReconResult<()> {
        sqlx::query(
            r#"
            INSERT INTO recon_notify_log
                (order_no, sub_order_no, merchant_id, notify_url, notify_status,
                 notify_result, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&log.order_no)
        .bind(&log.sub_order_no)
        .bind(&log.merchant_id)
        .bind(&log.notify_url)
        .bind(log.notify_status)
        .bind(&log.notify_result)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_order_by_no(&self, order_no: &str) -> ReconResult<Option<OrderHeader>> {
        let header = sqlx::query_as::<_, OrderHeader>(
            r#"
            SELECT order_no, pay_amount_fen, platform_income_fen, pay_fee_fen,
                   split_total_amount_fen, pay_status, split_status, notify_status,
                   recon_status, refund_amount_fen, refund_status, refund_time,
                   created_at, updated_at
            FROM recon_order
            WHERE order_no = $1
            "#,
        )
        .bind(order_no)
        .fetch_optional(&self.pool)
        .await?;
        Ok(header)
    }

    async fn get_sub_orders(&self, order_no: &str) -> ReconResult<Vec<SubOrder>> {
        let subs = sqlx::query_as::<_, SubOrder>(
            r#"
            SELECT order_no, sub_order_no, merchant_order_no, merchant_id,
                   order_amount_fen, split_amount_fen, fee_fen, split_ratio,
                   created_at, updated_at
            FROM recon_sub_order
            WHERE order_no = $1
            ORDER BY sub_order_no
            "#,
        )
        .bind(order_no)
        .fetch_all(&self.pool)
        .await?;
        Ok(subs)
    }

    async fn get_split_details(&self, order_no: &str) -> ReconResult<Vec<SplitDetail>> {
        let details = sqlx::query_as::<_, SplitDetail>(
            r#"
            SELECT order_no, merchant_id, split_amount_fen, arrival_amount_fen,
                   split_fee_fen, created_at, updated_at
            FROM recon_split_detail
            WHERE order_no = $1
            ORDER BY merchant_id
            "#,
        )
        .bind(order_no)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    async fn get_merchant_settlements(
        &self,
        order_no: &str,
    ) -> ReconResult<Vec<MerchantSettlement>> {
        let settlements = sqlx::query_as::<_, MerchantSettlement>(
            r#"
            SELECT order_no, merchant_id, settlement_type, order_amount_fen,
                   split_amount_fen, split_fee_fen, arrival_amount_fen,
                   created_at, updated_at
            FROM recon_merchant_settlement
            WHERE order_no = $1
            ORDER BY merchant_id
            "#,
        )
        .bind(order_no)
        .fetch_all(&self.pool)
        .await?;
        Ok(settlements)
    }

    async fn get_refund_splits(&self, order_no: &str) -> ReconResult<Vec<RefundSplit>> {
        let splits = sqlx::query_as::<_, RefundSplit>(
            r#"
            SELECT order_no, merchant_id, refund_split_amount_fen, created_at, updated_at
            FROM recon_refund_split
            WHERE order_no = $1
            ORDER BY merchant_id
            "#,
        )
        .bind(order_no)
        .fetch_all(&self.pool)
        .await?;
        Ok(splits)
    }

    async fn get_exceptions(&self, order_no: &str) -> ReconResult<Vec<ExceptionRecord>> {
        let records = sqlx::query_as::<_, ExceptionRecord>(
            r#"
            SELECT order_no, merchant_id, exception_msg, exception_step, created_at
            FROM recon_exception
            WHERE order_no = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_no)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn get_notify_logs(&self, order_no: &str) -> ReconResult<Vec<NotifyLog>> {
        let logs = sqlx::query_as::<_, NotifyLog>(
            r#"
            SELECT order_no, sub_order_no, merchant_id, notify_url, notify_status,
                   notify_result, created_at
            FROM recon_notify_log
            WHERE order_no = $1
            ORDER BY created_at
            "#,
        )
        .bind(order_no)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn get_pending_orders(
        &self,
        date: NaiveDate,
        offset: i64,
        limit: i64,
    ) -> ReconResult<Vec<OrderHeader>> {
        let orders = sqlx::query_as::<_, OrderHeader>(
            r#"
            SELECT order_no, pay_amount_fen, platform_income_fen, pay_fee_fen,
                   split_total_amount_fen, pay_status, split_status, notify_status,
                   recon_status, refund_amount_fen, refund_status, refund_time,
                   created_at, updated_at
            FROM recon_order
            WHERE recon_status = 0
              AND (created_at AT TIME ZONE 'UTC')::date = $1
            ORDER BY created_at ASC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(date)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    async fn update_recon_status(&self, order_no: &str, status: ReconStatus) -> ReconResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE recon_order
            SET recon_status = $2, updated_at = now()
            WHERE order_no = $1
            "#,
        )
        .bind(order_no)
        .bind(status)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ReconError::NotFound(format!("order {order_no}")));
        }
        Ok(())
    }

    async fn update_refund_status(
        &self,
        order_no: &str,
        status: RefundStatus,
        refund_amount_fen: i64,
        refund_time: Option<DateTime<Utc>>,
    ) -> ReconResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE recon_order
            SET refund_status = $2, refund_amount_fen = $3, refund_time = $4,
                updated_at = now()
            WHERE order_no = $1
            "#,
        )
        .bind(order_no)
        .bind(status)
        .bind(refund_amount_fen)
        .bind(refund_time)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ReconError::NotFound(format!("order {order_no}")));
        }
        Ok(())
    }

    async fn find_order_no_by_sub_order(
        &self,
        merchant_id: &str,
        sub_order_no: &str,
    ) -> ReconResult<Option<String>> {
        let order_no = sqlx::query_scalar::<_, String>(
            r#"
            SELECT order_no FROM recon_sub_order
            WHERE merchant_id = $1 AND sub_order_no = $2
            LIMIT 1
            "#,
        )
        .bind(merchant_id)
        .bind(sub_order_no)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order_no)
    }

    async fn find_order_no_by_merchant_order(
        &self,
        merchant_id: &str,
        merchant_order_no: &str,
    ) -> ReconResult<Option<String>> {
        let order_no = sqlx::query_scalar::<_, String>(
            r#"
            SELECT order_no FROM recon_sub_order
            WHERE merchant_id = $1 AND merchant_order_no = $2
            LIMIT 1
            "#,
        )
        .bind(merchant_id)
        .bind(merchant_order_no)
        .fetch_optional(&self.pool)
        .await?;
        Ok(order_no)
    }

    async fn get_summary(&self, date: NaiveDate) -> ReconResult<ReconSummary> {
        let summary = sqlx::query_as::<_, ReconSummary>(
            r#"
            SELECT $1::date AS summary_date,
                   COUNT(*) AS total_orders,
                   COUNT(*) FILTER (WHERE recon_status = 1) AS success_count,
                   COUNT(*) FILTER (WHERE recon_status = 2) AS fail_count,
                   COUNT(*) FILTER (WHERE recon_status = 0) AS pending_count,
                   COALESCE(SUM(pay_amount_fen), 0)::bigint AS total_amount_fen
            FROM recon_order
            WHERE (created_at AT TIME ZONE 'UTC')::date = $1
            "#,
        )
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }
}
