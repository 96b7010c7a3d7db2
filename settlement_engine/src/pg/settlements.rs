use chrono::NaiveDate;
use sqlx::PgConnection;

use crate::{
    db_types::{NewSettlement, Settlement},
    traits::PlatformError,
};

/// Insert-or-merge on `(merchant_id, date)`. The merge is ADDITIVE: conflicting rows accumulate
/// gross/fee/net/txn_count rather than being replaced, so re-running a window over the same
/// transactions doubles the stored totals.
pub async fn upsert(row: &NewSettlement, conn: &mut PgConnection) -> Result<(), PlatformError> {
    sqlx::query(
        r#"
            INSERT INTO settlements
                (merchant_id, date, gross_cents, fee_cents, net_cents, txn_count, generated_at, unique_run_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (merchant_id, date)
            DO UPDATE SET
                gross_cents = settlements.gross_cents + EXCLUDED.gross_cents,
                fee_cents = settlements.fee_cents + EXCLUDED.fee_cents,
                net_cents = settlements.net_cents + EXCLUDED.net_cents,
                txn_count = settlements.txn_count + EXCLUDED.txn_count,
                updated_at = NOW()
        "#,
    )
    .bind(&row.merchant_id)
    .bind(row.date)
    .bind(row.gross_cents)
    .bind(row.fee_cents)
    .bind(row.net_cents)
    .bind(row.txn_count)
    .bind(row.generated_at)
    .bind(row.unique_run_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_by_merchant_and_date(
    merchant_id: &str,
    date: NaiveDate,
    conn: &mut PgConnection,
) -> Result<Option<Settlement>, PlatformError> {
    let settlement =
        sqlx::query_as::<_, Settlement>("SELECT * FROM settlements WHERE merchant_id = $1 AND date = $2")
            .bind(merchant_id)
            .bind(date)
            .fetch_optional(conn)
            .await?;
    Ok(settlement)
}
