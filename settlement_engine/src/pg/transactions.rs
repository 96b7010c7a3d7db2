use sqlx::{PgConnection, QueryBuilder};

use crate::{
    db_types::{NewTransaction, SettlementWindow, Transaction},
    traits::PlatformError,
};

pub async fn count_completed(window: &SettlementWindow, conn: &mut PgConnection) -> Result<i64, PlatformError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transactions WHERE paid_at >= $1 AND paid_at < $2 AND status = 'COMPLETED'",
    )
    .bind(window.from)
    .bind(window.to)
    .fetch_one(conn)
    .await?;
    Ok(count)
}

/// One page of COMPLETED transactions inside the window. The id ordering makes offset paging
/// stable across the whole run.
pub async fn page_completed(
    window: &SettlementWindow,
    offset: i64,
    limit: i64,
    conn: &mut PgConnection,
) -> Result<Vec<Transaction>, PlatformError> {
    let page = sqlx::query_as::<_, Transaction>(
        r#"
            SELECT * FROM transactions
            WHERE paid_at >= $1 AND paid_at < $2 AND status = 'COMPLETED'
            ORDER BY id
            LIMIT $3 OFFSET $4
        "#,
    )
    .bind(window.from)
    .bind(window.to)
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await?;
    Ok(page)
}

/// Multi-row insert for the seeder and test fixtures.
pub async fn bulk_insert(batch: &[NewTransaction], conn: &mut PgConnection) -> Result<(), PlatformError> {
    if batch.is_empty() {
        return Ok(());
    }
    let mut builder =
        QueryBuilder::new("INSERT INTO transactions (merchant_id, amount_cents, fee_cents, status, paid_at) ");
    builder.push_values(batch, |mut row, txn| {
        row.push_bind(&txn.merchant_id)
            .push_bind(txn.amount_cents)
            .push_bind(txn.fee_cents)
            .push_bind(txn.status.to_string())
            .push_bind(txn.paid_at);
    });
    builder.build().execute(conn).await?;
    Ok(())
}
