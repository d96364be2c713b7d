use anyhow::Result;
use sqlx::PgPool;

use crate::domain::ConsumptionSample;

/// Create the consumption table if it does not exist yet.
///
/// The unique constraint on `(start_date, end_date)` is the natural-key
/// uniqueness boundary the merge relies on; concurrent writers racing on
/// the same interval are de-conflicted here, not in application code.
pub async fn ensure_consumption_table(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS electricity_consumption (
            start_date   TIMESTAMPTZ NOT NULL,
            end_date     TIMESTAMPTZ NOT NULL,
            updated_date TIMESTAMPTZ,
            value        DOUBLE PRECISION NOT NULL,
            CONSTRAINT electricity_consumption_interval_key UNIQUE (start_date, end_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch the newest stored samples, most recent interval first.
pub async fn recent_consumption(pool: &PgPool, limit: i64) -> Result<Vec<ConsumptionSample>> {
    let rows = sqlx::query_as::<_, ConsumptionSample>(
        r#"
        SELECT
            start_date,
            end_date,
            updated_date,
            value
        FROM electricity_consumption
        ORDER BY start_date DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
