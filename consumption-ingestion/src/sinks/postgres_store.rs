use std::time::Duration;

use rte_client::{db::consumption_queries, domain::ConsumptionSample};
use sqlx::{postgres::PgPool, Postgres, QueryBuilder};

use crate::sinks::{ConsumptionStore, StoreError};

pub struct PostgresStore {
    pool: PgPool,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl PostgresStore {
    pub fn new(pool: PgPool, batch_size: usize, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
            max_retries,
            retry_backoff,
        }
    }

    /// One transaction over the whole batch: every chunk is evaluated
    /// against current store state, or nothing is committed. Duplicate
    /// natural keys, including races with a concurrent run, fall into the
    /// conflict clause instead of failing the batch.
    async fn merge_batch(&self, batch: &[ConsumptionSample]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in batch.chunks(self.batch_size) {
            let mut builder = insert_chunk(chunk);
            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

fn insert_chunk(chunk: &[ConsumptionSample]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO electricity_consumption (start_date, end_date, updated_date, value) ",
    );

    builder.push_values(chunk, |mut b, sample| {
        b.push_bind(sample.start_time)
            .push_bind(sample.end_time)
            .push_bind(sample.updated_time)
            .push_bind(sample.value);
    });
    builder.push(" ON CONFLICT (start_date, end_date) DO NOTHING");

    builder
}

#[async_trait::async_trait]
impl ConsumptionStore for PostgresStore {
    async fn merge(&self, batch: &[ConsumptionSample]) -> Result<u64, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut attempt: u32 = 0;
        loop {
            match self.merge_batch(batch).await {
                Ok(inserted) => {
                    tracing::info!(
                        staged = batch.len(),
                        inserted,
                        skipped = batch.len() as u64 - inserted,
                        "consumption batch merged"
                    );
                    return Ok(inserted);
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "consumption merge failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "consumption merge failed, giving up");
                    return Err(StoreError::Sql(e));
                }
            }
        }
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ConsumptionSample>, StoreError> {
        consumption_queries::recent_consumption(&self.pool, limit)
            .await
            .map_err(|e| StoreError::ReadBack(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;
    use time::macros::datetime;

    fn sample(hour: u8) -> ConsumptionSample {
        ConsumptionSample {
            start_time: datetime!(2024-01-01 00:00:00 UTC) + time::Duration::hours(hour as i64),
            end_time: datetime!(2024-01-01 00:15:00 UTC) + time::Duration::hours(hour as i64),
            updated_time: Some(datetime!(2024-01-01 00:20:00 UTC)),
            value: 50_000.0,
        }
    }

    #[test]
    fn insert_statement_skips_existing_natural_keys() {
        let chunk = vec![sample(0), sample(1)];
        let mut builder = insert_chunk(&chunk);
        let query = builder.build();

        let sql = query.sql();
        assert!(sql.starts_with(
            "INSERT INTO electricity_consumption (start_date, end_date, updated_date, value) VALUES"
        ));
        assert!(sql.ends_with("ON CONFLICT (start_date, end_date) DO NOTHING"));
    }

    #[test]
    fn insert_statement_binds_all_four_columns_per_row() {
        let chunk = vec![sample(0), sample(1), sample(2)];
        let mut builder = insert_chunk(&chunk);
        let query = builder.build();

        let placeholders = (1..=12).map(|i| format!("${i}")).collect::<Vec<_>>();
        let sql = query.sql();
        for p in &placeholders {
            assert!(sql.contains(p.as_str()), "missing placeholder {p} in {sql}");
        }
        assert!(!sql.contains("$13"));
    }
}
