pub mod postgres_store;

pub use postgres_store::PostgresStore;

use rte_client::domain::ConsumptionSample;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("store read-back failed: {0}")]
    ReadBack(String),
}

#[async_trait::async_trait]
pub trait ConsumptionStore: Send + Sync {
    /// Merge an already-deduplicated batch into the store and return the
    /// number of rows actually inserted.
    ///
    /// Insert-only-if-absent: rows whose natural key already exists are
    /// skipped untouched; a revision to a stored interval is never
    /// applied. The merge is atomic: either the whole batch is evaluated
    /// against current store state, or nothing is committed.
    async fn merge(&self, batch: &[ConsumptionSample]) -> Result<u64, StoreError>;

    /// Read back the newest stored samples for rendering, most recent
    /// interval first.
    async fn recent(&self, limit: i64) -> Result<Vec<ConsumptionSample>, StoreError>;
}
