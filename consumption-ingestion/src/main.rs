use anyhow::Result;
use consumption_ingestion::{
    config::{AppConfig, ProviderCredentials},
    observability,
    pipeline::IngestionPipeline,
    render::LineChartRenderer,
    sinks::PostgresStore,
    sources::RteShortTermSource,
};
use rte_client::db::consumption_queries;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use time::OffsetDateTime;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let credentials = ProviderCredentials::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.store.max_connections)
        .connect(&cfg.store.uri)
        .await?;
    consumption_queries::ensure_consumption_table(&pool).await?;

    let source = RteShortTermSource::new(cfg.provider.clone(), credentials)?;
    let store = PostgresStore::new(
        pool,
        cfg.store.batch_size,
        cfg.store.max_retries,
        Duration::from_millis(cfg.store.retry_backoff_ms),
    );
    let renderer = LineChartRenderer::new(cfg.chart.output_dir.clone());

    let pipeline = IngestionPipeline {
        source,
        store,
        renderer,
        lookback: time::Duration::hours(cfg.provider.lookback_hours as i64),
        render_read_limit: cfg.chart.read_limit,
    };

    let report = pipeline.run(OffsetDateTime::now_utc()).await?;

    tracing::info!(
        fetched = report.fetched,
        dropped = report.dropped,
        deduplicated = report.deduplicated,
        inserted = report.inserted,
        chart = ?report.chart,
        "ingestion run complete"
    );

    Ok(())
}
