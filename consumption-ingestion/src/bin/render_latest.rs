use anyhow::Result;
use consumption_ingestion::{
    config::AppConfig,
    observability,
    render::{render_latest_day, LineChartRenderer, RenderOutcome},
};
use rte_client::db::consumption_queries;
use sqlx::postgres::PgPoolOptions;

/// Renders the latest stored day without fetching, for schedules that
/// refresh the chart more often than the ingest runs.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.store.max_connections)
        .connect(&cfg.store.uri)
        .await?;
    consumption_queries::ensure_consumption_table(&pool).await?;

    let rows = consumption_queries::recent_consumption(&pool, cfg.chart.read_limit).await?;
    let renderer = LineChartRenderer::new(cfg.chart.output_dir.clone());

    match render_latest_day(&rows, &renderer)? {
        RenderOutcome::Written(path) => {
            tracing::info!(path = %path.display(), "chart refreshed");
        }
        RenderOutcome::NoData => {
            tracing::info!("no stored data to chart");
        }
    }

    Ok(())
}
