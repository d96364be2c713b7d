use time::{Duration, OffsetDateTime};

use crate::{
    render::{render_latest_day, ChartRenderer, RenderError, RenderOutcome},
    sinks::{ConsumptionStore, StoreError},
    sources::{ConsumptionSource, SourceError},
    transform::{dedupe, normalize},
    window::FetchWindow,
};

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

/// Counters for one completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Samples surviving normalization.
    pub fetched: usize,
    /// Malformed records dropped during normalization.
    pub dropped: usize,
    /// Samples surviving in-batch deduplication.
    pub deduplicated: usize,
    /// Rows actually inserted by the merge.
    pub inserted: u64,
    pub chart: RenderOutcome,
}

/// One scheduled pass: window → fetch → normalize → dedupe → merge →
/// read-back → latest-day chart.
///
/// `run` takes `now` explicitly so a retried run over the same instant is
/// deterministic end to end; together with the insert-only-if-absent
/// merge this makes re-invocation by any scheduler safe without
/// coordination.
pub struct IngestionPipeline<S, K, R> {
    pub source: S,
    pub store: K,
    pub renderer: R,
    pub lookback: Duration,
    pub render_read_limit: i64,
}

impl<S, K, R> IngestionPipeline<S, K, R>
where
    S: ConsumptionSource,
    K: ConsumptionStore,
    R: ChartRenderer,
{
    pub async fn run(&self, now: OffsetDateTime) -> Result<RunReport, RunError> {
        let window = FetchWindow::compute(now, self.lookback);
        tracing::info!(
            start = %window.start_param(),
            end = %window.end_param(),
            "fetching consumption window"
        );

        let raw = self.source.fetch(&window).await?;

        let normalized = normalize(&raw);
        if normalized.dropped > 0 {
            tracing::warn!(dropped = normalized.dropped, "batch contained malformed records");
        }
        let fetched = normalized.samples.len();

        let batch = dedupe(normalized.samples);
        let deduplicated = batch.len();

        let inserted = self.store.merge(&batch).await?;

        let rows = self.store.recent(self.render_read_limit).await?;
        let chart = render_latest_day(&rows, &self.renderer)?;

        Ok(RunReport {
            fetched,
            dropped: normalized.dropped,
            deduplicated,
            inserted,
            chart,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::BTreeMap, path::PathBuf, sync::Mutex};

    use rte_client::domain::ConsumptionSample;
    use serde_json::{json, Value};
    use time::macros::datetime;

    use crate::render::DaySlice;

    struct FixedSource {
        body: Value,
    }

    #[async_trait::async_trait]
    impl ConsumptionSource for FixedSource {
        async fn fetch(&self, _window: &FetchWindow) -> Result<Value, SourceError> {
            Ok(self.body.clone())
        }
    }

    /// Insert-only-if-absent store keyed by the natural key, the same
    /// contract the SQL merge enforces through its unique constraint.
    struct InMemoryStore {
        rows: Mutex<BTreeMap<(OffsetDateTime, OffsetDateTime), ConsumptionSample>>,
    }

    impl InMemoryStore {
        fn new() -> Self {
            Self {
                rows: Mutex::new(BTreeMap::new()),
            }
        }

        fn seed(&self, sample: ConsumptionSample) {
            self.rows
                .lock()
                .unwrap()
                .insert(sample.natural_key(), sample);
        }
    }

    #[async_trait::async_trait]
    impl ConsumptionStore for InMemoryStore {
        async fn merge(&self, batch: &[ConsumptionSample]) -> Result<u64, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            let mut inserted = 0u64;
            for sample in batch {
                if !rows.contains_key(&sample.natural_key()) {
                    rows.insert(sample.natural_key(), sample.clone());
                    inserted += 1;
                }
            }
            Ok(inserted)
        }

        async fn recent(&self, limit: i64) -> Result<Vec<ConsumptionSample>, StoreError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.values().rev().take(limit as usize).cloned().collect())
        }
    }

    struct NullRenderer;

    impl ChartRenderer for NullRenderer {
        fn render(&self, day: &DaySlice) -> Result<PathBuf, RenderError> {
            Ok(PathBuf::from(format!("chart_{}.png", day.date)))
        }
    }

    fn entry(hour: u8, value: f64) -> Value {
        json!({
            "start_date": format!("2024-01-03T{hour:02}:00:00+00:00"),
            "end_date": format!("2024-01-03T{hour:02}:15:00+00:00"),
            "updated_date": format!("2024-01-03T{hour:02}:20:00+00:00"),
            "value": value,
        })
    }

    fn pipeline(
        body: Value,
    ) -> IngestionPipeline<FixedSource, InMemoryStore, NullRenderer> {
        IngestionPipeline {
            source: FixedSource { body },
            store: InMemoryStore::new(),
            renderer: NullRenderer,
            lookback: Duration::hours(48),
            render_read_limit: 100,
        }
    }

    #[tokio::test]
    async fn rerunning_the_same_window_inserts_nothing_new() {
        let body = json!({ "short_term": [ { "values": [entry(8, 50_000.0), entry(9, 51_000.0)] } ] });
        let pipeline = pipeline(body);
        let now = datetime!(2024-01-03 12:00:00 UTC);

        let first = pipeline.run(now).await.unwrap();
        assert_eq!(first.inserted, 2);

        let second = pipeline.run(now).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(pipeline.store.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn existing_intervals_are_skipped_untouched() {
        let body = json!({ "short_term": [ { "values": [entry(8, 99_999.0), entry(9, 51_000.0)] } ] });
        let pipeline = pipeline(body);
        pipeline.store.seed(ConsumptionSample {
            start_time: datetime!(2024-01-03 08:00:00 UTC),
            end_time: datetime!(2024-01-03 08:15:00 UTC),
            updated_time: Some(datetime!(2024-01-03 08:20:00 UTC)),
            value: 50_000.0,
        });

        let report = pipeline.run(datetime!(2024-01-03 12:00:00 UTC)).await.unwrap();

        assert_eq!(report.inserted, 1);
        let rows = pipeline.store.rows.lock().unwrap();
        let kept = &rows[&(
            datetime!(2024-01-03 08:00:00 UTC),
            datetime!(2024-01-03 08:15:00 UTC),
        )];
        // The fetched revision for the stored interval was not applied.
        assert_eq!(kept.value, 50_000.0);
    }

    #[tokio::test]
    async fn duplicate_keys_within_a_batch_merge_once() {
        let mut revised = entry(8, 52_000.0);
        revised["updated_date"] = json!("2024-01-03T10:00:00+00:00");
        let body = json!({ "short_term": [
            { "values": [entry(8, 50_000.0)] },
            { "values": [revised] },
        ] });
        let pipeline = pipeline(body);

        let report = pipeline.run(datetime!(2024-01-03 12:00:00 UTC)).await.unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.deduplicated, 1);
        assert_eq!(report.inserted, 1);
        let rows = pipeline.store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        // The later revision won within the batch.
        assert_eq!(rows.values().next().unwrap().value, 52_000.0);
    }

    #[tokio::test]
    async fn malformed_records_do_not_abort_the_run() {
        let mut bad = entry(9, 0.0);
        bad["value"] = json!("not-a-number");
        let body = json!({ "short_term": [ { "values": [entry(8, 50_000.0), bad, entry(10, 49_000.0)] } ] });
        let pipeline = pipeline(body);

        let report = pipeline.run(datetime!(2024-01-03 12:00:00 UTC)).await.unwrap();

        assert_eq!(report.fetched, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.inserted, 2);
    }

    #[tokio::test]
    async fn empty_provider_response_completes_with_no_data_chart() {
        let pipeline = pipeline(Value::Null);

        let report = pipeline.run(datetime!(2024-01-03 12:00:00 UTC)).await.unwrap();

        assert_eq!(report.fetched, 0);
        assert_eq!(report.inserted, 0);
        assert_eq!(report.chart, RenderOutcome::NoData);
    }

    #[tokio::test]
    async fn chart_covers_the_latest_stored_day() {
        let body = json!({ "short_term": [ { "values": [entry(8, 50_000.0)] } ] });
        let pipeline = pipeline(body);
        pipeline.store.seed(ConsumptionSample {
            start_time: datetime!(2024-01-02 08:00:00 UTC),
            end_time: datetime!(2024-01-02 08:15:00 UTC),
            updated_time: None,
            value: 48_000.0,
        });

        let report = pipeline.run(datetime!(2024-01-03 12:00:00 UTC)).await.unwrap();

        assert_eq!(
            report.chart,
            RenderOutcome::Written(PathBuf::from("chart_2024-01-03.png"))
        );
    }
}
