pub mod line_chart;

pub use line_chart::LineChartRenderer;

use std::{collections::HashSet, path::PathBuf};

use rte_client::domain::ConsumptionSample;
use time::{Date, OffsetDateTime};

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("chart drawing failed: {0}")]
    Draw(String),
    #[error("chart output io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The single most recent calendar day present in the data, one point per
/// interval start, sorted ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySlice {
    pub date: Date,
    pub points: Vec<(OffsetDateTime, f64)>,
}

pub trait ChartRenderer {
    fn render(&self, day: &DaySlice) -> Result<PathBuf, RenderError>;
}

/// Outcome of the chart stage. An empty latest-day slice is a reported
/// no-op, distinct from failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Written(PathBuf),
    NoData,
}

/// Restrict to the most recent calendar day by `start_time` date, in each
/// timestamp's own offset, collapsing duplicate `start_time` rows
/// keep-first and sorting ascending. `None` when nothing survives.
pub fn latest_day_slice(samples: &[ConsumptionSample]) -> Option<DaySlice> {
    let date = samples.iter().map(|s| s.start_time.date()).max()?;

    let mut seen = HashSet::new();
    let mut points: Vec<(OffsetDateTime, f64)> = samples
        .iter()
        .filter(|s| s.start_time.date() == date)
        .filter(|s| seen.insert(s.start_time))
        .map(|s| (s.start_time, s.value))
        .collect();
    points.sort_by_key(|(ts, _)| *ts);

    Some(DaySlice { date, points })
}

pub fn render_latest_day<R>(
    samples: &[ConsumptionSample],
    renderer: &R,
) -> Result<RenderOutcome, RenderError>
where
    R: ChartRenderer + ?Sized,
{
    match latest_day_slice(samples) {
        Some(day) => {
            let path = renderer.render(&day)?;
            tracing::info!(date = %day.date, path = %path.display(), "chart written");
            Ok(RenderOutcome::Written(path))
        }
        None => {
            tracing::info!("no rows in latest-day slice, skipping chart");
            Ok(RenderOutcome::NoData)
        }
    }
}
