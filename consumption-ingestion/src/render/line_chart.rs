use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use plotters::prelude::*;
use time::{macros::format_description, OffsetDateTime};

use crate::render::{ChartRenderer, DaySlice, RenderError};

/// Line-with-markers chart of one day's consumption, written as a PNG
/// named after the day.
pub struct LineChartRenderer {
    output_dir: PathBuf,
}

impl LineChartRenderer {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_path(&self, day: &DaySlice) -> PathBuf {
        self.output_dir
            .join(format!("electricity_consumption_{}.png", day.date))
    }
}

fn draw_err<E: Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

fn hour_label(secs: i64) -> String {
    match OffsetDateTime::from_unix_timestamp(secs) {
        Ok(ts) => ts
            .format(format_description!("[hour]:[minute]"))
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

impl ChartRenderer for LineChartRenderer {
    fn render(&self, day: &DaySlice) -> Result<PathBuf, RenderError> {
        let Some(((first_ts, _), (last_ts, _))) = day.points.first().zip(day.points.last()) else {
            return Err(RenderError::Draw("day slice has no points".to_string()));
        };

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_path(day);

        let x_start = first_ts.unix_timestamp();
        let mut x_end = last_ts.unix_timestamp();
        if x_end == x_start {
            // Degenerate single-point day; keep the axis range non-empty.
            x_end += 60;
        }
        let y_max = day.points.iter().map(|(_, v)| *v).fold(0.0f64, f64::max);
        let y_end = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };

        let root = BitMapBackend::new(Path::new(&path), (1200, 800)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("Energy consumption on {}", day.date),
                ("sans-serif", 28),
            )
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(64)
            .build_cartesian_2d(x_start..x_end, 0f64..y_end)
            .map_err(draw_err)?;

        chart
            .configure_mesh()
            .x_labels(12)
            .x_label_formatter(&|secs| hour_label(*secs))
            .x_desc("Time (UTC)")
            .y_desc("Total consumption (MWh)")
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(LineSeries::new(
                day.points.iter().map(|(ts, v)| (ts.unix_timestamp(), *v)),
                &BLUE,
            ))
            .map_err(draw_err)?;
        chart
            .draw_series(
                day.points
                    .iter()
                    .map(|(ts, v)| Circle::new((ts.unix_timestamp(), *v), 3, BLUE.filled())),
            )
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
        drop(chart);
        drop(root);

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn output_path_is_named_after_the_day() {
        let renderer = LineChartRenderer::new("charts");
        let day = DaySlice {
            date: datetime!(2024-01-03 00:00:00 UTC).date(),
            points: vec![(datetime!(2024-01-03 00:00:00 UTC), 1.0)],
        };

        assert_eq!(
            renderer.output_path(&day),
            PathBuf::from("charts/electricity_consumption_2024-01-03.png")
        );
    }

    #[test]
    fn hour_labels_render_as_hh_mm() {
        let secs = datetime!(2024-01-03 08:15:00 UTC).unix_timestamp();
        assert_eq!(hour_label(secs), "08:15");
    }
}
