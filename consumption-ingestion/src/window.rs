use time::{format_description::BorrowedFormatItem, macros::format_description, Duration, OffsetDateTime};

/// ISO-8601 with a mandatory-sign, colon-separated numeric offset
/// (`2024-01-03T12:00:00+00:00`). The provider rejects the bare `+0000`
/// form and the `Z` shorthand.
const PROVIDER_TS_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
);

/// The half-open `[start, end)` interval requested from the provider on
/// one run. Each run re-requests a trailing lookback period on purpose:
/// overlapping windows are the only mechanism for catching late-arriving
/// revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl FetchWindow {
    pub fn compute(now: OffsetDateTime, lookback: Duration) -> Self {
        Self {
            start: now - lookback,
            end: now,
        }
    }

    pub fn start_param(&self) -> String {
        format_bound(self.start)
    }

    pub fn end_param(&self) -> String {
        format_bound(self.end)
    }
}

fn format_bound(ts: OffsetDateTime) -> String {
    ts.format(PROVIDER_TS_FORMAT)
        .expect("window bound formats with a compile-time-checked description")
}
