use time::OffsetDateTime;

/// One consumption observation for a half-open measurement interval
/// `[start_time, end_time)`, in MWh.
///
/// The provider may republish a revised value for an interval it has
/// already reported; `updated_time` marks the revision. The stored table
/// holds at most one row per `(start_time, end_time)`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsumptionSample {
    #[sqlx(rename = "start_date")]
    pub start_time: OffsetDateTime,
    #[sqlx(rename = "end_date")]
    pub end_time: OffsetDateTime,
    #[sqlx(rename = "updated_date")]
    pub updated_time: Option<OffsetDateTime>,
    pub value: f64,
}

impl ConsumptionSample {
    /// Identity of the measurement interval, the uniqueness boundary for
    /// the merge.
    pub fn natural_key(&self) -> (OffsetDateTime, OffsetDateTime) {
        (self.start_time, self.end_time)
    }
}
