use crate::domain::errors::ForecastError;
use crate::domain::series::types::{ForecastPoint, Observation};
use chrono::NaiveDateTime;

/// Source of a ticker's daily history.
///
/// Implementations return observations sorted by date, unique per date, with
/// invalid rows already dropped. With a `cutoff`, rows dated after it are
/// excluded.
pub trait SeriesLoader {
    fn load(
        &self,
        ticker: &str,
        cutoff: Option<NaiveDateTime>,
    ) -> Result<Vec<Observation>, ForecastError>;
}

/// Sink for forecast rows written back next to the history.
pub trait ForecastSink {
    /// Appends the points whose timestamps are not present yet; returns how many were written.
    fn append(&self, ticker: &str, points: &[ForecastPoint]) -> Result<usize, ForecastError>;
}
