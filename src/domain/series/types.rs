use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Render format for forecast and history timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One daily bar of the ticker history after schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDateTime,
    pub close: f64,
    pub volume: f64,
}

impl Observation {
    pub fn new(date: NaiveDateTime, close: f64, volume: f64) -> Self {
        Self {
            date,
            close,
            volume,
        }
    }
}

/// A synthetic bar produced by the forecast rollout.
///
/// `open` and `close` carry the predicted price; `high`/`low` are a fixed
/// spread around it, not a modeled range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(rename = "time", with = "timestamp_text")]
    pub date: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl ForecastPoint {
    pub fn from_price(date: NaiveDateTime, price: f64, spread_pct: f64, volume: u64) -> Self {
        Self {
            date,
            open: price,
            high: price * (1.0 + spread_pct),
            low: price * (1.0 - spread_pct),
            close: price,
            volume,
        }
    }

    pub fn time_label(&self) -> String {
        self.date.format(TIMESTAMP_FORMAT).to_string()
    }
}

mod timestamp_text {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&date.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        crate::domain::series::calendar::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// Mean of the trailing `window` volumes, truncated to whole units.
///
/// Returns 0 for an empty series.
pub fn trailing_volume(series: &[Observation], window: usize) -> u64 {
    use statrs::statistics::{Data, Distribution};

    let start = series.len().saturating_sub(window);
    let volumes: Vec<f64> = series[start..].iter().map(|o| o.volume).collect();
    if volumes.is_empty() {
        return 0;
    }
    // float-to-int `as` truncates and saturates, NaN becomes 0
    Data::new(volumes).mean().map(|mean| mean as u64).unwrap_or(0)
}
