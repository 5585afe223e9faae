//! CSV-backed ticker history.
//!
//! Files are named `<TICKER>.csv` and carry the columns
//! `ticker,time,open,high,low,close,volume`. The same files receive forecast
//! rows through [`CsvSeriesStore::append`], which is why reads can be cut off
//! at the current time.

use crate::domain::errors::ForecastError;
use crate::domain::ports::{ForecastSink, SeriesLoader};
use crate::domain::series::calendar::parse_timestamp;
use crate::domain::series::types::{ForecastPoint, Observation};
use chrono::NaiveDateTime;
use csv::StringRecord;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CSV_HEADERS: [&str; 7] = ["ticker", "time", "open", "high", "low", "close", "volume"];

/// Column positions resolved from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

impl ColumnMap {
    const POSITIONAL: ColumnMap = ColumnMap {
        time: 1,
        open: 2,
        high: 3,
        low: 4,
        close: 5,
        volume: 6,
    };

    fn from_header(header: &[String]) -> Option<Self> {
        let expected: HashSet<&str> = CSV_HEADERS.iter().copied().collect();
        let found: HashSet<&str> = header.iter().map(|h| h.as_str()).collect();
        if header.len() != CSV_HEADERS.len() || found != expected {
            return None;
        }
        let position = |name: &str| header.iter().position(|h| h == name);
        Some(Self {
            time: position("time")?,
            open: position("open")?,
            high: position("high")?,
            low: position("low")?,
            close: position("close")?,
            volume: position("volume")?,
        })
    }

    fn width(&self) -> usize {
        [self.time, self.open, self.high, self.low, self.close, self.volume]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

fn normalized(record: &StringRecord) -> Vec<String> {
    record.iter().map(|f| f.trim().to_lowercase()).collect()
}

fn is_header_row(record: &StringRecord) -> bool {
    normalized(record) == CSV_HEADERS
}

fn parse_row(record: &StringRecord, columns: &ColumnMap) -> Option<Observation> {
    if record.len() < columns.width() {
        return None;
    }
    let number = |idx: usize| -> Option<f64> {
        record
            .get(idx)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    };

    let date = parse_timestamp(record.get(columns.time)?).ok()?;
    // every numeric column must be present even though only close/volume are kept
    number(columns.open)?;
    number(columns.high)?;
    number(columns.low)?;
    let close = number(columns.close)?;
    let volume = number(columns.volume)?;
    Some(Observation::new(date, close, volume))
}

/// Validates the schema and converts raw CSV content into a clean series.
pub fn read_series<R: Read>(
    reader: R,
    cutoff: Option<NaiveDateTime>,
) -> Result<Vec<Observation>, ForecastError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = rdr.records();
    let header = match records.next() {
        Some(Ok(record)) => record,
        Some(Err(e)) => return Err(ForecastError::data_source(format!("unreadable CSV: {}", e))),
        None => return Ok(Vec::new()),
    };

    let mut rows: Vec<StringRecord> = Vec::new();
    let columns = match ColumnMap::from_header(&normalized(&header)) {
        Some(columns) => columns,
        None if header.len() == CSV_HEADERS.len() => {
            // no recognizable header: positional layout, first line may be data
            warn!(
                "CSV header {:?} does not match {:?}; assuming positional columns",
                normalized(&header),
                CSV_HEADERS
            );
            rows.push(header);
            ColumnMap::POSITIONAL
        }
        None => {
            return Err(ForecastError::Schema {
                reason: format!(
                    "expected columns {:?}, found {:?}",
                    CSV_HEADERS,
                    normalized(&header)
                ),
            });
        }
    };

    for record in records {
        match record {
            Ok(r) => rows.push(r),
            Err(e) => debug!("Skipping unreadable CSV line: {}", e),
        }
    }

    let total = rows.len();
    let mut embedded_headers = 0usize;
    let mut parsed: Vec<Observation> = Vec::with_capacity(total);
    for row in &rows {
        if is_header_row(row) {
            embedded_headers += 1;
            continue;
        }
        if let Some(obs) = parse_row(row, &columns) {
            parsed.push(obs);
        }
    }
    let invalid = total - embedded_headers - parsed.len();

    let before_cutoff = parsed.len();
    if let Some(cutoff) = cutoff {
        parsed.retain(|o| o.date <= cutoff);
    }
    let future = before_cutoff - parsed.len();

    // stable sort keeps file order among equal dates, so the later row wins
    parsed.sort_by_key(|o| o.date);
    let mut series: Vec<Observation> = Vec::with_capacity(parsed.len());
    for obs in parsed {
        match series.last_mut() {
            Some(last) if last.date == obs.date => *last = obs,
            _ => series.push(obs),
        }
    }

    debug!(
        "CSV rows: {} total, {} embedded headers, {} invalid, {} after cutoff, {} duplicates, {} kept",
        total,
        embedded_headers,
        invalid,
        future,
        before_cutoff - future - series.len(),
        series.len()
    );
    Ok(series)
}

/// Reads and appends `<TICKER>.csv` files in one directory.
#[derive(Debug, Clone)]
pub struct CsvSeriesStore {
    data_dir: PathBuf,
}

impl CsvSeriesStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", ticker.to_uppercase()))
    }

    pub fn load_path(
        path: &Path,
        cutoff: Option<NaiveDateTime>,
    ) -> Result<Vec<Observation>, ForecastError> {
        if !path.exists() {
            return Err(ForecastError::data_source(format!(
                "CSV file not found: {}",
                path.display()
            )));
        }
        let file = fs::File::open(path).map_err(|e| {
            ForecastError::data_source(format!("cannot open {}: {}", path.display(), e))
        })?;
        read_series(file, cutoff)
    }

    fn existing_times(&self, path: &Path) -> Result<HashSet<NaiveDateTime>, ForecastError> {
        if !path.exists() {
            return Ok(HashSet::new());
        }
        Ok(Self::load_path(path, None)?
            .into_iter()
            .map(|o| o.date)
            .collect())
    }
}

impl SeriesLoader for CsvSeriesStore {
    fn load(
        &self,
        ticker: &str,
        cutoff: Option<NaiveDateTime>,
    ) -> Result<Vec<Observation>, ForecastError> {
        let path = self.path_for(ticker);
        let series = Self::load_path(&path, cutoff)?;
        info!("Loaded {} records for ticker {}", series.len(), ticker);
        Ok(series)
    }
}

impl ForecastSink for CsvSeriesStore {
    fn append(&self, ticker: &str, points: &[ForecastPoint]) -> Result<usize, ForecastError> {
        let path = self.path_for(ticker);
        let existing = self.existing_times(&path)?;
        let fresh: Vec<&ForecastPoint> = points
            .iter()
            .filter(|p| !existing.contains(&p.date))
            .collect();
        if fresh.is_empty() {
            info!("No new forecast rows to append for {}", ticker);
            return Ok(0);
        }

        let is_new_file = !path.exists();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ForecastError::persistence(path.display().to_string(), e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ForecastError::persistence(path.display().to_string(), e))?;

        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        let write_err = |e: csv::Error| ForecastError::persistence(path.display().to_string(), e);
        if is_new_file {
            wtr.write_record(CSV_HEADERS).map_err(write_err)?;
        }
        let symbol = ticker.to_uppercase();
        for point in &fresh {
            wtr.write_record([
                symbol.clone(),
                point.time_label(),
                point.open.to_string(),
                point.high.to_string(),
                point.low.to_string(),
                point.close.to_string(),
                point.volume.to_string(),
            ])
            .map_err(write_err)?;
        }
        wtr.flush()
            .map_err(|e| ForecastError::persistence(path.display().to_string(), e))?;

        info!("Appended {} forecast rows for ticker {}", fresh.len(), ticker);
        Ok(fresh.len())
    }
}
