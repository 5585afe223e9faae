//! Chooses where inference data comes from: the frozen training snapshot or
//! the live CSV.

use crate::application::window_preparer::WindowPreparer;
use crate::domain::errors::ForecastError;
use crate::domain::ports::SeriesLoader;
use crate::domain::series::calendar::RawTimestamp;
use crate::domain::series::scaling::MinMaxTransform;
use crate::domain::series::types::Observation;
use crate::domain::snapshot::Snapshot;
use crate::infrastructure::snapshot_store::SnapshotStore;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    Snapshot,
    Csv,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Snapshot => write!(f, "snapshot"),
            DataOrigin::Csv => write!(f, "csv"),
        }
    }
}

/// Everything the rollout needs, wherever it came from.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub origin: DataOrigin,
    pub series: Vec<Observation>,
    pub seed_window: Vec<f64>,
    pub last_date: RawTimestamp,
    pub last_price: f64,
    pub lookback: usize,
    pub forecast_days: usize,
    /// Fit time of the snapshot that was used.
    pub snapshot_timestamp: Option<NaiveDateTime>,
    pub snapshot_accuracy: Option<f64>,
    pub snapshot_exists: bool,
    pub snapshot_requested: bool,
    pub warnings: Vec<String>,
}

impl SourceData {
    pub fn used_snapshot(&self) -> bool {
        self.origin == DataOrigin::Snapshot
    }
}

pub struct SourceSelector<'a> {
    snapshots: &'a SnapshotStore,
    loader: &'a dyn SeriesLoader,
    preparer: WindowPreparer,
    trained_at: Option<NaiveDateTime>,
}

impl<'a> SourceSelector<'a> {
    pub fn new(
        snapshots: &'a SnapshotStore,
        loader: &'a dyn SeriesLoader,
        preparer: WindowPreparer,
    ) -> Self {
        Self {
            snapshots,
            loader,
            preparer,
            trained_at: None,
        }
    }

    /// Training time recorded with the model; a snapshot from any other run
    /// is rejected.
    pub fn with_trained_at(mut self, trained_at: Option<NaiveDateTime>) -> Self {
        self.trained_at = trained_at;
        self
    }

    /// Picks the data source for `ticker`.
    ///
    /// A usable snapshot is the sole source when requested; the CSV is not
    /// opened at all. Otherwise windows are rebuilt from the CSV, cut off at
    /// `now`, with `transform` reused as-is.
    ///
    /// A snapshot is only usable when it belongs to the loaded model: same
    /// lookback, a transform bit-identical to `transform`, and the model's
    /// training time when that is known.
    pub fn select_source(
        &self,
        ticker: &str,
        use_snapshot: bool,
        transform: &MinMaxTransform,
        now: NaiveDateTime,
    ) -> Result<SourceData, ForecastError> {
        let snapshot_exists = self.snapshots.exists(ticker);
        let mut warnings = Vec::new();

        if use_snapshot {
            match self.snapshots.load(ticker) {
                Ok(Some(snapshot)) => match self.rejection(&snapshot, transform) {
                    None => return Ok(Self::from_snapshot(snapshot, warnings)),
                    Some(reason) => {
                        let message = format!("Snapshot rejected ({}); falling back to CSV", reason);
                        warn!("{}", message);
                        warnings.push(message);
                    }
                },
                Ok(None) => {
                    let message = format!("No snapshot found for {}; using CSV data", ticker);
                    warn!("{}", message);
                    warnings.push(message);
                }
                Err(e) => {
                    let message = format!("Snapshot unusable ({}); falling back to CSV", e);
                    warn!("{}", message);
                    warnings.push(message);
                }
            }
        } else {
            info!("Snapshot disabled for this run; using CSV data");
        }

        let mut source = self.from_csv(ticker, transform, now)?;
        source.snapshot_exists = snapshot_exists;
        source.snapshot_requested = use_snapshot;
        source.warnings = warnings;
        Ok(source)
    }

    /// Why `snapshot` cannot seed a forecast for the loaded model, if it cannot.
    fn rejection(&self, snapshot: &Snapshot, transform: &MinMaxTransform) -> Option<String> {
        let lookback = self.preparer.lookback();
        if snapshot.last_window.is_empty() {
            return Some("empty seed window".to_string());
        }
        if snapshot.lookback != lookback || snapshot.last_window.len() != lookback {
            return Some(format!(
                "lookback {} with a {}-value seed, model expects {}",
                snapshot.lookback,
                snapshot.last_window.len(),
                lookback
            ));
        }
        if !snapshot.transform.is_identical(transform) {
            return Some("transform differs from the persisted transform".to_string());
        }
        match self.trained_at {
            Some(trained_at) if snapshot.created_at != trained_at => Some(format!(
                "captured at {} but the model was trained at {}",
                snapshot.created_at, trained_at
            )),
            _ => None,
        }
    }

    fn from_snapshot(snapshot: Snapshot, mut warnings: Vec<String>) -> SourceData {
        for issue in snapshot.consistency_issues() {
            warn!("{}", issue);
            warnings.push(issue);
        }

        info!(
            "Using snapshot for {}: {} records, last date {}, last price {:.2}, seed window {}",
            snapshot.ticker,
            snapshot.series.len(),
            snapshot.last_date.label(),
            snapshot.last_price,
            snapshot.last_window.len()
        );

        SourceData {
            origin: DataOrigin::Snapshot,
            series: snapshot.series,
            seed_window: snapshot.last_window,
            last_date: snapshot.last_date,
            last_price: snapshot.last_price,
            lookback: snapshot.lookback,
            forecast_days: snapshot.forecast_days,
            snapshot_timestamp: Some(snapshot.created_at),
            snapshot_accuracy: Some(snapshot.accuracy),
            snapshot_exists: true,
            snapshot_requested: true,
            warnings,
        }
    }

    fn from_csv(
        &self,
        ticker: &str,
        transform: &MinMaxTransform,
        now: NaiveDateTime,
    ) -> Result<SourceData, ForecastError> {
        let series = self.loader.load(ticker, Some(now))?;
        let prepared = self.preparer.prepare(&series, Some(transform))?;
        let seed_window = prepared
            .set
            .last_window()
            .map(<[f64]>::to_vec)
            .ok_or(ForecastError::InsufficientData {
                required: self.preparer.min_records(),
                available: series.len(),
            })?;
        let last = series.last().ok_or(ForecastError::InsufficientData {
            required: self.preparer.min_records(),
            available: 0,
        })?;

        info!(
            "Using CSV for {}: {} records, last date {}, last price {:.2}",
            ticker,
            series.len(),
            last.date,
            last.close
        );

        Ok(SourceData {
            origin: DataOrigin::Csv,
            last_date: RawTimestamp::Native(last.date),
            last_price: last.close,
            seed_window,
            lookback: self.preparer.lookback(),
            forecast_days: self.preparer.forecast_days(),
            series,
            snapshot_timestamp: None,
            snapshot_accuracy: None,
            snapshot_exists: false,
            snapshot_requested: false,
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::EvaluationReport;
    use chrono::{Duration, NaiveDate};
    use std::cell::Cell;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_models_dir() -> PathBuf {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "trendcast_selector_{}_{}",
            std::process::id(),
            unique_id
        ))
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn series(n: usize, offset: f64) -> Vec<Observation> {
        (0..n)
            .map(|i| {
                Observation::new(
                    start() + Duration::days(i as i64),
                    offset + i as f64,
                    100.0,
                )
            })
            .collect()
    }

    /// In-memory loader that honors the cutoff and counts calls.
    struct MemoryLoader {
        rows: Vec<Observation>,
        calls: Cell<usize>,
    }

    impl SeriesLoader for MemoryLoader {
        fn load(
            &self,
            _ticker: &str,
            cutoff: Option<NaiveDateTime>,
        ) -> Result<Vec<Observation>, ForecastError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self
                .rows
                .iter()
                .filter(|o| cutoff.is_none_or(|c| o.date <= c))
                .cloned()
                .collect())
        }
    }

    fn report() -> EvaluationReport {
        EvaluationReport {
            train_mse: 0.0,
            test_mse: 0.0,
            train_mae: 0.0,
            test_mae: 0.0,
            mape: Some(2.0),
            accuracy: 98.0,
        }
    }

    fn write_snapshot(store: &SnapshotStore, rows: &[Observation], transform: MinMaxTransform) {
        let preparer = WindowPreparer::new(3, 1);
        let prepared = preparer.prepare(rows, Some(&transform)).unwrap();
        let snapshot = Snapshot::capture(
            "SBER",
            rows,
            &prepared.set.windows,
            transform,
            3,
            1,
            &report(),
            start(),
        )
        .unwrap();
        store.save(&snapshot).unwrap();
    }

    #[test]
    fn test_snapshot_is_sole_source_when_present() {
        let dir = temp_models_dir();
        let store = SnapshotStore::new(&dir);
        let trained = series(10, 100.0);
        let transform = MinMaxTransform::fit(&[100.0, 109.0]).unwrap();
        write_snapshot(&store, &trained, transform);

        // the live CSV has moved on since training
        let loader = MemoryLoader {
            rows: series(30, 500.0),
            calls: Cell::new(0),
        };
        let selector = SourceSelector::new(&store, &loader, WindowPreparer::new(3, 1));
        let source = selector
            .select_source("SBER", true, &transform, start() + Duration::days(100))
            .unwrap();

        assert!(source.used_snapshot());
        assert_eq!(source.origin.to_string(), "snapshot");
        assert_eq!(loader.calls.get(), 0);
        assert_eq!(source.series, trained);
        assert_eq!(source.last_price, 109.0);
        assert_eq!(source.snapshot_accuracy, Some(98.0));
        assert!(source.warnings.is_empty());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_snapshot_falls_back_with_warning() {
        let dir = temp_models_dir();
        let store = SnapshotStore::new(&dir);
        let loader = MemoryLoader {
            rows: series(10, 100.0),
            calls: Cell::new(0),
        };
        let transform = MinMaxTransform::fit(&[100.0, 109.0]).unwrap();
        let selector = SourceSelector::new(&store, &loader, WindowPreparer::new(3, 1));

        let source = selector
            .select_source("SBER", true, &transform, start() + Duration::days(100))
            .unwrap();

        assert_eq!(source.origin, DataOrigin::Csv);
        assert_eq!(loader.calls.get(), 1);
        assert!(!source.snapshot_exists);
        assert!(source.snapshot_requested);
        assert_eq!(source.warnings.len(), 1);
        assert!(source.snapshot_accuracy.is_none());
    }

    #[test]
    fn test_corrupt_snapshot_falls_back_to_csv() {
        let dir = temp_models_dir();
        fs::create_dir_all(&dir).unwrap();
        let store = SnapshotStore::new(&dir);
        fs::write(store.path_for("SBER"), "not json").unwrap();

        let loader = MemoryLoader {
            rows: series(10, 100.0),
            calls: Cell::new(0),
        };
        let transform = MinMaxTransform::fit(&[100.0, 109.0]).unwrap();
        let selector = SourceSelector::new(&store, &loader, WindowPreparer::new(3, 1));
        let source = selector
            .select_source("SBER", true, &transform, start() + Duration::days(100))
            .unwrap();

        assert_eq!(source.origin, DataOrigin::Csv);
        assert!(source.snapshot_exists);
        assert!(source.warnings[0].contains("falling back"));
        fs::remove_dir_all(dir).ok();
    }

    fn csv_fallback(
        store: &SnapshotStore,
        preparer: WindowPreparer,
        transform: &MinMaxTransform,
        trained_at: Option<NaiveDateTime>,
    ) -> SourceData {
        let loader = MemoryLoader {
            rows: series(10, 100.0),
            calls: Cell::new(0),
        };
        let source = SourceSelector::new(store, &loader, preparer)
            .with_trained_at(trained_at)
            .select_source("SBER", true, transform, start() + Duration::days(100))
            .unwrap();
        assert_eq!(loader.calls.get(), 1);
        source
    }

    #[test]
    fn test_snapshot_from_another_lookback_is_rejected() {
        let dir = temp_models_dir();
        let store = SnapshotStore::new(&dir);
        let transform = MinMaxTransform::fit(&[100.0, 109.0]).unwrap();
        write_snapshot(&store, &series(10, 100.0), transform);

        // model retrained with lookback 5 while the snapshot holds 3-value seeds
        let source = csv_fallback(&store, WindowPreparer::new(5, 1), &transform, None);

        assert_eq!(source.origin, DataOrigin::Csv);
        assert!(source.snapshot_exists);
        assert_eq!(source.seed_window.len(), 5);
        assert!(source.warnings[0].contains("lookback 3"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_snapshot_with_foreign_transform_is_rejected() {
        let dir = temp_models_dir();
        let store = SnapshotStore::new(&dir);
        write_snapshot(&store, &series(10, 100.0), MinMaxTransform::fit(&[100.0, 109.0]).unwrap());

        let retrained = MinMaxTransform::fit(&[140.0, 149.0]).unwrap();
        let source = csv_fallback(&store, WindowPreparer::new(3, 1), &retrained, None);

        assert_eq!(source.origin, DataOrigin::Csv);
        assert!(source.snapshot_accuracy.is_none());
        assert!(source.warnings[0].contains("transform differs"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_snapshot_from_another_training_run_is_rejected() {
        let dir = temp_models_dir();
        let store = SnapshotStore::new(&dir);
        let transform = MinMaxTransform::fit(&[100.0, 109.0]).unwrap();
        write_snapshot(&store, &series(10, 100.0), transform);

        let later = Some(start() + Duration::days(1));
        let source = csv_fallback(&store, WindowPreparer::new(3, 1), &transform, later);
        assert_eq!(source.origin, DataOrigin::Csv);
        assert!(source.warnings[0].contains("trained at"));

        // the matching run is accepted
        let loader = MemoryLoader {
            rows: Vec::new(),
            calls: Cell::new(0),
        };
        let source = SourceSelector::new(&store, &loader, WindowPreparer::new(3, 1))
            .with_trained_at(Some(start()))
            .select_source("SBER", true, &transform, start() + Duration::days(100))
            .unwrap();
        assert!(source.used_snapshot());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_csv_path_excludes_future_rows_and_reuses_transform() {
        let dir = temp_models_dir();
        let store = SnapshotStore::new(&dir);
        let loader = MemoryLoader {
            rows: series(20, 100.0),
            calls: Cell::new(0),
        };
        let transform = MinMaxTransform::fit(&[100.0, 200.0]).unwrap();
        let selector = SourceSelector::new(&store, &loader, WindowPreparer::new(3, 1));

        // only days 0..=9 are history at this moment
        let now = start() + Duration::days(9);
        let source = selector.select_source("SBER", false, &transform, now).unwrap();

        assert_eq!(source.series.len(), 10);
        assert_eq!(source.last_price, 109.0);
        assert!(!source.snapshot_requested);
        assert!(source.warnings.is_empty());
        // seed is the last prepared window: closes 106, 107, 108 on the 100..200 scale
        let expected = transform.encode_all(&[106.0, 107.0, 108.0]);
        assert_eq!(source.seed_window, expected);
    }

    #[test]
    fn test_short_csv_is_insufficient() {
        let dir = temp_models_dir();
        let store = SnapshotStore::new(&dir);
        let loader = MemoryLoader {
            rows: series(3, 100.0),
            calls: Cell::new(0),
        };
        let transform = MinMaxTransform::fit(&[100.0, 102.0]).unwrap();
        let selector = SourceSelector::new(&store, &loader, WindowPreparer::new(3, 1));
        let err = selector
            .select_source("SBER", false, &transform, start() + Duration::days(10))
            .unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }
}
