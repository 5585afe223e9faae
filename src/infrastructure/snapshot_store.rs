//! Persistence for training-time data snapshots.
//!
//! One snapshot per ticker, stored next to its model. Writes go through a temp
//! file and a rename so readers never see a half-written bundle.

use crate::domain::errors::ForecastError;
use crate::domain::snapshot::Snapshot;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use super::artifact_store::ArtifactPaths;

/// Handles persistence of snapshots to the models directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    models_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        ArtifactPaths::for_ticker(&self.models_dir, ticker).snapshot
    }

    pub fn exists(&self, ticker: &str) -> bool {
        self.path_for(ticker).exists()
    }

    /// Loads the snapshot for `ticker`; `Ok(None)` when no file exists.
    ///
    /// A file that exists but cannot be read or parsed is an error so callers
    /// can tell "absent" from "unusable".
    pub fn load(&self, ticker: &str) -> Result<Option<Snapshot>, ForecastError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| ForecastError::ArtifactLoad {
            artifact: "snapshot".to_string(),
            reason: e.to_string(),
            hint: "Retrain the model to rebuild the snapshot.".to_string(),
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|e| ForecastError::ArtifactLoad {
                artifact: "snapshot".to_string(),
                reason: e.to_string(),
                hint: "Retrain the model to rebuild the snapshot.".to_string(),
            })?;

        info!("Loaded snapshot from {:?}", path);
        Ok(Some(snapshot))
    }

    /// Deletes the snapshot for `ticker`; returns whether one existed.
    pub fn remove(&self, ticker: &str) -> Result<bool, ForecastError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| ForecastError::persistence("snapshot", e))?;
        info!("Removed snapshot {:?}", path);
        Ok(true)
    }

    /// Saves the snapshot, replacing any previous one.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf, ForecastError> {
        let path = self.path_for(&snapshot.ticker);
        fs::create_dir_all(&self.models_dir)
            .map_err(|e| ForecastError::persistence("snapshot", e))?;

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| ForecastError::persistence("snapshot", e))?;

        // Atomic write: write to temp file then rename
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content).map_err(|e| ForecastError::persistence("snapshot", e))?;
        fs::rename(&temp_path, &path).map_err(|e| ForecastError::persistence("snapshot", e))?;

        info!("Saved snapshot to {:?}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::EvaluationReport;
    use crate::domain::series::scaling::MinMaxTransform;
    use crate::domain::series::types::Observation;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_test_store() -> (SnapshotStore, PathBuf) {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir().join(format!(
            "trendcast_snapshot_{}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0),
            unique_id
        ));
        (SnapshotStore::new(&temp_dir), temp_dir)
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_snapshot() -> Snapshot {
        // irrational-looking prices exercise exact float round-tripping
        let series: Vec<Observation> = (1..=6)
            .map(|d| Observation::new(day(d), 100.0 + d as f64 / 3.0, 1000.0 * d as f64))
            .collect();
        let closes: Vec<f64> = series.iter().map(|o| o.close).collect();
        let transform = MinMaxTransform::fit(&closes).unwrap();
        let scaled = transform.encode_all(&closes);
        let windows = vec![scaled[0..3].to_vec(), scaled[1..4].to_vec(), scaled[2..5].to_vec()];
        let report = EvaluationReport {
            train_mse: 0.1,
            test_mse: 0.2,
            train_mae: 0.3,
            test_mae: 0.4,
            mape: None,
            accuracy: 0.0,
        };
        Snapshot::capture("sber", &series, &windows, transform, 3, 1, &report, day(7)).unwrap()
    }

    #[test]
    fn test_load_missing_returns_none() {
        let (store, dir) = create_test_store();
        assert!(store.load("SBER").unwrap().is_none());
        assert!(!store.exists("SBER"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_save_and_load_is_bit_exact() {
        let (store, dir) = create_test_store();
        let snapshot = sample_snapshot();

        let path = store.save(&snapshot).unwrap();
        assert!(path.ends_with("data_snapshot_sber.json"));
        assert!(!path.with_extension("tmp").exists());

        let loaded = store.load("SBER").unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        for (a, b) in loaded.last_window.iter().zip(&snapshot.last_window) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert!(loaded.transform.is_identical(&snapshot.transform));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let (store, dir) = create_test_store();
        let mut snapshot = sample_snapshot();
        store.save(&snapshot).unwrap();

        snapshot.accuracy = 87.5;
        store.save(&snapshot).unwrap();

        assert_eq!(store.load("sber").unwrap().unwrap().accuracy, 87.5);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_remove_deletes_existing_snapshot() {
        let (store, dir) = create_test_store();
        assert!(!store.remove("SBER").unwrap());

        store.save(&sample_snapshot()).unwrap();
        assert!(store.remove("sber").unwrap());
        assert!(!store.exists("SBER"));
        assert!(store.load("SBER").unwrap().is_none());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let (store, dir) = create_test_store();
        fs::create_dir_all(&dir).unwrap();
        fs::write(store.path_for("sber"), "{ \"ticker\": ").unwrap();

        let err = store.load("SBER").unwrap_err();
        assert_eq!(err.kind(), "model_load_failed");
        fs::remove_dir_all(dir).ok();
    }
}
