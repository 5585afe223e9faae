//! Persistence for trained models and their fitted transforms.
//!
//! Every ticker owns two correlated files in the models directory, named from
//! the lower-cased ticker. Both must exist for either to be used.

use crate::application::ml::smartcore_regressor::{Estimator, ForestModel, InputWidth, TrainedModel};
use crate::domain::errors::ForecastError;
use crate::domain::series::scaling::MinMaxTransform;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MODEL_FORMAT_VERSION: u32 = 2;

const RETRAIN_HINT: &str = "The model was saved by an incompatible version; retrain the model.";
const CORRUPT_HINT: &str = "The file is damaged or not a trendcast artifact; retrain the model.";

/// Deterministic artifact locations for one ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub transform: PathBuf,
    pub snapshot: PathBuf,
}

impl ArtifactPaths {
    pub fn for_ticker(models_dir: &Path, ticker: &str) -> Self {
        let key = ticker.to_lowercase();
        Self {
            model: models_dir.join(format!("lstm_patterns_{}.json", key)),
            transform: models_dir.join(format!("scaler_patterns_{}.json", key)),
            snapshot: models_dir.join(format!("data_snapshot_{}.json", key)),
        }
    }
}

/// On-disk wrapper around a trained model.
#[derive(Serialize, Deserialize)]
pub struct ModelEnvelope {
    pub format_version: u32,
    pub ticker: String,
    pub lookback: usize,
    pub trained_at: NaiveDateTime,
    pub artifact: Estimator,
}

/// A model restored from disk, with the strategy that read it.
pub struct LoadedModel {
    pub model: TrainedModel,
    pub lookback: Option<usize>,
    pub trained_at: Option<NaiveDateTime>,
    pub loaded_by: &'static str,
}

/// One way of reading a model file.
pub trait ModelLoader {
    fn name(&self) -> &'static str;
    fn load(&self, bytes: &[u8]) -> Result<LoadedModel, String>;
}

/// Current envelope format.
pub struct EnvelopeLoader;

impl ModelLoader for EnvelopeLoader {
    fn name(&self) -> &'static str {
        "envelope"
    }

    fn load(&self, bytes: &[u8]) -> Result<LoadedModel, String> {
        let envelope: ModelEnvelope =
            serde_json::from_slice(bytes).map_err(|e| format!("envelope: {}", e))?;
        if envelope.format_version != MODEL_FORMAT_VERSION {
            return Err(format!(
                "incompatible model format version {} (expected {})",
                envelope.format_version, MODEL_FORMAT_VERSION
            ));
        }
        Ok(LoadedModel {
            model: TrainedModel::from_parts(
                envelope.artifact,
                InputWidth::Exact(envelope.lookback),
            ),
            lookback: Some(envelope.lookback),
            trained_at: Some(envelope.trained_at),
            loaded_by: self.name(),
        })
    }
}

/// A bare serialized random forest without an envelope.
pub struct BareForestLoader;

impl ModelLoader for BareForestLoader {
    fn name(&self) -> &'static str {
        "bare_forest"
    }

    fn load(&self, bytes: &[u8]) -> Result<LoadedModel, String> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| format!("bare forest: {}", e))?;
        // the file carries no lookback; the deepest split feature bounds it from below
        let minimum = highest_split_feature(&value).map_or(0, |feature| feature + 1);
        let forest: ForestModel =
            serde_json::from_value(value).map_err(|e| format!("bare forest: {}", e))?;
        Ok(LoadedModel {
            model: TrainedModel::from_parts(
                Estimator::RandomForest(forest),
                InputWidth::AtLeast(minimum),
            ),
            lookback: None,
            trained_at: None,
            loaded_by: self.name(),
        })
    }
}

/// Largest `split_feature` of any internal tree node in a serialized forest.
fn highest_split_feature(value: &serde_json::Value) -> Option<usize> {
    use serde_json::Value;

    match value {
        Value::Object(map) => {
            let own = match (map.get("split_feature"), map.get("split_value")) {
                (Some(feature), Some(split)) if !split.is_null() => {
                    feature.as_u64().and_then(|f| usize::try_from(f).ok())
                }
                _ => None,
            };
            map.values().filter_map(highest_split_feature).chain(own).max()
        }
        Value::Array(items) => items.iter().filter_map(highest_split_feature).max(),
        _ => None,
    }
}

/// Tries each loader in order; the first success wins.
pub fn load_with_strategies(
    bytes: &[u8],
    loaders: &[&dyn ModelLoader],
) -> Result<LoadedModel, String> {
    let mut last_error = "no model loaders configured".to_string();
    for loader in loaders {
        match loader.load(bytes) {
            Ok(model) => return Ok(model),
            Err(e) => {
                debug!("Model loader '{}' failed: {}", loader.name(), e);
                last_error = e;
            }
        }
    }
    Err(last_error)
}

/// Maps a raw loader failure to a human-readable hint.
fn compatibility_hint(reason: &str) -> &'static str {
    let lowered = reason.to_lowercase();
    if lowered.contains("version")
        || lowered.contains("unknown variant")
        || lowered.contains("missing field")
        || lowered.contains("unknown field")
    {
        RETRAIN_HINT
    } else {
        CORRUPT_HINT
    }
}

fn write_atomic(path: &Path, content: &[u8], artifact: &str) -> Result<(), ForecastError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ForecastError::persistence(artifact, e))?;
    }
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| ForecastError::persistence(artifact, e))?;
    fs::rename(&temp_path, path).map_err(|e| ForecastError::persistence(artifact, e))
}

/// Model and transform files in one models directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    models_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn paths(&self, ticker: &str) -> ArtifactPaths {
        ArtifactPaths::for_ticker(&self.models_dir, ticker)
    }

    /// Fails with `ArtifactMissing` unless both model and transform exist.
    pub fn ensure_present(&self, ticker: &str) -> Result<ArtifactPaths, ForecastError> {
        let paths = self.paths(ticker);
        let model_exists = paths.model.exists();
        let transform_exists = paths.transform.exists();
        if !model_exists || !transform_exists {
            return Err(ForecastError::ArtifactMissing {
                ticker: ticker.to_uppercase(),
                model_exists,
                transform_exists,
            });
        }
        Ok(paths)
    }

    pub fn save_model(
        &self,
        ticker: &str,
        model: TrainedModel,
        lookback: usize,
        trained_at: NaiveDateTime,
    ) -> Result<TrainedModel, ForecastError> {
        let path = self.paths(ticker).model;
        let input_width = model.input_width();
        let envelope = ModelEnvelope {
            format_version: MODEL_FORMAT_VERSION,
            ticker: ticker.to_uppercase(),
            lookback,
            trained_at,
            artifact: model.into_estimator(),
        };
        let content =
            serde_json::to_vec(&envelope).map_err(|e| ForecastError::persistence("model", e))?;
        write_atomic(&path, &content, "model")?;
        info!("Model saved: {:?}", path);
        Ok(TrainedModel::from_parts(envelope.artifact, input_width))
    }

    pub fn save_transform(
        &self,
        ticker: &str,
        transform: &MinMaxTransform,
    ) -> Result<(), ForecastError> {
        let path = self.paths(ticker).transform;
        let content = serde_json::to_vec_pretty(transform)
            .map_err(|e| ForecastError::persistence("transform", e))?;
        write_atomic(&path, &content, "transform")?;
        info!("Transform saved: {:?}", path);
        Ok(())
    }

    pub fn load_model(&self, ticker: &str) -> Result<LoadedModel, ForecastError> {
        let path = self.paths(ticker).model;
        let bytes = fs::read(&path).map_err(|e| ForecastError::ArtifactLoad {
            artifact: "model".to_string(),
            reason: e.to_string(),
            hint: CORRUPT_HINT.to_string(),
        })?;

        let loaders: [&dyn ModelLoader; 2] = [&EnvelopeLoader, &BareForestLoader];
        match load_with_strategies(&bytes, &loaders) {
            Ok(loaded) => {
                if loaded.loaded_by != EnvelopeLoader.name() {
                    warn!(
                        "Model {:?} read by the '{}' loader; retrain to upgrade its format",
                        path, loaded.loaded_by
                    );
                }
                info!("Loaded {} from {:?}", loaded.loaded_by, path);
                Ok(loaded)
            }
            Err(reason) => Err(ForecastError::ArtifactLoad {
                artifact: "model".to_string(),
                hint: compatibility_hint(&reason).to_string(),
                reason,
            }),
        }
    }

    pub fn load_transform(&self, ticker: &str) -> Result<MinMaxTransform, ForecastError> {
        let path = self.paths(ticker).transform;
        let load_error = |reason: String| ForecastError::ArtifactLoad {
            artifact: "transform".to_string(),
            hint: compatibility_hint(&reason).to_string(),
            reason,
        };
        let bytes = fs::read(&path).map_err(|e| load_error(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| load_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::regressor::SequenceRegressor;
    use crate::config::{ForestParams, ModelKind};
    use crate::domain::series::window::WindowSet;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn create_test_store() -> (ArtifactStore, PathBuf) {
        let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let temp_dir = std::env::temp_dir().join(format!(
            "trendcast_artifacts_{}_{}",
            std::process::id(),
            unique_id
        ));
        fs::create_dir_all(&temp_dir).expect("Failed to create test temp dir");
        (ArtifactStore::new(&temp_dir), temp_dir)
    }

    fn small_forest() -> TrainedModel {
        let mut set = WindowSet::default();
        for i in 0..20 {
            let base = i as f64 / 25.0;
            set.windows.push(vec![base, base + 0.01, base + 0.02]);
            set.targets.push(base + 0.03);
        }
        let params = ForestParams {
            n_trees: 3,
            max_depth: 3,
            min_split: 2,
        };
        TrainedModel::fit(ModelKind::RandomForest, &params, &set).unwrap()
    }

    fn trained_at() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_paths_use_lowercase_ticker() {
        let paths = ArtifactPaths::for_ticker(Path::new("models"), "SBER");
        assert_eq!(paths.model, PathBuf::from("models/lstm_patterns_sber.json"));
        assert_eq!(paths.transform, PathBuf::from("models/scaler_patterns_sber.json"));
        assert_eq!(paths.snapshot, PathBuf::from("models/data_snapshot_sber.json"));
    }

    #[test]
    fn test_missing_artifacts_report_which_exist() {
        let (store, dir) = create_test_store();
        let transform = MinMaxTransform::fit(&[1.0, 2.0]).unwrap();
        store.save_transform("gazp", &transform).unwrap();

        match store.ensure_present("GAZP").unwrap_err() {
            ForecastError::ArtifactMissing {
                model_exists,
                transform_exists,
                ..
            } => {
                assert!(!model_exists);
                assert!(transform_exists);
            }
            other => panic!("unexpected error {:?}", other),
        }
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_model_and_transform_roundtrip() {
        let (store, dir) = create_test_store();
        let model = small_forest();
        let window = [0.2, 0.21, 0.22];
        let before = model.predict(&window).unwrap();

        store.save_model("SBER", model, 3, trained_at()).unwrap();
        let transform = MinMaxTransform::fit(&[250.37, 311.93]).unwrap();
        store.save_transform("SBER", &transform).unwrap();

        store.ensure_present("sber").unwrap();
        let loaded = store.load_model("sber").unwrap();
        assert_eq!(loaded.loaded_by, "envelope");
        assert_eq!(loaded.lookback, Some(3));
        assert_eq!(loaded.trained_at, Some(trained_at()));
        assert_eq!(loaded.model.input_width(), InputWidth::Exact(3));
        assert_eq!(loaded.model.predict(&window).unwrap().to_bits(), before.to_bits());
        assert!(loaded.model.predict(&[0.2, 0.21]).is_err());
        assert!(store.load_transform("sber").unwrap().is_identical(&transform));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_bare_forest_is_read_by_fallback_loader() {
        let (store, dir) = create_test_store();
        let forest = match small_forest().into_estimator() {
            Estimator::RandomForest(forest) => forest,
            Estimator::Linear(_) => unreachable!(),
        };
        let path = store.paths("lkoh").model;
        fs::write(&path, serde_json::to_vec(&forest).unwrap()).unwrap();

        let loaded = store.load_model("LKOH").unwrap();
        assert_eq!(loaded.loaded_by, "bare_forest");
        assert_eq!(loaded.lookback, None);
        assert_eq!(loaded.trained_at, None);
        // trained on 3-wide windows, so the bound never exceeds 3
        match loaded.model.input_width() {
            InputWidth::AtLeast(minimum) => assert!(minimum <= 3),
            other => panic!("unexpected width {:?}", other),
        }
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_unknown_format_version_surfaces_retrain_hint() {
        let (store, dir) = create_test_store();
        store.save_model("SBER", small_forest(), 3, trained_at()).unwrap();
        let path = store.paths("sber").model;
        let mut value: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["format_version"] = serde_json::json!(99);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        // the bare loader runs last, so its failure is what gets reported
        match store.load_model("sber").err().unwrap() {
            ForecastError::ArtifactLoad { artifact, hint, .. } => {
                assert_eq!(artifact, "model");
                assert!(!hint.is_empty());
            }
            other => panic!("unexpected error {:?}", other),
        }
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_garbage_model_is_a_load_error() {
        let (store, dir) = create_test_store();
        fs::write(store.paths("sber").model, b"\x00\x01 not json").unwrap();
        let err = store.load_model("sber").err().unwrap();
        assert_eq!(err.kind(), "model_load_failed");
        assert!(err.to_string().contains("retrain"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_highest_split_feature_ignores_leaves() {
        let trees = serde_json::json!({
            "trees": [
                {"nodes": [
                    {"split_feature": 4, "split_value": 0.5},
                    {"split_feature": 0, "split_value": null},
                ]},
                {"nodes": [{"split_feature": 9, "split_value": null}]},
            ]
        });
        assert_eq!(highest_split_feature(&trees), Some(4));
        assert_eq!(highest_split_feature(&serde_json::json!({"trees": []})), None);
    }

    #[test]
    fn test_strategies_report_last_failure() {
        struct Failing(&'static str);
        impl ModelLoader for Failing {
            fn name(&self) -> &'static str {
                self.0
            }
            fn load(&self, _: &[u8]) -> Result<LoadedModel, String> {
                Err(format!("{} failed", self.0))
            }
        }

        let loaders: [&dyn ModelLoader; 2] = [&Failing("first"), &Failing("second")];
        let result = load_with_strategies(b"{}", &loaders);
        assert_eq!(result.err().unwrap(), "second failed");
        assert!(load_with_strategies(b"{}", &[]).is_err());
    }
}
