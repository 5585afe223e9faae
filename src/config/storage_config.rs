//! Storage locations for ticker CSV files and trained artifacts.

use std::path::PathBuf;

/// Storage environment configuration
#[derive(Debug, Clone)]
pub struct StorageEnvConfig {
    /// Directory holding `<TICKER>.csv` history files.
    pub data_dir: PathBuf,
    /// Directory holding model, transform and snapshot artifacts.
    pub models_dir: PathBuf,
}

impl Default for StorageEnvConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("storage/app/private/securities"),
            models_dir: PathBuf::from("models"),
        }
    }
}

impl StorageEnvConfig {
    pub fn from_lookup<L>(lookup: &L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            data_dir: lookup("TRENDCAST_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            models_dir: lookup("TRENDCAST_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
        }
    }
}
