//! Model and windowing configuration.
//!
//! Hyperparameters come from the environment and can be overridden by a TOML
//! file passed on the command line.

use super::parse_or;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Regressor family trained on the windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    Linear,
}

impl FromStr for ModelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random_forest" | "forest" | "rf" => Ok(ModelKind::RandomForest),
            "linear" | "linear_regression" => Ok(ModelKind::Linear),
            _ => anyhow::bail!(
                "Invalid MODEL_KIND: {}. Must be 'random_forest' or 'linear'",
                s
            ),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::RandomForest => write!(f, "random_forest"),
            ModelKind::Linear => write!(f, "linear"),
        }
    }
}

/// Random forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_split: 5,
        }
    }
}

/// Model environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelEnvConfig {
    pub lookback: usize,
    pub forecast_days: usize,
    pub train_split: f64,
    pub kind: ModelKind,
    pub forest: ForestParams,
}

impl Default for ModelEnvConfig {
    fn default() -> Self {
        Self {
            lookback: 60,
            forecast_days: 1,
            train_split: 0.8,
            kind: ModelKind::RandomForest,
            forest: ForestParams::default(),
        }
    }
}

impl ModelEnvConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let kind = match lookup("MODEL_KIND") {
            Some(raw) => ModelKind::from_str(raw.trim())?,
            None => defaults.kind,
        };

        Ok(Self {
            lookback: parse_or(lookup, "LOOKBACK", defaults.lookback)?,
            forecast_days: parse_or(lookup, "FORECAST_DAYS", defaults.forecast_days)?,
            train_split: parse_or(lookup, "TRAIN_SPLIT", defaults.train_split)?,
            kind,
            forest: ForestParams {
                n_trees: parse_or(lookup, "FOREST_N_TREES", defaults.forest.n_trees)?,
                max_depth: parse_or(lookup, "FOREST_MAX_DEPTH", defaults.forest.max_depth)?,
                min_split: parse_or(lookup, "FOREST_MIN_SPLIT", defaults.forest.min_split)?,
            },
        })
    }

    /// Replaces these settings with the ones in a TOML file.
    ///
    /// Keys missing from the file keep their defaults, not the current values.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model config {:?}", path))?;
        let config: ModelEnvConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse model config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            anyhow::bail!("LOOKBACK must be positive");
        }
        if self.forecast_days == 0 {
            anyhow::bail!("FORECAST_DAYS must be positive");
        }
        if !(self.train_split > 0.0 && self.train_split < 1.0) {
            anyhow::bail!("TRAIN_SPLIT must be in (0, 1), got {}", self.train_split);
        }
        if self.forest.n_trees == 0 {
            anyhow::bail!("FOREST_N_TREES must be positive");
        }
        Ok(())
    }

    /// Smallest series length that yields at least one window.
    pub fn min_records(&self) -> usize {
        self.lookback + self.forecast_days
    }
}
