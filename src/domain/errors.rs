use thiserror::Error;

/// Errors raised while preparing data, loading artifacts and rolling a forecast forward.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Invalid argument: {reason}")]
    Argument { reason: String },

    #[error(
        "Model for ticker {ticker} not found (model file present: {model_exists}, transform file present: {transform_exists}). Train the model first."
    )]
    ArtifactMissing {
        ticker: String,
        model_exists: bool,
        transform_exists: bool,
    },

    #[error("Failed to load {artifact}: {reason}. {hint}")]
    ArtifactLoad {
        artifact: String,
        reason: String,
        hint: String,
    },

    #[error("Data source unavailable: {reason}")]
    DataSource { reason: String },

    #[error("Invalid CSV schema: {reason}")]
    Schema { reason: String },

    #[error("Insufficient data: need at least {required} records, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Unparseable timestamp: {raw:?}")]
    DateParse { raw: String },

    #[error("Regressor failed at forecast step {step}: {reason}")]
    Rollout { step: usize, reason: String },

    #[error("Failed to persist {artifact}: {reason}")]
    Persistence { artifact: String, reason: String },
}

impl ForecastError {
    /// Stable machine-readable code carried in structured error results.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::Argument { .. } => "argument_error",
            ForecastError::ArtifactMissing { .. } => "model_not_found",
            ForecastError::ArtifactLoad { .. } => "model_load_failed",
            ForecastError::DataSource { .. } => "data_source_error",
            ForecastError::Schema { .. } => "schema_error",
            ForecastError::InsufficientData { .. } => "insufficient_data",
            ForecastError::DateParse { .. } => "date_parse_error",
            ForecastError::Rollout { .. } => "rollout_failed",
            ForecastError::Persistence { .. } => "persistence_error",
        }
    }

    pub fn argument(reason: impl Into<String>) -> Self {
        ForecastError::Argument {
            reason: reason.into(),
        }
    }

    pub fn data_source(reason: impl Into<String>) -> Self {
        ForecastError::DataSource {
            reason: reason.into(),
        }
    }

    pub fn persistence(artifact: impl Into<String>, reason: impl ToString) -> Self {
        ForecastError::Persistence {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }
}
