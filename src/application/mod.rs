// Regressor port and smartcore-backed models
pub mod ml;

// Window preparation and rollout
pub mod forecast_engine;
pub mod window_preparer;

// Held-out evaluation
pub mod metrics_evaluator;

// Snapshot vs CSV selection
pub mod source_selector;

// Use cases
pub mod prediction_service;
pub mod training_service;
