// Price series, scaling and calendar
pub mod series;

// Frozen training-time data bundle
pub mod snapshot;

// Evaluation metrics
pub mod metrics;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
