pub mod report;

pub use report::{PredictionResponse, TrainingResponse};
