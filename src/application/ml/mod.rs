pub mod regressor;
pub mod smartcore_regressor;
