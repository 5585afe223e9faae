//! Price-series primitives shared by training and inference.

pub mod calendar;
pub mod scaling;
pub mod types;
pub mod window;
