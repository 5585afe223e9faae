pub mod artifact_store;
pub mod csv_series;
pub mod logging;
pub mod snapshot_store;

pub use artifact_store::ArtifactStore;
pub use csv_series::CsvSeriesStore;
pub use snapshot_store::SnapshotStore;
