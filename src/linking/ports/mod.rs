//! Port contracts for the linking engine.
//!
//! Drivers, the asset store and the asset-update pipeline are external
//! collaborators; the services only see them through these traits.

pub mod asset_store;
pub mod driver;
pub mod pipeline;

pub use asset_store::{AssetQuery, AssetStore, AssetStoreError, AssetStoreResult};
pub use driver::{ConnectionStatusSink, Driver, DriverError, DriverResult, StatusReporter};
pub use pipeline::{AssetPipeline, PipelineError, PipelineResult};
