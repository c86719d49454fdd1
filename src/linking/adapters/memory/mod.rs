//! In-memory collaborators for tests and the standalone daemon.

mod asset_store;
mod pipeline;

pub use asset_store::InMemoryAssetStore;
pub use pipeline::RecordingAssetPipeline;
