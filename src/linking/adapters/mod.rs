//! Adapter implementations for the asset store, pipeline and driver ports.

pub mod memory;
pub mod simulator;

pub use simulator::{SIMULATOR_DRIVER_NAME, SimulatorDriver};
