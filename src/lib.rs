//! Agentlink: binds protocol driver instances to the assets they serve.
//!
//! The crate keeps an in-memory link index consistent with a persisted asset
//! graph, tracks the connection health of every linked protocol
//! configuration, and routes attribute value events between the asset layer
//! and drivers.
//!
//! # Architecture
//!
//! Agentlink follows hexagonal architecture principles:
//!
//! - **Domain**: Pure linking model with no infrastructure dependencies
//! - **Ports**: Trait contracts for drivers, the asset store and the asset
//!   pipeline
//! - **Adapters**: In-memory collaborators and a simulator driver
//! - **Services**: Registry, link index, reconciliation, routing and the
//!   agent service orchestrating them
//!
//! # Modules
//!
//! - [`linking`]: Agent and protocol linking engine
//! - [`config`]: Engine configuration loading

pub mod config;
pub mod linking;
