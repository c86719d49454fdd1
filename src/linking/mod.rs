//! Agent/protocol linking engine.
//!
//! This module binds protocol configurations (driver instances declared as
//! attributes on agent assets) to the asset attributes that reference them,
//! keeps those bindings consistent with the persisted asset graph, tracks the
//! connection health of every linked configuration, and routes attribute
//! value events between the asset pipeline and the drivers. The module
//! follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
