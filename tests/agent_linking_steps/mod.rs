//! Step definitions for agent linking BDD scenarios.

pub mod world;

mod given;
mod then;
mod when;
