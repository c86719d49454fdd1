//! Unit tests for the linking engine.

mod support;
