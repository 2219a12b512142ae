//! Builders to construct scheduler engines from configuration.

pub mod engine_builder;

pub use engine_builder::{build_engines, in_memory_queue, EngineBuilder};
