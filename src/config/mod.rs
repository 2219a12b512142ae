//! Configuration models for budgets, scoring weights, and dispatch tuning.

pub mod engine;

pub use engine::{DimensionConfig, EngineConfig, RefillMode, ScoringWeights, TierWeights};
