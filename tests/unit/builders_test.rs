//! Tests for builder modules

use std::collections::BTreeMap;
use std::sync::Arc;

use prometheus_budget_scheduler::builders::{build_engines, in_memory_queue, EngineBuilder};
use prometheus_budget_scheduler::config::{DimensionConfig, EngineConfig};
use prometheus_budget_scheduler::core::SchedulerError;
use prometheus_budget_scheduler::util::{Clock, SystemClock};

fn api_config() -> EngineConfig {
    EngineConfig::new("unnamed").with_dimension("api_calls", DimensionConfig::per_minute(60.0))
}

#[test]
fn test_engine_builder_defaults() {
    let engine = EngineBuilder::new("engine1")
        .dimension("api_calls", DimensionConfig::per_minute(60.0))
        .build()
        .unwrap();
    assert_eq!(engine.name(), "engine1");
    assert_eq!(engine.config().lookahead_window_size, 5);
    assert_eq!(engine.budget_snapshot()["api_calls"], 60.0);
}

#[test]
fn test_engine_builder_overrides() {
    let engine = EngineBuilder::from_config(api_config())
        .lookahead(3)
        .max_concurrent(2)
        .max_queue_depth(10)
        .build()
        .unwrap();
    assert_eq!(engine.config().lookahead_window_size, 3);
    assert_eq!(engine.config().max_concurrent_executions, Some(2));
    assert_eq!(engine.config().max_queue_depth, Some(10));
}

#[test]
fn test_engine_builder_rejects_invalid() {
    let result = EngineBuilder::new("no-dims").build();
    assert!(matches!(result, Err(SchedulerError::ConfigurationInvalid(_))));
}

#[test]
fn test_build_engines_names_from_keys() {
    let mut configs = BTreeMap::new();
    configs.insert("openai".to_string(), api_config());
    configs.insert("anthropic".to_string(), api_config().with_max_queue_depth(4));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let engines = build_engines(&configs, in_memory_queue, &clock).unwrap();
    assert_eq!(engines.len(), 2);
    assert_eq!(engines["openai"].name(), "openai");
    assert_eq!(engines["anthropic"].config().max_queue_depth, Some(4));
}

#[test]
fn test_build_engines_all_or_nothing() {
    let mut configs = BTreeMap::new();
    configs.insert("good".to_string(), api_config());
    configs.insert("bad".to_string(), EngineConfig::new("bad"));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let result = build_engines(&configs, in_memory_queue, &clock);
    assert!(matches!(result, Err(SchedulerError::ConfigurationInvalid(_))));

    let empty = build_engines(&BTreeMap::new(), in_memory_queue, &clock);
    assert!(empty.is_err());
}
