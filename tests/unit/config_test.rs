//! Tests for configuration validation

use std::time::Duration;

use prometheus_budget_scheduler::config::{
    DimensionConfig, EngineConfig, RefillMode, ScoringWeights, TierWeights,
};
use prometheus_budget_scheduler::util::Priority;

fn valid() -> EngineConfig {
    EngineConfig::new("api").with_dimension("api_calls", DimensionConfig::per_minute(60.0))
}

#[test]
fn test_engine_config_validation() {
    assert!(valid().validate().is_ok());
}

#[test]
fn test_engine_config_defaults() {
    let cfg = valid();
    assert_eq!(cfg.lookahead_window_size, 5);
    assert_eq!(cfg.max_concurrent_executions, None);
    assert_eq!(cfg.max_queue_depth, None);
    assert_eq!(cfg.refill_interval(), Duration::from_millis(100));
    assert_eq!(cfg.dispatch_interval(), Duration::from_millis(50));
    assert_eq!(cfg.scoring, ScoringWeights::default());
}

#[test]
fn test_engine_config_requires_dimension() {
    assert!(EngineConfig::new("empty").validate().is_err());
}

#[test]
fn test_engine_config_invalid_limits() {
    assert!(valid().with_lookahead(0).validate().is_err());
    assert!(valid().with_max_concurrent(0).validate().is_err());
    assert!(valid().with_max_queue_depth(0).validate().is_err());

    let mut cfg = valid();
    cfg.refill_interval_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_dimension_config_invalid_values() {
    assert!(DimensionConfig::per_minute(0.0).validate().is_err());
    assert!(DimensionConfig::per_minute(f64::NAN).validate().is_err());
    assert!(DimensionConfig::per_minute(10.0)
        .with_initial_tokens(11.0)
        .validate()
        .is_err());
    assert!(DimensionConfig::per_minute(10.0)
        .with_refill_period(Duration::ZERO)
        .validate()
        .is_err());
    assert!(DimensionConfig::per_minute(1.0e13).validate().is_err());
    assert!(DimensionConfig::ceiling(512.0).validate().is_ok());
}

#[test]
fn test_scoring_rejects_negative_weights() {
    let scoring = ScoringWeights {
        age_weight: -0.5,
        ..ScoringWeights::default()
    };
    assert!(valid().with_scoring(scoring).validate().is_err());

    let mut scoring = ScoringWeights::default();
    scoring.dimension_weights.insert("api_calls".into(), f64::INFINITY);
    assert!(scoring.validate().is_err());
}

#[test]
fn test_tier_weights_default_order() {
    let tiers = TierWeights::default();
    assert_eq!(tiers.weight(Priority::Critical), 1.0);
    assert_eq!(tiers.weight(Priority::High), 2.0);
    assert_eq!(tiers.weight(Priority::Normal), 3.0);
    assert_eq!(tiers.weight(Priority::Low), 4.0);
    assert_eq!(tiers.weight(Priority::BestEffort), 5.0);
}

#[test]
fn test_engine_config_from_json() {
    let json = r#"{
        "name": "llm-gateway",
        "dimensions": {
            "api_calls": { "capacity": 60 },
            "memory_mb": { "capacity": 512, "mode": "concurrent" }
        },
        "lookahead_window_size": 3,
        "scoring": { "age_weight": 1.0 }
    }"#;

    let cfg = EngineConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.name, "llm-gateway");
    assert_eq!(cfg.lookahead_window_size, 3);
    assert_eq!(cfg.dimensions["api_calls"].refill_period_secs, 60.0);
    assert_eq!(cfg.dimensions["memory_mb"].mode, RefillMode::Concurrent);
    assert_eq!(cfg.scoring.age_weight, 1.0);
    assert_eq!(cfg.scoring.priority_weight, 10.0);
}

#[test]
fn test_engine_config_from_json_rejects_invalid() {
    assert!(EngineConfig::from_json_str("not json").is_err());
    assert!(EngineConfig::from_json_str(r#"{ "dimensions": {} }"#).is_err());
}
