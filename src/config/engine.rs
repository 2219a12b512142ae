//! Engine, budget, and scoring configuration structures.
//!
//! Every weight here is a heuristic default. Tune them against the cost
//! distribution of the real workload before relying on the ordering they
//! produce.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::serde::{Priority, MAX_AMOUNT};

/// How a budget dimension regains tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefillMode {
    /// Rate quota: tokens accrue continuously at `capacity` per refill period
    /// and consumed tokens are gone for good.
    #[default]
    Replenishing,
    /// Occupancy ceiling: no time-based refill; a task's reservation is
    /// handed back in full once it finishes.
    Concurrent,
}

/// Budget configuration for one resource dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionConfig {
    /// Tokens per refill period, and the bucket ceiling.
    pub capacity: f64,
    /// Length of the refill period in seconds.
    #[serde(default = "default_refill_period_secs")]
    pub refill_period_secs: f64,
    /// Refill behaviour.
    #[serde(default)]
    pub mode: RefillMode,
    /// Tokens available at construction; full capacity when unset.
    #[serde(default)]
    pub initial_tokens: Option<f64>,
}

const fn default_refill_period_secs() -> f64 {
    60.0
}

impl DimensionConfig {
    /// Replenishing dimension with `capacity` tokens per minute.
    pub const fn per_minute(capacity: f64) -> Self {
        Self {
            capacity,
            refill_period_secs: default_refill_period_secs(),
            mode: RefillMode::Replenishing,
            initial_tokens: None,
        }
    }

    /// Concurrent ceiling of `capacity` units.
    pub const fn ceiling(capacity: f64) -> Self {
        Self {
            capacity,
            refill_period_secs: default_refill_period_secs(),
            mode: RefillMode::Concurrent,
            initial_tokens: None,
        }
    }

    /// Start the bucket with `tokens` instead of full capacity.
    #[must_use]
    pub const fn with_initial_tokens(mut self, tokens: f64) -> Self {
        self.initial_tokens = Some(tokens);
        self
    }

    /// Override the refill period.
    #[must_use]
    pub fn with_refill_period(mut self, period: Duration) -> Self {
        self.refill_period_secs = period.as_secs_f64();
        self
    }

    /// Refill period as a `Duration`.
    pub fn refill_period(&self) -> Duration {
        Duration::from_secs_f64(self.refill_period_secs)
    }

    /// Validate dimension values.
    pub fn validate(&self) -> Result<(), String> {
        if !self.capacity.is_finite() || self.capacity <= 0.0 || self.capacity > MAX_AMOUNT {
            return Err(format!(
                "capacity must be greater than 0 and at most {MAX_AMOUNT}, got {}",
                self.capacity
            ));
        }
        if !self.refill_period_secs.is_finite() || self.refill_period_secs <= 0.0 {
            return Err("refill_period_secs must be a finite number greater than 0".into());
        }
        if let Some(initial) = self.initial_tokens {
            if !initial.is_finite() || initial < 0.0 || initial > self.capacity {
                return Err(format!(
                    "initial_tokens must be within [0, {}], got {initial}",
                    self.capacity
                ));
            }
        }
        Ok(())
    }
}

/// Numeric weight of each tier; lower means more urgent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierWeights {
    /// Weight of `Critical`.
    pub critical: f64,
    /// Weight of `High`.
    pub high: f64,
    /// Weight of `Normal`.
    pub normal: f64,
    /// Weight of `Low`.
    pub low: f64,
    /// Weight of `BestEffort`.
    pub best_effort: f64,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            critical: 1.0,
            high: 2.0,
            normal: 3.0,
            low: 4.0,
            best_effort: 5.0,
        }
    }
}

impl TierWeights {
    /// Weight for a tier.
    pub const fn weight(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
            Priority::BestEffort => self.best_effort,
        }
    }
}

/// Coefficients of the scoring function
/// `tier * priority_weight + cost * cost_weight - age_minutes * age_weight`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Per-tier base weights.
    pub tiers: TierWeights,
    /// Multiplier on the tier weight; keep it large so tiers dominate.
    pub priority_weight: f64,
    /// Multiplier on the collapsed cost; nudges cheaper tasks ahead within a tier.
    pub cost_weight: f64,
    /// Score reduction per minute of waiting. Zero disables starvation protection.
    pub age_weight: f64,
    /// Per-dimension weights used to collapse a cost into one number.
    /// Dimensions not listed weigh 1.0.
    pub dimension_weights: BTreeMap<String, f64>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            tiers: TierWeights::default(),
            priority_weight: 10.0,
            cost_weight: 0.1,
            age_weight: 0.5,
            dimension_weights: BTreeMap::new(),
        }
    }
}

impl ScoringWeights {
    /// Validate that every coefficient is finite and non-negative.
    pub fn validate(&self) -> Result<(), String> {
        let named = [
            ("priority_weight", self.priority_weight),
            ("cost_weight", self.cost_weight),
            ("age_weight", self.age_weight),
        ];
        let tiers = Priority::ALL
            .iter()
            .map(|p| (p.as_str(), self.tiers.weight(*p)));
        for (name, value) in named.into_iter().chain(tiers) {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be a finite non-negative number, got {value}"));
            }
        }
        for (dimension, value) in &self.dimension_weights {
            if !value.is_finite() || *value < 0.0 {
                return Err(format!(
                    "dimension weight for `{dimension}` must be finite and non-negative"
                ));
            }
        }
        Ok(())
    }
}

/// Root engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine name, used in logs and metrics.
    #[serde(default = "default_name")]
    pub name: String,
    /// Map of dimension name to budget configuration.
    pub dimensions: BTreeMap<String, DimensionConfig>,
    /// Number of queue-front candidates examined per dispatch attempt.
    #[serde(default = "default_lookahead")]
    pub lookahead_window_size: usize,
    /// Upper bound on task bodies running at once.
    #[serde(default)]
    pub max_concurrent_executions: Option<usize>,
    /// Upper bound on queued tasks.
    #[serde(default)]
    pub max_queue_depth: Option<usize>,
    /// Interval of the background refill loop in milliseconds.
    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,
    /// Idle poll interval of the background dispatcher in milliseconds.
    #[serde(default = "default_dispatch_interval_ms")]
    pub dispatch_interval_ms: u64,
    /// Scoring coefficients.
    #[serde(default)]
    pub scoring: ScoringWeights,
}

fn default_name() -> String {
    "default".into()
}

const fn default_lookahead() -> usize {
    5
}

const fn default_refill_interval_ms() -> u64 {
    100
}

const fn default_dispatch_interval_ms() -> u64 {
    50
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            dimensions: BTreeMap::new(),
            lookahead_window_size: default_lookahead(),
            max_concurrent_executions: None,
            max_queue_depth: None,
            refill_interval_ms: default_refill_interval_ms(),
            dispatch_interval_ms: default_dispatch_interval_ms(),
            scoring: ScoringWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Empty configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add or replace a budget dimension.
    #[must_use]
    pub fn with_dimension(mut self, name: impl Into<String>, dimension: DimensionConfig) -> Self {
        self.dimensions.insert(name.into(), dimension);
        self
    }

    /// Set the lookahead window size.
    #[must_use]
    pub const fn with_lookahead(mut self, k: usize) -> Self {
        self.lookahead_window_size = k;
        self
    }

    /// Limit concurrently running task bodies.
    #[must_use]
    pub const fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent_executions = Some(n);
        self
    }

    /// Limit queue depth.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, n: usize) -> Self {
        self.max_queue_depth = Some(n);
        self
    }

    /// Replace the scoring weights.
    #[must_use]
    pub fn with_scoring(mut self, scoring: ScoringWeights) -> Self {
        self.scoring = scoring;
        self
    }

    /// Refill loop interval as a `Duration`.
    pub const fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }

    /// Dispatcher idle interval as a `Duration`.
    pub const fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    /// Validate all dimensions and tunables.
    pub fn validate(&self) -> Result<(), String> {
        if self.dimensions.is_empty() {
            return Err("at least one budget dimension must be defined".into());
        }
        for (name, dimension) in &self.dimensions {
            if name.is_empty() {
                return Err("dimension names must not be empty".into());
            }
            dimension
                .validate()
                .map_err(|e| format!("dimension `{name}` invalid: {e}"))?;
        }
        if self.lookahead_window_size == 0 {
            return Err("lookahead_window_size must be greater than 0".into());
        }
        if self.max_concurrent_executions == Some(0) {
            return Err("max_concurrent_executions must be greater than 0 when set".into());
        }
        if self.max_queue_depth == Some(0) {
            return Err("max_queue_depth must be greater than 0 when set".into());
        }
        if self.refill_interval_ms == 0 {
            return Err("refill_interval_ms must be greater than 0".into());
        }
        if self.dispatch_interval_ms == 0 {
            return Err("dispatch_interval_ms must be greater than 0".into());
        }
        self.scoring
            .validate()
            .map_err(|e| format!("scoring invalid: {e}"))
    }

    /// Parse engine configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
