//! Builders to construct scheduler engines from configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{DimensionConfig, EngineConfig, ScoringWeights};
use crate::core::{SchedulerEngine, SchedulerError, TaskQueue};
use crate::infra::queue::ReadyQueue;
use crate::util::clock::{Clock, SystemClock};

/// Fluent construction of a single engine.
///
/// ```rust,ignore
/// let engine = EngineBuilder::new("llm-gateway")
///     .dimension("api_calls", DimensionConfig::per_minute(60.0))
///     .dimension("memory_mb", DimensionConfig::ceiling(512.0))
///     .lookahead(5)
///     .max_concurrent(4)
///     .build()?;
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl EngineBuilder {
    /// Start from an empty configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(EngineConfig::new(name))
    }

    /// Start from an existing configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Add a budget dimension.
    #[must_use]
    pub fn dimension(mut self, name: impl Into<String>, dimension: DimensionConfig) -> Self {
        self.config = self.config.with_dimension(name, dimension);
        self
    }

    /// Lookahead window size.
    #[must_use]
    pub fn lookahead(mut self, k: usize) -> Self {
        self.config.lookahead_window_size = k;
        self
    }

    /// Cap on concurrently running bodies.
    #[must_use]
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.config.max_concurrent_executions = Some(n);
        self
    }

    /// Cap on queued tasks.
    #[must_use]
    pub fn max_queue_depth(mut self, n: usize) -> Self {
        self.config.max_queue_depth = Some(n);
        self
    }

    /// Scoring weights.
    #[must_use]
    pub fn scoring(mut self, scoring: ScoringWeights) -> Self {
        self.config.scoring = scoring;
        self
    }

    /// Time source.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<SchedulerEngine, SchedulerError> {
        SchedulerEngine::with_clock(self.config, self.clock)
    }
}

/// Build one isolated engine per entry, naming each after its key.
///
/// Every configuration is validated before any engine is built, so either all
/// engines come back or none do.
pub fn build_engines<Q, FQ>(
    configs: &BTreeMap<String, EngineConfig>,
    mut queue_factory: FQ,
    clock: &Arc<dyn Clock>,
) -> Result<BTreeMap<String, SchedulerEngine<Q>>, SchedulerError>
where
    Q: TaskQueue + 'static,
    FQ: FnMut(&str, &EngineConfig) -> Result<Q, SchedulerError>,
{
    if configs.is_empty() {
        return Err(SchedulerError::ConfigurationInvalid(
            "at least one engine must be defined".into(),
        ));
    }
    for (name, cfg) in configs {
        cfg.validate()
            .map_err(|e| SchedulerError::ConfigurationInvalid(format!("engine `{name}`: {e}")))?;
    }

    let mut engines = BTreeMap::new();
    for (name, cfg) in configs {
        let mut cfg = cfg.clone();
        cfg.name.clone_from(name);
        let queue = queue_factory(name, &cfg)?;
        let engine = SchedulerEngine::with_queue(cfg, queue, Arc::clone(clock))?;
        engines.insert(name.clone(), engine);
    }
    Ok(engines)
}

/// Queue factory for [`build_engines`] that honours `max_queue_depth`.
pub fn in_memory_queue(_name: &str, cfg: &EngineConfig) -> Result<ReadyQueue, SchedulerError> {
    Ok(cfg
        .max_queue_depth
        .map_or_else(ReadyQueue::new, ReadyQueue::bounded))
}
