//! Serializable value types shared across the scheduler.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned to a task at admission, unique within one engine.
pub type TaskId = u64;

/// Fixed-point scale used whenever a cost touches a budget (micro-units).
pub const MICRO_UNITS: f64 = 1_000_000.0;

/// Largest amount a capacity or cost may declare. Above this the micro-unit
/// representation no longer fits in a `u64`.
pub const MAX_AMOUNT: f64 = 1.0e12;

/// Urgency tier of a task. `Critical` is the most urgent.
///
/// The ordering follows urgency, so `Critical > High > ... > BestEffort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Deferrable work that runs only when nothing else can.
    BestEffort,
    /// Background work that may be delayed under pressure.
    Low,
    /// Standard background work.
    Normal,
    /// Important, but can wait briefly.
    High,
    /// User-facing work that must run first.
    Critical,
}

impl Priority {
    /// All tiers from most to least urgent.
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::High,
        Self::Normal,
        Self::Low,
        Self::BestEffort,
    ];

    /// Stable lowercase name, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::BestEffort => "best_effort",
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared resource cost of a task, per budget dimension.
///
/// Dimensions that are not present cost nothing. A `CostVector` is built once
/// and then only read; the engine never changes the cost of an admitted task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostVector {
    amounts: BTreeMap<String, f64>,
}

impl CostVector {
    /// An empty cost (free in every dimension).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for one dimension.
    #[must_use]
    pub fn with(mut self, dimension: impl Into<String>, amount: f64) -> Self {
        self.amounts.insert(dimension.into(), amount);
        self
    }

    /// Amount declared for `dimension`, zero when absent.
    pub fn get(&self, dimension: &str) -> f64 {
        self.amounts.get(dimension).copied().unwrap_or(0.0)
    }

    /// Iterate over declared dimensions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.amounts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// True when no dimension carries a positive amount.
    pub fn is_free(&self) -> bool {
        self.amounts.values().all(|v| *v <= 0.0)
    }

    /// Check that every amount is finite and non-negative.
    pub fn validate(&self) -> Result<(), String> {
        for (dimension, amount) in &self.amounts {
            if !amount.is_finite() || *amount < 0.0 || *amount > MAX_AMOUNT {
                return Err(format!(
                    "cost for `{dimension}` must be within [0, {MAX_AMOUNT}], got {amount}"
                ));
            }
        }
        Ok(())
    }

    /// Weighted magnitude of this cost. Dimensions without an explicit weight
    /// count with weight 1.0.
    pub fn scalar(&self, weights: &BTreeMap<String, f64>) -> f64 {
        self.amounts
            .iter()
            .map(|(dimension, amount)| weights.get(dimension).copied().unwrap_or(1.0) * amount)
            .sum()
    }

    /// Per-dimension minimum of `self` and `cap`, restricted to `cap`'s dimensions.
    #[must_use]
    pub fn clamped_to(&self, cap: &Self) -> Self {
        let amounts = cap
            .amounts
            .iter()
            .map(|(dimension, limit)| (dimension.clone(), self.get(dimension).min(*limit).max(0.0)))
            .collect();
        Self { amounts }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for CostVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            amounts: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl fmt::Display for CostVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (dimension, amount)) in self.amounts.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dimension}={amount}")?;
        }
        f.write_str("}")
    }
}

/// Convert a token amount into budget micro-units.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_micro(amount: f64) -> u64 {
    (amount.max(0.0) * MICRO_UNITS).round() as u64
}

/// Convert budget micro-units back into a token amount.
#[allow(clippy::cast_precision_loss)]
pub fn from_micro(micro: u64) -> f64 {
    micro as f64 / MICRO_UNITS
}
