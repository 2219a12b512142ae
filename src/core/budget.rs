//! Multi-dimensional token-bucket budget.
//!
//! Token counts are kept in fixed-point micro-units (`u64`) so a reservation
//! and its release cancel out exactly, and refill keeps the sub-unit remainder
//! of every call so many short refills add up to the same total as one long
//! one. Nothing here is synchronised: the engine owns the budget behind the
//! same mutex as its queue.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::{DimensionConfig, RefillMode};
use crate::util::serde::{from_micro, to_micro, CostVector};

/// Token bucket for one dimension.
#[derive(Debug, Clone)]
struct TokenBucket {
    capacity: u64,
    available: u64,
    period_nanos: u128,
    /// Accrued `capacity * nanos` not yet converted into a whole micro-unit.
    carry: u128,
    mode: RefillMode,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(cfg: &DimensionConfig, now: Instant) -> Self {
        let capacity = to_micro(cfg.capacity);
        let available = cfg.initial_tokens.map_or(capacity, to_micro).min(capacity);
        Self {
            capacity,
            available,
            period_nanos: cfg.refill_period().as_nanos().max(1),
            carry: 0,
            mode: cfg.mode,
            last_refill: now,
        }
    }

    fn refill(&mut self, elapsed: Duration) {
        if self.mode == RefillMode::Concurrent || elapsed.is_zero() {
            return;
        }
        if self.available >= self.capacity {
            self.carry = 0;
            return;
        }
        let room = u128::from(self.capacity - self.available);
        let Some(accrued) = u128::from(self.capacity)
            .checked_mul(elapsed.as_nanos())
            .and_then(|a| a.checked_add(self.carry))
        else {
            // Long enough to fill any bucket.
            self.available = self.capacity;
            self.carry = 0;
            return;
        };
        let added = accrued / self.period_nanos;
        self.carry = accrued % self.period_nanos;
        if added >= room {
            self.available = self.capacity;
            self.carry = 0;
        } else {
            // added < room <= u64::MAX
            self.available += u64::try_from(added).unwrap_or(u64::MAX);
        }
    }

    fn credit(&mut self, micro: u64) {
        self.available = self.available.saturating_add(micro).min(self.capacity);
    }
}

/// One token bucket per resource dimension.
#[derive(Debug, Clone)]
pub struct ResourceBudget {
    buckets: BTreeMap<String, TokenBucket>,
}

impl ResourceBudget {
    /// Build buckets from already-validated dimension configs.
    pub fn new(dimensions: &BTreeMap<String, DimensionConfig>, now: Instant) -> Self {
        let buckets = dimensions
            .iter()
            .map(|(name, cfg)| (name.clone(), TokenBucket::new(cfg, now)))
            .collect();
        Self { buckets }
    }

    /// Names of the configured dimensions.
    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Reject costs that name a dimension this budget does not track.
    pub fn check_dimensions(&self, cost: &CostVector) -> Result<(), String> {
        for (dimension, amount) in cost.iter() {
            if to_micro(amount) > 0 && !self.buckets.contains_key(dimension) {
                return Err(format!("unknown budget dimension `{dimension}`"));
            }
        }
        Ok(())
    }

    /// Whether `cost` fits in the tokens available right now. Diagnostic and
    /// admission use only; dispatch must go through [`reserve`](Self::reserve).
    pub fn can_afford(&self, cost: &CostVector) -> bool {
        cost.iter().all(|(dimension, amount)| {
            let micro = to_micro(amount);
            micro == 0
                || self
                    .buckets
                    .get(dimension)
                    .is_some_and(|b| b.available >= micro)
        })
    }

    /// Whether `cost` is larger than some bucket could ever hold.
    pub fn exceeds_capacity(&self, cost: &CostVector) -> bool {
        cost.iter().any(|(dimension, amount)| {
            let micro = to_micro(amount);
            micro > 0 && self.buckets.get(dimension).is_none_or(|b| micro > b.capacity)
        })
    }

    /// Debit every dimension of `cost`, or nothing at all.
    pub fn reserve(&mut self, cost: &CostVector) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        for (dimension, amount) in cost.iter() {
            let micro = to_micro(amount);
            if let Some(bucket) = self.buckets.get_mut(dimension) {
                bucket.available -= micro;
            }
        }
        true
    }

    /// Credit `cost` back, clamped at capacity.
    pub fn release(&mut self, cost: &CostVector) {
        for (dimension, amount) in cost.iter() {
            if let Some(bucket) = self.buckets.get_mut(dimension) {
                bucket.credit(to_micro(amount));
            }
        }
    }

    /// Reconcile a finished reservation. Replenishing dimensions get the
    /// unspent part back; concurrent dimensions get the whole reservation back.
    pub fn settle(&mut self, reserved: &CostVector, spent: &CostVector) {
        for (dimension, amount) in reserved.iter() {
            let Some(bucket) = self.buckets.get_mut(dimension) else {
                continue;
            };
            let reserved_micro = to_micro(amount);
            let credit = match bucket.mode {
                RefillMode::Concurrent => reserved_micro,
                RefillMode::Replenishing => {
                    reserved_micro.saturating_sub(to_micro(spent.get(dimension)))
                }
            };
            bucket.credit(credit);
        }
    }

    /// Add `capacity * elapsed / period` to every replenishing bucket.
    /// Does not move the stored last-refill timestamps.
    pub fn refill(&mut self, elapsed: Duration) {
        for bucket in self.buckets.values_mut() {
            bucket.refill(elapsed);
        }
    }

    /// Refill each bucket by the time since its last refill and advance the
    /// timestamp to `now`. An earlier `now` is a no-op.
    pub fn refill_until(&mut self, now: Instant) {
        for bucket in self.buckets.values_mut() {
            let elapsed = now.saturating_duration_since(bucket.last_refill);
            bucket.refill(elapsed);
            if now > bucket.last_refill {
                bucket.last_refill = now;
            }
        }
    }

    /// Tokens available in `dimension`.
    pub fn available(&self, dimension: &str) -> Option<f64> {
        self.buckets.get(dimension).map(|b| from_micro(b.available))
    }

    /// Capacity of `dimension`.
    pub fn capacity(&self, dimension: &str) -> Option<f64> {
        self.buckets.get(dimension).map(|b| from_micro(b.capacity))
    }

    /// Read-only view of available tokens per dimension.
    pub fn available_snapshot(&self) -> BTreeMap<String, f64> {
        self.buckets
            .iter()
            .map(|(name, b)| (name.clone(), from_micro(b.available)))
            .collect()
    }
}
