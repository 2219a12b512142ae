//! # Prometheus Budget Scheduler
//!
//! A cost-aware task scheduler for workloads that share a capped external
//! resource: API call quotas, compute-unit allowances, memory ceilings.
//!
//! The engine decides which pending task runs next under two constraints at
//! once: how urgent the task is, and whether the budget can pay for it right
//! now. Budgets are multi-dimensional token buckets that refill continuously,
//! so capacity trickles back instead of resetting at window boundaries.
//!
//! ## Core Problem Solved
//!
//! - **Priority vs. budget**: the most urgent task is not always affordable.
//!   Dispatch scans a small lookahead window and runs the first task that fits,
//!   so one expensive task cannot block cheap ones behind it.
//! - **Never overspend**: reservations debit every dimension of a cost or none
//!   of them, under the same lock that picks the task.
//! - **No starvation**: a task's score falls the longer it waits, with no
//!   floor, so old low-priority work eventually outranks fresh urgent work.
//!
//! ## Key Features
//!
//! - **Token-bucket budgets**: per-dimension capacity, continuous refill,
//!   replenishing quotas or occupancy ceilings
//! - **Composite scoring**: tier, cost, and age with tunable weights
//! - **Admission control**: fail fast when a task cannot be afforded, or queue it
//! - **Reconciliation**: bodies may report actual consumption; failures hand
//!   their reservation back
//! - **Background loops**: refill and dispatch on any runtime behind [`core::Spawn`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_budget_scheduler::builders::EngineBuilder;
//! use prometheus_budget_scheduler::config::DimensionConfig;
//! use prometheus_budget_scheduler::core::{AdmissionMode, Consumption};
//! use prometheus_budget_scheduler::runtime::TokioSpawner;
//! use prometheus_budget_scheduler::util::{CostVector, Priority};
//!
//! let engine = EngineBuilder::new("gateway")
//!     .dimension("api_calls", DimensionConfig::per_minute(60.0))
//!     .build()?;
//! engine.start_refill(&TokioSpawner::current()?);
//!
//! let handle = engine.schedule(
//!     Priority::Critical,
//!     CostVector::new().with("api_calls", 10.0),
//!     AdmissionMode::Enqueue,
//!     || async { Ok(Consumption::Reserved) },
//! )?;
//!
//! let outcome = engine.execute_next().await;
//! assert_eq!(outcome.executed().map(|t| t.id), Some(handle.id()));
//! ```
//!
//! For complete scenarios, see `tests/scheduler_engine_test.rs`.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and budget accounting.
pub mod core;
/// Configuration models for budgets, scoring, and dispatch.
pub mod config;
/// Builders to construct engines from configuration.
pub mod builders;
/// Infrastructure adapters for queue storage.
pub mod infra;
/// Runtime adapters for background loops.
pub mod runtime;
/// Shared utilities.
pub mod util;
