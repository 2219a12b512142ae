//! Shared utilities.

/// Time sources.
pub mod clock;
/// Serializable value types (priorities, costs, ids).
pub mod serde;
/// Tracing bootstrap.
pub mod telemetry;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::serde::{CostVector, Priority, TaskId};
pub use self::telemetry::init_tracing;
