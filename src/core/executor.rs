//! Task body abstraction and consumption reporting.

use std::future::Future;

use async_trait::async_trait;

use super::AppResult;
use crate::util::serde::CostVector;

/// What a finished task body reports about its resource use.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Consumption {
    /// The whole reservation counts as spent.
    #[default]
    Reserved,
    /// Only this much was spent; the rest of the reservation is credited back.
    /// Amounts above the reservation are clamped to it.
    Actual(CostVector),
}

/// Opaque unit of work executed once the engine admits and funds it.
///
/// Closures returning a future implement this trait, so most callers never
/// name it:
///
/// ```rust,ignore
/// engine.schedule(Priority::Normal, cost, AdmissionMode::Enqueue, || async {
///     call_external_api().await?;
///     Ok(Consumption::Reserved)
/// })?;
/// ```
///
/// Returning an error marks the task `Failed` and credits the reservation
/// back, unless the error carries [`PartiallyConsumed`](super::PartiallyConsumed).
#[async_trait]
pub trait TaskBody: Send + 'static {
    /// Run the task to completion.
    async fn run(self: Box<Self>) -> AppResult<Consumption>;
}

#[async_trait]
impl<F, Fut> TaskBody for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<Consumption>> + Send + 'static,
{
    async fn run(self: Box<Self>) -> AppResult<Consumption> {
        (*self)().await
    }
}

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Spawn a future that runs to completion on its own.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
