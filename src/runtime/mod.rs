//! Runtime adapters for background loops.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
