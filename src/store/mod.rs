//! Persistence for strategy and queue definitions
//!
//! Definitions survive restarts as pretty-printed JSON files; the in-memory
//! implementations back tests. Stores only hold definitions, never pooled
//! teams: pools are rebuilt empty on startup.

pub mod queue_store;
pub mod strategy_store;

pub use queue_store::{JsonQueueStore, MemoryQueueStore, QueueRecord, QueueStore};
pub use strategy_store::{JsonStrategyStore, MemoryStrategyStore, StrategyStore};
