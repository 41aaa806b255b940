//! Rally Point - pluggable matchmaking service
//!
//! This crate provides queue-based matchmaking with pluggable matching
//! strategies, persistent strategy and queue definitions, and an AMQP
//! bridge to external scoring services.

pub mod amqp;
pub mod config;
pub mod error;
pub mod game;
pub mod index;
pub mod queue;
pub mod service;
pub mod store;
pub mod strategy;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use queue::{Queue, QueueRegistry};
pub use strategy::{Strategy, StrategyConfig, StrategyRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
