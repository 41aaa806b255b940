//! Service coordination and status endpoints

pub mod app;
pub mod health;

pub use app::AppState;
pub use health::{HealthServer, HealthServerConfig};
