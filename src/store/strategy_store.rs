//! Strategy definition persistence

use crate::error::{MatchmakingError, Result};
use crate::strategy::StrategyConfig;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Durable home for strategy definitions
#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Load every persisted definition
    async fn load(&self) -> Result<Vec<StrategyConfig>>;

    /// Replace the persisted set with the given definitions
    async fn save(&self, configs: &[StrategyConfig]) -> Result<()>;
}

/// File-backed store holding a single JSON array of definitions
pub struct JsonStrategyStore {
    path: PathBuf,
}

impl JsonStrategyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StrategyStore for JsonStrategyStore {
    async fn load(&self) -> Result<Vec<StrategyConfig>> {
        if !self.path.exists() {
            info!(
                "No strategy store at {}, starting empty",
                self.path.display()
            );
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            }
        })?;

        let configs: Vec<StrategyConfig> = serde_json::from_str(&raw).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Corrupt strategy store {}: {}", self.path.display(), e),
            }
        })?;

        info!(
            "Loaded {} strategy definitions from {}",
            configs.len(),
            self.path.display()
        );
        Ok(configs)
    }

    async fn save(&self, configs: &[StrategyConfig]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MatchmakingError::InternalError {
                    message: format!("Failed to create {}: {}", parent.display(), e),
                }
            })?;
        }

        let raw = serde_json::to_string_pretty(configs)?;
        tokio::fs::write(&self.path, raw).await.map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to write {}: {}", self.path.display(), e),
            }
            .into()
        })
    }
}

/// In-memory store for tests
#[derive(Default)]
pub struct MemoryStrategyStore {
    configs: Mutex<Vec<StrategyConfig>>,
}

impl MemoryStrategyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configs(configs: Vec<StrategyConfig>) -> Self {
        Self {
            configs: Mutex::new(configs),
        }
    }
}

#[async_trait]
impl StrategyStore for MemoryStrategyStore {
    async fn load(&self) -> Result<Vec<StrategyConfig>> {
        Ok(self
            .configs
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    async fn save(&self, configs: &[StrategyConfig]) -> Result<()> {
        if let Ok(mut stored) = self.configs.lock() {
            *stored = configs.to_vec();
        }
        Ok(())
    }
}
