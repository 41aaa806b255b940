//! Queue definition persistence
//!
//! A queue definition is just a name and the name of the strategy it runs;
//! the strategy itself is persisted by the strategy store.

use crate::error::{MatchmakingError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// Persisted shape of a queue definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub name: String,
    pub strategy_name: String,
}

/// Durable home for queue definitions
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn load(&self) -> Result<Vec<QueueRecord>>;
    async fn save(&self, records: &[QueueRecord]) -> Result<()>;
}

/// File-backed store holding a single JSON array of records
pub struct JsonQueueStore {
    path: PathBuf,
}

impl JsonQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QueueStore for JsonQueueStore {
    async fn load(&self) -> Result<Vec<QueueRecord>> {
        if !self.path.exists() {
            info!("No queue store at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            }
        })?;

        let records: Vec<QueueRecord> = serde_json::from_str(&raw).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Corrupt queue store {}: {}", self.path.display(), e),
            }
        })?;

        info!(
            "Loaded {} queue definitions from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }

    async fn save(&self, records: &[QueueRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                MatchmakingError::InternalError {
                    message: format!("Failed to create {}: {}", parent.display(), e),
                }
            })?;
        }

        let raw = serde_json::to_string_pretty(records)?;
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
pub struct MemoryQueueStore {
    records: Mutex<Vec<QueueRecord>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<QueueRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> Result<Vec<QueueRecord>> {
        Ok(self
            .records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    async fn save(&self, records: &[QueueRecord]) -> Result<()> {
        if let Ok(mut stored) = self.records.lock() {
            *stored = records.to_vec();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_record_wire_shape() {
        let record = QueueRecord {
            name: "casual".to_string(),
            strategy_name: "flex-5s".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["name"], "casual");
        assert_eq!(json["strategyName"], "flex-5s");
    }

    #[tokio::test]
    async fn test_json_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("rally-point-{}", uuid::Uuid::new_v4()));
        let store = JsonQueueStore::new(dir.join("queues.json"));

        assert!(store.load().await.unwrap().is_empty());

        let records = vec![QueueRecord {
            name: "casual".to_string(),
            strategy_name: "flex-5s".to_string(),
        }];
        store.save(&records).await.unwrap();
        assert_eq!(store.load().await.unwrap(), records);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
