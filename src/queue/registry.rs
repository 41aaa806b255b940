//! Queue registry: named queues and their tick tasks
//!
//! Every queue gets its own interval task driving `tick`. The registry
//! owns those task handles and aborts them when the queue is deleted or
//! the service shuts down.

use crate::error::{MatchmakingError, Result};
use crate::queue::instance::{Queue, QueueSnapshot};
use crate::store::{QueueRecord, QueueStore};
use crate::strategy::StrategyRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct QueueEntry {
    queue: Arc<Queue>,
    ticker: JoinHandle<()>,
}

/// Named queues, each with a running tick task
pub struct QueueRegistry {
    queues: Mutex<HashMap<String, QueueEntry>>,
    strategies: Arc<StrategyRegistry>,
    store: Arc<dyn QueueStore>,
    tick_interval: Duration,
}

impl QueueRegistry {
    pub fn new(
        strategies: Arc<StrategyRegistry>,
        store: Arc<dyn QueueStore>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            strategies,
            store,
            tick_interval,
        }
    }

    fn spawn_ticker(&self, queue: Arc<Queue>) -> JoinHandle<()> {
        let interval = self.tick_interval;
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                queue.tick().await;
            }
        })
    }

    /// Rebuild every persisted queue. A record referencing a strategy that
    /// no longer exists, or one already bound to another queue, is fatal.
    pub async fn load(&self) -> Result<()> {
        let records = self.store.load().await?;

        let mut queues = self.queues.lock().await;
        for record in records {
            if queues
                .values()
                .any(|e| e.queue.strategy_name() == record.strategy_name)
            {
                return Err(MatchmakingError::StrategyInUse {
                    name: record.strategy_name.clone(),
                }
                .into());
            }
            let strategy = self
                .strategies
                .get(&record.strategy_name)
                .await
                .ok_or_else(|| MatchmakingError::StrategyNotFound {
                    name: record.strategy_name.clone(),
                })?;

            let queue = Arc::new(Queue::new(
                record.name.clone(),
                record.strategy_name.clone(),
                strategy,
            ));
            let ticker = self.spawn_ticker(queue.clone());
            queues.insert(record.name.clone(), QueueEntry { queue, ticker });
            info!(
                "Restored queue '{}' (strategy '{}')",
                record.name, record.strategy_name
            );
        }

        Ok(())
    }

    /// Create a queue bound to an existing strategy, start its tick task
    /// and persist the definition.
    ///
    /// A strategy instance carries a single pool, so it can serve at most
    /// one queue; binding it to a second queue is rejected.
    pub async fn create_queue(&self, name: &str, strategy_name: &str) -> Result<Arc<Queue>> {
        let mut queues = self.queues.lock().await;
        if queues.contains_key(name) {
            return Err(MatchmakingError::QueueAlreadyExists {
                name: name.to_string(),
            }
            .into());
        }
        if queues
            .values()
            .any(|e| e.queue.strategy_name() == strategy_name)
        {
            return Err(MatchmakingError::StrategyInUse {
                name: strategy_name.to_string(),
            }
            .into());
        }

        let strategy = self.strategies.get(strategy_name).await.ok_or_else(|| {
            MatchmakingError::StrategyNotFound {
                name: strategy_name.to_string(),
            }
        })?;

        let queue = Arc::new(Queue::new(
            name.to_string(),
            strategy_name.to_string(),
            strategy,
        ));
        let ticker = self.spawn_ticker(queue.clone());
        queues.insert(
            name.to_string(),
            QueueEntry {
                queue: queue.clone(),
                ticker,
            },
        );

        self.persist_locked(&queues).await?;
        info!("Created queue '{}' (strategy '{}')", name, strategy_name);

        Ok(queue)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Queue>> {
        self.queues.lock().await.get(name).map(|e| e.queue.clone())
    }

    /// Status of every queue, sorted by name
    pub async fn snapshots(&self) -> Vec<QueueSnapshot> {
        let queues = self.queues.lock().await;
        let mut snapshots = Vec::with_capacity(queues.len());
        for entry in queues.values() {
            snapshots.push(entry.queue.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Whether any queue runs the named strategy
    pub async fn references(&self, strategy_name: &str) -> bool {
        self.queues
            .lock()
            .await
            .values()
            .any(|e| e.queue.strategy_name() == strategy_name)
    }

    /// Stop ticking and drop the queue. Pooled teams are discarded; their
    /// listeners observe a closed channel.
    pub async fn delete_queue(&self, name: &str) -> Result<()> {
        let mut queues = self.queues.lock().await;
        let entry = queues.remove(name).ok_or_else(|| {
            MatchmakingError::QueueNotFound {
                name: name.to_string(),
            }
        })?;
        entry.ticker.abort();

        self.persist_locked(&queues).await?;
        info!("Deleted queue '{}'", name);

        Ok(())
    }

    async fn persist_locked(&self, queues: &HashMap<String, QueueEntry>) -> Result<()> {
        let mut records: Vec<QueueRecord> = queues
            .values()
            .map(|e| QueueRecord {
                name: e.queue.name().to_string(),
                strategy_name: e.queue.strategy_name().to_string(),
            })
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        self.store.save(&records).await
    }

    /// Abort every tick task and persist the definitions
    pub async fn shutdown(&self) -> Result<()> {
        let mut queues = self.queues.lock().await;
        self.persist_locked(&queues).await?;

        for (name, entry) in queues.drain() {
            entry.ticker.abort();
            debug!("Tick task for queue '{}' stopped", name);
        }

        Ok(())
    }
}
