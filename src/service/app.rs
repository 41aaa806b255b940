//! Main application state and service coordination
//!
//! AppState wires stores, registries and the optional AMQP scorer
//! transport together, and exposes the operations the transport layer
//! calls: join, leave, and definition management.

use crate::amqp::connection::{AmqpConfig, AmqpConnection};
use crate::amqp::scorer_client::{AmqpScorerClient, ScorerClient};
use crate::config::AppConfig;
use crate::error::{MatchmakingError, Result};
use crate::game::{GameProvider, GameResult, PseudoGameProvider};
use crate::index::InMemoryVectorIndex;
use crate::queue::{QueueRegistry, QueueSnapshot};
use crate::store::{JsonQueueStore, JsonStrategyStore};
use crate::strategy::{
    CompositionCreator, ExternalScorerCreator, RangeExpansionCreator, SimilaritySearchCreator,
    StrategyConfig, StrategyRegistry,
};
use crate::types::{MatchGroups, Team, TeamId, TeamRequest};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{error, info, warn};

/// Coordinates every component of the matchmaking service
pub struct AppState {
    config: AppConfig,
    amqp: Mutex<Option<AmqpConnection>>,
    scorer_client: Option<Arc<AmqpScorerClient>>,
    strategies: Arc<StrategyRegistry>,
    queues: Arc<QueueRegistry>,
    game_provider: Arc<dyn GameProvider>,
    running: RwLock<bool>,
}

impl AppState {
    /// Wire up stores, registries and creators. Connects to the AMQP broker
    /// only when the scorer transport is enabled.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let data_dir = Path::new(&config.matchmaking.data_dir);
        let strategy_store = Arc::new(JsonStrategyStore::new(data_dir.join("strategies.json")));
        let queue_store = Arc::new(JsonQueueStore::new(data_dir.join("queues.json")));

        let mut strategies = StrategyRegistry::new(strategy_store);
        strategies.register_creator(Box::new(CompositionCreator));
        strategies.register_creator(Box::new(RangeExpansionCreator));
        strategies.register_creator(Box::new(SimilaritySearchCreator::new(Arc::new(
            InMemoryVectorIndex::new(),
        ))));

        let (amqp, scorer_client) = if config.amqp.enabled {
            let connection = AmqpConnection::new(AmqpConfig {
                host: config.amqp.host.clone(),
                port: config.amqp.port,
                username: config.amqp.username.clone(),
                password: config.amqp.password.clone(),
                vhost: config.amqp.vhost.clone(),
                max_retries: config.amqp.max_retry_attempts,
                retry_delay_ms: config.amqp.retry_delay_ms,
            })
            .await?;

            let channel = connection.open_channel().await?;
            let client = Arc::new(AmqpScorerClient::new(channel).await?);
            strategies.register_creator(Box::new(ExternalScorerCreator::new(
                client.clone(),
                config.scorer_reply_timeout(),
            )));

            (Some(connection), Some(client))
        } else {
            info!("AMQP disabled; external-scorer strategies are unavailable");
            (None, None)
        };

        let strategies = Arc::new(strategies);
        let queues = Arc::new(QueueRegistry::new(
            strategies.clone(),
            queue_store,
            config.tick_interval(),
        ));

        Ok(Self {
            config,
            amqp: Mutex::new(amqp),
            scorer_client,
            strategies,
            queues,
            game_provider: Arc::new(PseudoGameProvider::new()),
            running: RwLock::new(false),
        })
    }

    /// Restore persisted definitions and start ticking. A definition that
    /// cannot be restored aborts startup.
    pub async fn start(&self) -> Result<()> {
        self.strategies.load().await?;
        self.queues.load().await?;

        *self.running.write().await = true;
        info!("Matchmaking service started");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn strategies(&self) -> &Arc<StrategyRegistry> {
        &self.strategies
    }

    pub fn queues(&self) -> &Arc<QueueRegistry> {
        &self.queues
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Create a strategy definition
    pub async fn create_strategy(&self, config: StrategyConfig) -> Result<()> {
        self.strategies.create_strategy(config).await.map(|_| ())
    }

    /// Delete a strategy definition; rejected while a queue references it
    pub async fn delete_strategy(&self, name: &str) -> Result<()> {
        if self.queues.references(name).await {
            return Err(MatchmakingError::StrategyInUse {
                name: name.to_string(),
            }
            .into());
        }
        self.strategies.delete_strategy(name).await
    }

    /// Admit a team into a queue. The returned receiver resolves with the
    /// match groups once the queue's strategy assembles a match.
    pub async fn join_queue(
        &self,
        queue_name: &str,
        request: TeamRequest,
        origin_token: String,
    ) -> Result<(TeamId, oneshot::Receiver<MatchGroups>)> {
        if request.players.is_empty() {
            return Err(MatchmakingError::InvalidTeam {
                reason: "a team needs at least one player".to_string(),
            }
            .into());
        }

        let queue = self.queues.get(queue_name).await.ok_or_else(|| {
            MatchmakingError::QueueNotFound {
                name: queue_name.to_string(),
            }
        })?;

        let team = Team::from_request(request, origin_token);
        let team_id = team.id;
        let receiver = queue.admit(team).await?;
        Ok((team_id, receiver))
    }

    /// Withdraw a still-waiting team from a queue
    pub async fn leave_queue(&self, queue_name: &str, team_id: TeamId) -> Result<Team> {
        let queue = self.queues.get(queue_name).await.ok_or_else(|| {
            MatchmakingError::QueueNotFound {
                name: queue_name.to_string(),
            }
        })?;
        queue.withdraw(team_id).await
    }

    /// Wait on a join receiver and allocate a game server for the result
    pub async fn await_game(
        &self,
        receiver: oneshot::Receiver<MatchGroups>,
    ) -> Result<GameResult> {
        let groups = receiver.await.map_err(|_| {
            MatchmakingError::InternalError {
                message: "queue was deleted before a match was found".to_string(),
            }
        })?;

        let server = self.game_provider.get_server(&groups).await?;
        Ok(GameResult { groups, server })
    }

    /// Status of every queue
    pub async fn queue_snapshots(&self) -> Vec<QueueSnapshot> {
        self.queues.snapshots().await
    }

    /// Stop ticking, persist definitions, shut strategies down, stop the
    /// shared reply consumer and close the broker connection, in that order.
    pub async fn shutdown(&self) -> Result<()> {
        *self.running.write().await = false;

        if let Err(e) = self.queues.shutdown().await {
            error!("Failed to shut down queue registry: {:#}", e);
        }
        if let Err(e) = self.strategies.shutdown().await {
            error!("Failed to shut down strategy registry: {:#}", e);
        }

        // One consumer serves every scorer strategy, so it outlives them all
        if let Some(client) = &self.scorer_client {
            if let Err(e) = client.shutdown().await {
                warn!("Failed to stop scorer reply consumer: {:#}", e);
            }
        }

        if let Some(connection) = self.amqp.lock().await.take() {
            if let Err(e) = connection.close().await {
                warn!("Failed to close AMQP connection: {:#}", e);
            }
        }

        info!("Matchmaking service stopped");
        Ok(())
    }
}
