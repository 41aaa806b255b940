//! Strategy registry: named instances plus pluggable creators
//!
//! The registry owns every strategy instance. Queues hold `SharedStrategy`
//! clones, so a strategy that is still referenced by a queue cannot be
//! deleted out from under it. New strategy kinds plug in as creators; the
//! four built-in kinds register at wiring time.

use crate::error::{MatchmakingError, Result};
use crate::index::VectorIndex;
use crate::strategy::config::{
    StrategyConfig, COMPOSITION, EXTERNAL_SCORER, RANGE_EXPANSION, SIMILARITY_SEARCH,
};
use crate::strategy::{
    CompositionStrategy, ExternalScorerStrategy, RangeExpansionStrategy,
    SimilaritySearchStrategy, Strategy,
};
use crate::amqp::scorer_client::ScorerClient;
use crate::store::StrategyStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Handle held by queues; the registry keeps one reference of its own
pub type SharedStrategy = Arc<Mutex<Box<dyn Strategy>>>;

/// Constructs strategy instances of one kind from their configuration
#[async_trait]
pub trait StrategyCreator: Send + Sync {
    /// The configuration tag this creator handles
    fn kind(&self) -> &'static str;

    async fn create(&self, config: &StrategyConfig) -> Result<Box<dyn Strategy>>;
}

/// Named strategy instances and the creators that build them
pub struct StrategyRegistry {
    creators: HashMap<&'static str, Box<dyn StrategyCreator>>,
    strategies: Mutex<HashMap<String, SharedStrategy>>,
    store: Arc<dyn StrategyStore>,
}

impl StrategyRegistry {
    pub fn new(store: Arc<dyn StrategyStore>) -> Self {
        Self {
            creators: HashMap::new(),
            strategies: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// Register a creator for a strategy kind. Creators are wired before the
    /// registry is shared, so this takes `&mut self`.
    pub fn register_creator(&mut self, creator: Box<dyn StrategyCreator>) {
        let kind = creator.kind();
        if self.creators.insert(kind, creator).is_some() {
            warn!("Replaced creator for strategy kind '{}'", kind);
        }
    }

    fn creator_for(&self, kind: &str) -> Result<&dyn StrategyCreator> {
        self.creators
            .get(kind)
            .map(|c| c.as_ref())
            .ok_or_else(|| {
                MatchmakingError::UnknownStrategyType {
                    kind: kind.to_string(),
                }
                .into()
            })
    }

    /// Rebuild every persisted strategy. A definition that can no longer be
    /// constructed is fatal: silently dropping it would orphan the queues
    /// that reference it.
    pub async fn load(&self) -> Result<()> {
        let configs = self.store.load().await?;

        let mut strategies = self.strategies.lock().await;
        for config in configs {
            let name = config.name().to_string();
            let strategy = self.creator_for(config.kind())?.create(&config).await?;
            strategies.insert(name.clone(), Arc::new(Mutex::new(strategy)));
            info!("Restored strategy '{}' ({})", name, config.kind());
        }

        Ok(())
    }

    /// Construct, register and persist a new strategy
    pub async fn create_strategy(&self, config: StrategyConfig) -> Result<SharedStrategy> {
        let name = config.name().to_string();

        let mut strategies = self.strategies.lock().await;
        if strategies.contains_key(&name) {
            return Err(MatchmakingError::StrategyAlreadyExists { name }.into());
        }

        let strategy = self.creator_for(config.kind())?.create(&config).await?;
        let shared: SharedStrategy = Arc::new(Mutex::new(strategy));
        strategies.insert(name.clone(), shared.clone());

        self.persist_locked(&strategies).await?;
        info!("Created strategy '{}' ({})", name, config.kind());

        Ok(shared)
    }

    pub async fn get(&self, name: &str) -> Option<SharedStrategy> {
        self.strategies.lock().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.strategies.lock().await.contains_key(name)
    }

    /// Configurations of every registered strategy
    pub async fn configs(&self) -> Vec<StrategyConfig> {
        let strategies = self.strategies.lock().await;
        let mut configs = Vec::with_capacity(strategies.len());
        for strategy in strategies.values() {
            configs.push(strategy.lock().await.config());
        }
        configs.sort_by(|a, b| a.name().cmp(b.name()));
        configs
    }

    /// Delete a strategy. Rejected while any queue still holds a reference.
    pub async fn delete_strategy(&self, name: &str) -> Result<()> {
        let mut strategies = self.strategies.lock().await;

        let shared = strategies.get(name).ok_or_else(|| {
            MatchmakingError::StrategyNotFound {
                name: name.to_string(),
            }
        })?;

        // The map holds one reference; anything beyond that is a queue
        if Arc::strong_count(shared) > 1 {
            return Err(MatchmakingError::StrategyInUse {
                name: name.to_string(),
            }
            .into());
        }

        let shared = strategies.remove(name).unwrap();
        shared.lock().await.shutdown().await;

        self.persist_locked(&strategies).await?;
        info!("Deleted strategy '{}'", name);

        Ok(())
    }

    /// Persist the current definitions
    pub async fn persist(&self) -> Result<()> {
        let strategies = self.strategies.lock().await;
        self.persist_locked(&strategies).await
    }

    async fn persist_locked(&self, strategies: &HashMap<String, SharedStrategy>) -> Result<()> {
        let mut configs = Vec::with_capacity(strategies.len());
        for strategy in strategies.values() {
            configs.push(strategy.lock().await.config());
        }
        configs.sort_by(|a, b| a.name().cmp(b.name()));
        self.store.save(&configs).await
    }

    /// Persist definitions, then shut every strategy down
    pub async fn shutdown(&self) -> Result<()> {
        let strategies = self.strategies.lock().await;
        self.persist_locked(&strategies).await?;

        for (name, strategy) in strategies.iter() {
            strategy.lock().await.shutdown().await;
            info!("Strategy '{}' shut down", name);
        }

        Ok(())
    }
}

/// Creator for the composition kind
pub struct CompositionCreator;

#[async_trait]
impl StrategyCreator for CompositionCreator {
    fn kind(&self) -> &'static str {
        COMPOSITION
    }

    async fn create(&self, config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
        match config {
            StrategyConfig::Composition {
                name,
                target_team_size,
                min_team_size,
                max_team_size,
                number_of_teams,
            } => {
                if *target_team_size == 0 || *number_of_teams == 0 {
                    return Err(MatchmakingError::ConfigurationError {
                        message: "targetTeamSize and numberOfTeams must be positive".to_string(),
                    }
                    .into());
                }
                if *min_team_size == 0 || min_team_size > max_team_size {
                    return Err(MatchmakingError::ConfigurationError {
                        message: "party size bounds must satisfy 1 <= min <= max".to_string(),
                    }
                    .into());
                }

                Ok(Box::new(CompositionStrategy::new(
                    name.clone(),
                    *target_team_size,
                    *min_team_size,
                    *max_team_size,
                    *number_of_teams,
                )))
            }
            other => Err(mismatched_kind(COMPOSITION, other)),
        }
    }
}

/// Creator for the range-expansion kind
pub struct RangeExpansionCreator;

#[async_trait]
impl StrategyCreator for RangeExpansionCreator {
    fn kind(&self) -> &'static str {
        RANGE_EXPANSION
    }

    async fn create(&self, config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
        match config {
            StrategyConfig::RangeExpansion {
                name,
                range_expansion_amount,
                range_expansion_time,
            } => {
                if *range_expansion_amount < 0.0 {
                    return Err(MatchmakingError::ConfigurationError {
                        message: "rangeExpansionAmount must not be negative".to_string(),
                    }
                    .into());
                }

                Ok(Box::new(RangeExpansionStrategy::new(
                    name.clone(),
                    *range_expansion_amount,
                    *range_expansion_time,
                )))
            }
            other => Err(mismatched_kind(RANGE_EXPANSION, other)),
        }
    }
}

/// Creator for the external-scorer kind; every instance shares one client
pub struct ExternalScorerCreator {
    client: Arc<dyn ScorerClient>,
    reply_timeout: Duration,
}

impl ExternalScorerCreator {
    pub fn new(client: Arc<dyn ScorerClient>, reply_timeout: Duration) -> Self {
        Self {
            client,
            reply_timeout,
        }
    }
}

#[async_trait]
impl StrategyCreator for ExternalScorerCreator {
    fn kind(&self) -> &'static str {
        EXTERNAL_SCORER
    }

    async fn create(&self, config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
        match config {
            StrategyConfig::ExternalScorer {
                name,
                batch_size,
                features,
            } => {
                if *batch_size == 0 {
                    return Err(MatchmakingError::ConfigurationError {
                        message: "batchSize must be positive".to_string(),
                    }
                    .into());
                }

                Ok(Box::new(ExternalScorerStrategy::with_timeout(
                    name.clone(),
                    *batch_size,
                    features.clone(),
                    self.client.clone(),
                    self.reply_timeout,
                )))
            }
            other => Err(mismatched_kind(EXTERNAL_SCORER, other)),
        }
    }
}

/// Creator for the similarity-search kind
pub struct SimilaritySearchCreator {
    index: Arc<dyn VectorIndex>,
}

impl SimilaritySearchCreator {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl StrategyCreator for SimilaritySearchCreator {
    fn kind(&self) -> &'static str {
        SIMILARITY_SEARCH
    }

    async fn create(&self, config: &StrategyConfig) -> Result<Box<dyn Strategy>> {
        match config {
            StrategyConfig::SimilaritySearch {
                name,
                min_pool_size,
                team_size,
                number_of_teams,
                required_statistics,
            } => {
                if *team_size == 0 || *number_of_teams == 0 {
                    return Err(MatchmakingError::ConfigurationError {
                        message: "teamSize and numberOfTeams must be positive".to_string(),
                    }
                    .into());
                }
                if required_statistics.is_empty() {
                    return Err(MatchmakingError::ConfigurationError {
                        message: "requiredStatistics must not be empty".to_string(),
                    }
                    .into());
                }

                Ok(Box::new(SimilaritySearchStrategy::new(
                    name.clone(),
                    *min_pool_size,
                    *team_size,
                    *number_of_teams,
                    required_statistics.clone(),
                    self.index.clone(),
                )))
            }
            other => Err(mismatched_kind(SIMILARITY_SEARCH, other)),
        }
    }
}

fn mismatched_kind(expected: &str, got: &StrategyConfig) -> anyhow::Error {
    MatchmakingError::InternalError {
        message: format!(
            "creator for '{}' received a '{}' configuration",
            expected,
            got.kind()
        ),
    }
    .into()
}
