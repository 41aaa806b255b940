//! Matching strategies and their registry
//!
//! A strategy owns a pool of admitted teams and produces a [`MatchOutcome`]
//! when asked. Strategies are constructed once from a typed configuration
//! record and are otherwise mutated only through `add_team`, `remove_team`
//! and `evaluate`.

pub mod composition;
pub mod config;
pub mod pool;
pub mod range_expansion;
pub mod registry;
pub mod scorer;
pub mod similarity;

pub use composition::CompositionStrategy;
pub use config::StrategyConfig;
pub use pool::TeamPool;
pub use range_expansion::RangeExpansionStrategy;
pub use registry::{
    CompositionCreator, ExternalScorerCreator, RangeExpansionCreator, SharedStrategy,
    SimilaritySearchCreator, StrategyCreator, StrategyRegistry,
};
pub use scorer::ExternalScorerStrategy;
pub use similarity::SimilaritySearchStrategy;

use crate::error::Result;
use crate::types::{MatchOutcome, Team, TeamId};
use async_trait::async_trait;

/// Contract implemented by every matching strategy
#[async_trait]
pub trait Strategy: Send {
    /// Strategy type tag (matches the configuration tag)
    fn kind(&self) -> &'static str;

    /// Instance name, unique within the strategy registry
    fn name(&self) -> &str;

    /// The configuration record this instance was constructed from
    fn config(&self) -> StrategyConfig;

    /// Validate the team against this strategy's requirements and insert it
    /// into the pool. Never partially applies.
    async fn add_team(&mut self, team: Team) -> Result<()>;

    /// Remove a team from the pool. Removing an unknown team is an error.
    async fn remove_team(&mut self, team_id: TeamId) -> Result<()>;

    /// Attempt to assemble a match from the pooled teams.
    ///
    /// Matched teams are not removed here; the queue removes them after
    /// notifying listeners so that notification-then-removal is atomic from
    /// the queue's perspective.
    async fn evaluate(&mut self) -> MatchOutcome;

    /// Release external resources (bus subscriptions, index entries).
    /// Must be safe to call more than once.
    async fn shutdown(&mut self);
}

impl std::fmt::Debug for dyn Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
