//! Similarity-search strategy: nearest neighbors via an external index
//!
//! The earliest-joined team seeds a nearest-neighbor query against an
//! external vector index; the seed plus its closest peers become the match,
//! one team per group. Vectors are maintained on admission and withdrawal,
//! so evaluation only ever queries.

use crate::error::{MatchmakingError, Result};
use crate::index::VectorIndex;
use crate::strategy::config::{StrategyConfig, SIMILARITY_SEARCH};
use crate::strategy::pool::TeamPool;
use crate::strategy::Strategy;
use crate::types::{MatchOutcome, Team, TeamId};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Selects the earliest-joined team and its nearest neighbors by feature
/// distance
pub struct SimilaritySearchStrategy {
    name: String,
    min_pool_size: usize,
    team_size: usize,
    number_of_teams: usize,
    required_statistics: Vec<String>,
    index: Arc<dyn VectorIndex>,
    pool: TeamPool,
}

impl SimilaritySearchStrategy {
    pub fn new(
        name: String,
        min_pool_size: usize,
        team_size: usize,
        number_of_teams: usize,
        required_statistics: Vec<String>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            name,
            min_pool_size,
            team_size,
            number_of_teams,
            required_statistics,
            index,
            pool: TeamPool::new(),
        }
    }

    /// Project the required statistics into a fixed-order vector
    fn vector_for(&self, team: &Team) -> Result<Vec<f64>> {
        self.required_statistics
            .iter()
            .map(|name| {
                team.attribute_f64(name).ok_or_else(|| {
                    MatchmakingError::InvalidTeam {
                        reason: format!("missing numeric '{}' statistic", name),
                    }
                    .into()
                })
            })
            .collect()
    }
}

#[async_trait]
impl Strategy for SimilaritySearchStrategy {
    fn kind(&self) -> &'static str {
        SIMILARITY_SEARCH
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> StrategyConfig {
        StrategyConfig::SimilaritySearch {
            name: self.name.clone(),
            min_pool_size: self.min_pool_size,
            team_size: self.team_size,
            number_of_teams: self.number_of_teams,
            required_statistics: self.required_statistics.clone(),
        }
    }

    async fn add_team(&mut self, team: Team) -> Result<()> {
        if team.size() != self.team_size {
            return Err(MatchmakingError::InvalidTeam {
                reason: format!("party size must be exactly {}", self.team_size),
            }
            .into());
        }

        let vector = self.vector_for(&team)?;
        let team_id = team.id;

        self.pool.insert(team)?;

        // Roll back the pool insert if the upsert fails so pool and index
        // never diverge.
        if let Err(e) = self.index.upsert(team_id, vector).await {
            let _ = self.pool.remove(team_id);
            return Err(e);
        }

        Ok(())
    }

    async fn remove_team(&mut self, team_id: TeamId) -> Result<()> {
        self.pool.remove(team_id)?;

        if let Err(e) = self.index.delete(team_id).await {
            warn!(
                "Failed to delete team {} from vector index: {}",
                team_id, e
            );
        }
        Ok(())
    }

    async fn evaluate(&mut self) -> MatchOutcome {
        let floor = self.min_pool_size.max(self.number_of_teams);
        if self.pool.len() < floor {
            return MatchOutcome::NotYet;
        }

        let seed = match self.pool.earliest() {
            Some(team) => team.id,
            None => return MatchOutcome::NotYet,
        };

        let neighbor_ids = match self.index.nearest(seed, self.number_of_teams).await {
            Ok(ids) => ids,
            Err(cause) => return MatchOutcome::Failed { cause },
        };

        if neighbor_ids.len() < self.number_of_teams {
            return MatchOutcome::failed(MatchmakingError::IndexFailure {
                reason: format!(
                    "index returned {} of {} requested teams",
                    neighbor_ids.len(),
                    self.number_of_teams
                ),
            });
        }

        let mut groups = Vec::with_capacity(neighbor_ids.len());
        for id in neighbor_ids {
            match self.pool.get(&id) {
                Some(team) => groups.push(vec![team.clone()]),
                None => {
                    return MatchOutcome::failed(MatchmakingError::IndexFailure {
                        reason: format!("index returned team {} that is not pooled", id),
                    });
                }
            }
        }

        MatchOutcome::Matched { groups }
    }

    async fn shutdown(&mut self) {}
}
