//! External similarity index contract
//!
//! The similarity-search strategy keeps feature vectors in an external
//! index and only queries nearest neighbors from it. The in-memory
//! implementation backs tests and single-node deployments; a pgvector-style
//! implementation would sit behind the same trait.

use crate::error::{MatchmakingError, Result};
use crate::types::TeamId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Nearest-neighbor index keyed by team id
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace a team's feature vector
    async fn upsert(&self, team_id: TeamId, vector: Vec<f64>) -> Result<()>;

    /// Remove a team's entry
    async fn delete(&self, team_id: TeamId) -> Result<()>;

    /// The `k` entries nearest to the seed team's vector, nearest first,
    /// including the seed itself
    async fn nearest(&self, seed: TeamId, k: usize) -> Result<Vec<TeamId>>;
}

/// In-memory L2-distance index
#[derive(Default)]
pub struct InMemoryVectorIndex {
    vectors: Mutex<HashMap<TeamId, Vec<f64>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, team_id: TeamId, vector: Vec<f64>) -> Result<()> {
        let mut vectors = self.vectors.lock().map_err(|_| {
            MatchmakingError::InternalError {
                message: "vector index lock poisoned".to_string(),
            }
        })?;
        vectors.insert(team_id, vector);
        Ok(())
    }

    async fn delete(&self, team_id: TeamId) -> Result<()> {
        let mut vectors = self.vectors.lock().map_err(|_| {
            MatchmakingError::InternalError {
                message: "vector index lock poisoned".to_string(),
            }
        })?;
        vectors.remove(&team_id);
        Ok(())
    }

    async fn nearest(&self, seed: TeamId, k: usize) -> Result<Vec<TeamId>> {
        let vectors = self.vectors.lock().map_err(|_| {
            MatchmakingError::InternalError {
                message: "vector index lock poisoned".to_string(),
            }
        })?;

        let seed_vector = vectors.get(&seed).ok_or_else(|| {
            MatchmakingError::IndexFailure {
                reason: format!("seed team {} not in index", seed),
            }
        })?;

        let mut scored: Vec<(TeamId, f64)> = vectors
            .iter()
            .map(|(id, vector)| (*id, squared_distance(seed_vector, vector)))
            .collect();

        // Distance, then id, so equal distances order deterministically
        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        Ok(scored.into_iter().take(k).map(|(id, _)| id).collect())
    }
}
