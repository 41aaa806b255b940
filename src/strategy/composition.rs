//! Composition strategy: flexible team sizing
//!
//! Teams of varying party sizes are assembled into a fixed number of
//! match-groups, each summing exactly to the target team size, without ever
//! splitting a party. The set of valid group compositions (integer
//! partitions of the target size) is precomputed at construction.

use crate::error::{MatchmakingError, Result};
use crate::strategy::config::{StrategyConfig, COMPOSITION};
use crate::strategy::pool::TeamPool;
use crate::strategy::Strategy;
use crate::types::{MatchOutcome, Team, TeamId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// All partitions of `target` into positive integer parts.
///
/// Iterative backtracking with an explicit stack, branching over
/// non-decreasing next parts so each partition is enumerated exactly once.
/// The returned order is deterministic and is the order `evaluate` searches
/// in (first satisfiable partition wins).
pub fn partitions_of(target: usize) -> Vec<Vec<usize>> {
    struct Frame {
        remaining: usize,
        parts: Vec<usize>,
        min_next: usize,
    }

    let mut result = Vec::new();
    let mut stack = vec![Frame {
        remaining: target,
        parts: Vec::new(),
        min_next: 1,
    }];

    while let Some(frame) = stack.pop() {
        if frame.remaining == 0 {
            result.push(frame.parts);
            continue;
        }

        for next in frame.min_next..=frame.remaining {
            let mut parts = frame.parts.clone();
            parts.push(next);
            stack.push(Frame {
                remaining: frame.remaining - next,
                parts,
                min_next: next,
            });
        }
    }

    result
}

/// Matches teams of mixed party sizes into groups of exactly the target size
pub struct CompositionStrategy {
    name: String,
    target_team_size: usize,
    min_team_size: usize,
    max_team_size: usize,
    number_of_teams: usize,
    partitions: Vec<Vec<usize>>,
    pool: TeamPool,
}

impl CompositionStrategy {
    pub fn new(
        name: String,
        target_team_size: usize,
        min_team_size: usize,
        max_team_size: usize,
        number_of_teams: usize,
    ) -> Self {
        let partitions = partitions_of(target_team_size);
        debug!(
            "Composition strategy '{}' precomputed {} partitions of {}",
            name,
            partitions.len(),
            target_team_size
        );

        Self {
            name,
            target_team_size,
            min_team_size,
            max_team_size,
            number_of_teams,
            partitions,
            pool: TeamPool::new(),
        }
    }

    /// First partition (in precomputed order) whose required part sizes are
    /// all available in the remaining per-size queues
    fn pick_partition(&self, by_size: &HashMap<usize, VecDeque<&Team>>) -> Option<&Vec<usize>> {
        self.partitions.iter().find(|parts| {
            let mut needed: HashMap<usize, usize> = HashMap::new();
            for &size in parts.iter() {
                *needed.entry(size).or_insert(0) += 1;
            }
            needed
                .iter()
                .all(|(size, count)| by_size.get(size).map_or(false, |q| q.len() >= *count))
        })
    }
}

#[async_trait]
impl Strategy for CompositionStrategy {
    fn kind(&self) -> &'static str {
        COMPOSITION
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> StrategyConfig {
        StrategyConfig::Composition {
            name: self.name.clone(),
            target_team_size: self.target_team_size,
            min_team_size: self.min_team_size,
            max_team_size: self.max_team_size,
            number_of_teams: self.number_of_teams,
        }
    }

    async fn add_team(&mut self, team: Team) -> Result<()> {
        let size = team.size();
        if size < self.min_team_size || size > self.max_team_size {
            return Err(MatchmakingError::InvalidTeam {
                reason: format!(
                    "party size {} outside allowed range {}..={}",
                    size, self.min_team_size, self.max_team_size
                ),
            }
            .into());
        }

        self.pool.insert(team)
    }

    async fn remove_team(&mut self, team_id: TeamId) -> Result<()> {
        self.pool.remove(team_id).map(|_| ())
    }

    /// Never fails: any inability to assemble the groups is `NotYet`.
    async fn evaluate(&mut self) -> MatchOutcome {
        let required = self.target_team_size * self.number_of_teams;
        if self.pool.total_players() < required {
            return MatchOutcome::NotYet;
        }

        // Per-size FIFO queues, oldest-joined first
        let mut by_size: HashMap<usize, VecDeque<&Team>> = HashMap::new();
        for team in self.pool.iter() {
            by_size.entry(team.size()).or_default().push_back(team);
        }

        // Build groups against the queues; nothing is committed to the pool,
        // so abandoning mid-way leaves it untouched.
        let mut groups = Vec::with_capacity(self.number_of_teams);
        for _ in 0..self.number_of_teams {
            let parts = match self.pick_partition(&by_size) {
                Some(parts) => parts.clone(),
                None => return MatchOutcome::NotYet,
            };

            let mut group = Vec::with_capacity(parts.len());
            for size in parts {
                // pick_partition guarantees availability
                if let Some(team) = by_size.get_mut(&size).and_then(VecDeque::pop_front) {
                    group.push(team.clone());
                }
            }
            groups.push(group);
        }

        MatchOutcome::Matched { groups }
    }

    async fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;
    use proptest::prelude::*;
    use serde_json::Map;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn team_of_size(size: usize) -> Team {
        Team {
            id: Uuid::new_v4(),
            player_ids: (0..size).map(|_| Uuid::new_v4()).collect(),
            attributes: Map::new(),
            joined_at: crate::utils::current_timestamp(),
            origin_token: "test".to_string(),
        }
    }

    fn strategy(target: usize, teams: usize) -> CompositionStrategy {
        CompositionStrategy::new("test".to_string(), target, 1, target, teams)
    }

    #[test]
    fn test_partitions_of_four() {
        let partitions = partitions_of(4);
        let as_sets: HashSet<Vec<usize>> = partitions.into_iter().collect();

        let expected: HashSet<Vec<usize>> = [
            vec![4],
            vec![1, 3],
            vec![2, 2],
            vec![1, 1, 2],
            vec![1, 1, 1, 1],
        ]
        .into_iter()
        .collect();

        assert_eq!(as_sets, expected);
    }

    #[test]
    fn test_partition_counts() {
        // Standard integer-partition counts
        for (n, count) in [(1, 1), (2, 2), (3, 3), (4, 5), (5, 7)] {
            assert_eq!(partitions_of(n).len(), count, "partitions of {}", n);
        }
    }

    proptest! {
        #[test]
        fn prop_partitions_sum_to_target(target in 1usize..12) {
            let partitions = partitions_of(target);

            // Every partition sums to the target, parts are non-decreasing,
            // and no partition appears twice
            let mut seen = HashSet::new();
            for parts in &partitions {
                prop_assert_eq!(parts.iter().sum::<usize>(), target);
                prop_assert!(parts.windows(2).all(|w| w[0] <= w[1]));
                prop_assert!(seen.insert(parts.clone()));
            }
        }
    }

    #[tokio::test]
    async fn test_two_singletons_match() {
        let mut strategy = strategy(1, 2);
        strategy.add_team(team_of_size(1)).await.unwrap();
        strategy.add_team(team_of_size(1)).await.unwrap();

        match strategy.evaluate().await {
            MatchOutcome::Matched { groups } => {
                assert_eq!(groups.len(), 2);
                assert!(groups.iter().all(|g| g.len() == 1));
            }
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_insufficient_supply_not_yet() {
        let mut strategy = strategy(4, 2);
        strategy.add_team(team_of_size(3)).await.unwrap();
        strategy.add_team(team_of_size(4)).await.unwrap();

        assert!(matches!(strategy.evaluate().await, MatchOutcome::NotYet));
        // Pool untouched on NotYet
        assert_eq!(strategy.pool.len(), 2);
    }

    #[tokio::test]
    async fn test_unsplittable_supply_not_yet() {
        // Enough players in total, but no partition of 1 can use a party of 4
        let mut strategy = CompositionStrategy::new("test".to_string(), 1, 1, 4, 2);
        strategy.add_team(team_of_size(4)).await.unwrap();
        strategy.add_team(team_of_size(4)).await.unwrap();

        assert!(matches!(strategy.evaluate().await, MatchOutcome::NotYet));
        assert_eq!(strategy.pool.len(), 2);
    }

    #[tokio::test]
    async fn test_mixed_sizes_assemble() {
        // Target 4, two groups: [2,2] and [1,3] both satisfiable
        let mut strategy = strategy(4, 2);
        strategy.add_team(team_of_size(2)).await.unwrap();
        strategy.add_team(team_of_size(2)).await.unwrap();
        strategy.add_team(team_of_size(1)).await.unwrap();
        strategy.add_team(team_of_size(3)).await.unwrap();

        match strategy.evaluate().await {
            MatchOutcome::Matched { groups } => {
                assert_eq!(groups.len(), 2);
                for group in &groups {
                    let total: usize = group.iter().map(|t| t.size()).sum();
                    assert_eq!(total, 4);
                }

                // Groups are disjoint in team membership
                let mut seen = HashSet::new();
                for team in groups.iter().flatten() {
                    assert!(seen.insert(team.id));
                }
            }
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oldest_teams_consumed_first() {
        let mut strategy = strategy(1, 2);
        let first = team_of_size(1);
        let second = team_of_size(1);
        let third = team_of_size(1);
        let first_id = first.id;
        let second_id = second.id;

        strategy.add_team(first).await.unwrap();
        strategy.add_team(second).await.unwrap();
        strategy.add_team(third).await.unwrap();

        match strategy.evaluate().await {
            MatchOutcome::Matched { groups } => {
                let matched: Vec<TeamId> = groups.iter().flatten().map(|t| t.id).collect();
                assert_eq!(matched, vec![first_id, second_id]);
            }
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_party_size_bounds_validated() {
        let mut strategy = CompositionStrategy::new("test".to_string(), 4, 2, 3, 2);

        assert!(strategy.add_team(team_of_size(1)).await.is_err());
        assert!(strategy.add_team(team_of_size(4)).await.is_err());
        assert!(strategy.add_team(team_of_size(2)).await.is_ok());
        assert!(strategy.add_team(team_of_size(3)).await.is_ok());
    }
}
