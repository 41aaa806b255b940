//! Range-expansion strategy: elo-like pairing
//!
//! Pairs exactly two teams whose rating windows overlap. Each team's window
//! starts at its rating and widens by a configured amount for every interval
//! it has waited, so long-waiting teams eventually reach further afield.

use crate::error::{MatchmakingError, Result};
use crate::strategy::config::{StrategyConfig, RANGE_EXPANSION};
use crate::strategy::pool::TeamPool;
use crate::strategy::Strategy;
use crate::types::{MatchOutcome, Team, TeamId};
use async_trait::async_trait;

/// The numeric attribute every admitted team must carry
pub const RATING_ATTRIBUTE: &str = "rating";

#[derive(Debug, Clone, Copy)]
struct RatingWindow {
    rating: f64,
    min: f64,
    max: f64,
}

impl RatingWindow {
    fn overlaps(&self, other: &RatingWindow) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

/// Pairs teams with overlapping, time-expanded rating windows
pub struct RangeExpansionStrategy {
    name: String,
    range_expansion_amount: f64,
    range_expansion_time: u64,
    pool: TeamPool,
}

impl RangeExpansionStrategy {
    pub fn new(name: String, range_expansion_amount: f64, range_expansion_time: u64) -> Self {
        Self {
            name,
            range_expansion_amount,
            range_expansion_time,
            pool: TeamPool::new(),
        }
    }

    fn window_for(&self, team: &Team) -> RatingWindow {
        // add_team guarantees the attribute is present and numeric
        let rating = team.attribute_f64(RATING_ATTRIBUTE).unwrap_or(0.0);

        let elapsed = crate::utils::elapsed_seconds(team.joined_at);
        let intervals = if self.range_expansion_time == 0 {
            0.0
        } else {
            (elapsed / self.range_expansion_time as f64).floor()
        };
        let expansion = self.range_expansion_amount * intervals;

        RatingWindow {
            rating,
            min: rating - expansion,
            max: rating + expansion,
        }
    }
}

#[async_trait]
impl Strategy for RangeExpansionStrategy {
    fn kind(&self) -> &'static str {
        RANGE_EXPANSION
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> StrategyConfig {
        StrategyConfig::RangeExpansion {
            name: self.name.clone(),
            range_expansion_amount: self.range_expansion_amount,
            range_expansion_time: self.range_expansion_time,
        }
    }

    async fn add_team(&mut self, team: Team) -> Result<()> {
        if team.attribute_f64(RATING_ATTRIBUTE).is_none() {
            return Err(MatchmakingError::InvalidTeam {
                reason: format!("missing numeric '{}' attribute", RATING_ATTRIBUTE),
            }
            .into());
        }

        self.pool.insert(team)
    }

    async fn remove_team(&mut self, team_id: TeamId) -> Result<()> {
        self.pool.remove(team_id).map(|_| ())
    }

    async fn evaluate(&mut self) -> MatchOutcome {
        let windows: Vec<(&Team, RatingWindow)> = self
            .pool
            .iter()
            .map(|team| (team, self.window_for(team)))
            .collect();

        // Among all overlapping pairs, prefer the closest rating midpoints.
        // Strict comparison keeps the first pair in pool order on ties.
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..windows.len() {
            for j in (i + 1)..windows.len() {
                if !windows[i].1.overlaps(&windows[j].1) {
                    continue;
                }

                let distance = (windows[i].1.rating - windows[j].1.rating).abs();
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((i, j, distance));
                }
            }
        }

        match best {
            Some((i, j, _)) => MatchOutcome::Matched {
                groups: vec![vec![windows[i].0.clone()], vec![windows[j].0.clone()]],
            },
            None => MatchOutcome::NotYet,
        }
    }

    async fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::{json, Map};
    use uuid::Uuid;

    fn rated_team(rating: f64) -> Team {
        let mut attributes = Map::new();
        attributes.insert(RATING_ATTRIBUTE.to_string(), json!(rating));
        Team {
            id: Uuid::new_v4(),
            player_ids: vec![Uuid::new_v4()],
            attributes,
            joined_at: crate::utils::current_timestamp(),
            origin_token: "test".to_string(),
        }
    }

    fn waited(mut team: Team, seconds: i64) -> Team {
        team.joined_at = crate::utils::current_timestamp() - Duration::seconds(seconds);
        team
    }

    #[tokio::test]
    async fn test_rating_attribute_required() {
        let mut strategy = RangeExpansionStrategy::new("test".to_string(), 25.0, 10);
        let team = Team {
            id: Uuid::new_v4(),
            player_ids: vec![Uuid::new_v4()],
            attributes: Map::new(),
            joined_at: crate::utils::current_timestamp(),
            origin_token: "test".to_string(),
        };

        assert!(strategy.add_team(team).await.is_err());
        assert!(strategy.add_team(rated_team(1000.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_equal_ratings_match_immediately() {
        let mut strategy = RangeExpansionStrategy::new("test".to_string(), 25.0, 10);
        strategy.add_team(rated_team(1000.0)).await.unwrap();
        strategy.add_team(rated_team(1000.0)).await.unwrap();

        // Zero elapsed wait gives degenerate [1000,1000] windows, which
        // still overlap each other
        match strategy.evaluate().await {
            MatchOutcome::Matched { groups } => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0].len(), 1);
                assert_eq!(groups[1].len(), 1);
            }
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_expansion_never_reaches() {
        let mut strategy = RangeExpansionStrategy::new("test".to_string(), 0.0, 1);
        strategy
            .add_team(waited(rated_team(1000.0), 3600))
            .await
            .unwrap();
        strategy
            .add_team(waited(rated_team(2000.0), 3600))
            .await
            .unwrap();

        assert!(matches!(strategy.evaluate().await, MatchOutcome::NotYet));
    }

    #[tokio::test]
    async fn test_waiting_expands_window() {
        let mut strategy = RangeExpansionStrategy::new("test".to_string(), 100.0, 10);

        // 1000 vs 1500: needs a combined expansion of 500, i.e. at least
        // 250 per side after ~25 intervals
        strategy.add_team(waited(rated_team(1000.0), 300)).await.unwrap();
        strategy.add_team(waited(rated_team(1500.0), 300)).await.unwrap();

        match strategy.evaluate().await {
            MatchOutcome::Matched { groups } => assert_eq!(groups.len(), 2),
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fresh_distant_pair_not_matched() {
        let mut strategy = RangeExpansionStrategy::new("test".to_string(), 100.0, 10);
        strategy.add_team(rated_team(1000.0)).await.unwrap();
        strategy.add_team(rated_team(1500.0)).await.unwrap();

        assert!(matches!(strategy.evaluate().await, MatchOutcome::NotYet));
    }

    #[tokio::test]
    async fn test_closest_pair_preferred() {
        let mut strategy = RangeExpansionStrategy::new("test".to_string(), 50.0, 1);

        let far = waited(rated_team(1200.0), 60);
        let a = waited(rated_team(1000.0), 60);
        let close = waited(rated_team(1010.0), 60);
        let close_id = close.id;
        let a_id = a.id;

        strategy.add_team(far).await.unwrap();
        strategy.add_team(a).await.unwrap();
        strategy.add_team(close).await.unwrap();

        match strategy.evaluate().await {
            MatchOutcome::Matched { groups } => {
                let ids: Vec<TeamId> = groups.iter().flatten().map(|t| t.id).collect();
                assert!(ids.contains(&a_id));
                assert!(ids.contains(&close_id));
            }
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_team_not_yet() {
        let mut strategy = RangeExpansionStrategy::new("test".to_string(), 25.0, 10);
        strategy.add_team(rated_team(1000.0)).await.unwrap();

        assert!(matches!(strategy.evaluate().await, MatchOutcome::NotYet));
    }
}
