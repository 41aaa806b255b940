//! Admitted-team pool shared by every strategy implementation
//!
//! Strategies embed a `TeamPool` instead of inheriting shared mutable state.
//! The pool preserves join order, which the range-expansion and
//! similarity-search strategies depend on.

use crate::error::{MatchmakingError, Result};
use crate::types::{Team, TeamId};
use std::collections::HashMap;

/// Insertion-ordered pool of admitted teams
///
/// Invariants: team ids are unique, and no player id appears in two teams
/// simultaneously present in the pool.
#[derive(Debug, Default)]
pub struct TeamPool {
    teams: HashMap<TeamId, Team>,
    join_order: Vec<TeamId>,
}

impl TeamPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a team, enforcing the pool invariants. Never partially applies.
    pub fn insert(&mut self, team: Team) -> Result<()> {
        if self.teams.contains_key(&team.id) {
            return Err(MatchmakingError::TeamAlreadyPooled {
                team_id: team.id.to_string(),
            }
            .into());
        }

        for existing in self.teams.values() {
            if let Some(player) = team
                .player_ids
                .iter()
                .find(|p| existing.player_ids.contains(p))
            {
                return Err(MatchmakingError::PlayerAlreadyPooled {
                    player_id: player.to_string(),
                }
                .into());
            }
        }

        self.join_order.push(team.id);
        self.teams.insert(team.id, team);
        Ok(())
    }

    /// Remove a team by id. Removing a team that is not pooled is an error.
    pub fn remove(&mut self, team_id: TeamId) -> Result<Team> {
        let team = self
            .teams
            .remove(&team_id)
            .ok_or_else(|| MatchmakingError::TeamNotFound {
                team_id: team_id.to_string(),
            })?;

        self.join_order.retain(|id| *id != team_id);
        Ok(team)
    }

    pub fn get(&self, team_id: &TeamId) -> Option<&Team> {
        self.teams.get(team_id)
    }

    pub fn contains(&self, team_id: &TeamId) -> bool {
        self.teams.contains_key(team_id)
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// Total number of players across all pooled teams
    pub fn total_players(&self) -> usize {
        self.teams.values().map(|t| t.size()).sum()
    }

    /// Iterate teams oldest-joined first
    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        self.join_order.iter().filter_map(|id| self.teams.get(id))
    }

    /// The earliest-joined team still in the pool
    pub fn earliest(&self) -> Option<&Team> {
        self.join_order.first().and_then(|id| self.teams.get(id))
    }
}
