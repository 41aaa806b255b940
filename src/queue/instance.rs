//! A single queue bound to one strategy

use crate::error::{MatchmakingError, Result};
use crate::strategy::SharedStrategy;
use crate::types::{MatchGroups, MatchOutcome, OriginToken, Team, TeamId};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};

/// Queue state behind the single writer lock
struct QueueInner {
    members: HashMap<TeamId, Team>,
    listeners: HashMap<OriginToken, oneshot::Sender<MatchGroups>>,
}

/// Read-only view of a queue for status reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub name: String,
    pub strategy_name: String,
    pub pooled_teams: usize,
}

/// A named queue feeding one strategy.
///
/// Admission, withdrawal and ticking all take the inner lock first and the
/// strategy lock second; nothing else may lock in the opposite order.
pub struct Queue {
    name: String,
    strategy_name: String,
    strategy: SharedStrategy,
    inner: Mutex<QueueInner>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("strategy_name", &self.strategy_name)
            .finish_non_exhaustive()
    }
}

impl Queue {
    pub fn new(name: String, strategy_name: String, strategy: SharedStrategy) -> Self {
        Self {
            name,
            strategy_name,
            strategy,
            inner: Mutex::new(QueueInner {
                members: HashMap::new(),
                listeners: HashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let inner = self.inner.lock().await;
        QueueSnapshot {
            name: self.name.clone(),
            strategy_name: self.strategy_name.clone(),
            pooled_teams: inner.members.len(),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Admit a team and register a listener for its origin. An origin may
    /// have at most one team waiting at a time.
    ///
    /// Rejection leaves the queue exactly as it was: membership checks run
    /// first, then the strategy validates and pools the team, and only then
    /// is queue bookkeeping updated.
    pub async fn admit(&self, team: Team) -> Result<oneshot::Receiver<MatchGroups>> {
        let mut inner = self.inner.lock().await;

        if inner.members.contains_key(&team.id) {
            return Err(MatchmakingError::TeamAlreadyPooled {
                team_id: team.id.to_string(),
            }
            .into());
        }
        if inner.listeners.contains_key(&team.origin_token) {
            return Err(MatchmakingError::OriginAlreadyWaiting {
                origin: team.origin_token.clone(),
            }
            .into());
        }
        for member in inner.members.values() {
            for player_id in &team.player_ids {
                if member.player_ids.contains(player_id) {
                    return Err(MatchmakingError::PlayerAlreadyPooled {
                        player_id: player_id.to_string(),
                    }
                    .into());
                }
            }
        }

        let team_id = team.id;
        let origin = team.origin_token.clone();

        self.strategy.lock().await.add_team(team.clone()).await?;

        inner.members.insert(team_id, team);
        let (tx, rx) = oneshot::channel();
        inner.listeners.insert(origin, tx);

        debug!("Team {} admitted to queue '{}'", team_id, self.name);
        Ok(rx)
    }

    /// Withdraw a team before it is matched
    pub async fn withdraw(&self, team_id: TeamId) -> Result<Team> {
        let mut inner = self.inner.lock().await;

        if !inner.members.contains_key(&team_id) {
            return Err(MatchmakingError::TeamNotFound {
                team_id: team_id.to_string(),
            }
            .into());
        }

        self.strategy.lock().await.remove_team(team_id).await?;

        // Checked above
        let team = inner.members.remove(&team_id).unwrap();
        inner.listeners.remove(&team.origin_token);

        debug!("Team {} withdrew from queue '{}'", team_id, self.name);
        Ok(team)
    }

    /// Run one matching attempt.
    ///
    /// On a match, listeners are notified before the matched teams are
    /// removed; a team whose removal fails is logged but the match stands.
    pub async fn tick(&self) -> MatchOutcome {
        let mut inner = self.inner.lock().await;
        let mut strategy = self.strategy.lock().await;

        let outcome = strategy.evaluate().await;
        match &outcome {
            MatchOutcome::NotYet => {}
            MatchOutcome::Failed { cause } => {
                warn!("Tick failed on queue '{}': {:#}", self.name, cause);
            }
            MatchOutcome::Matched { groups } => {
                info!(
                    "Queue '{}' matched {} teams into {} groups",
                    self.name,
                    groups.iter().map(Vec::len).sum::<usize>(),
                    groups.len()
                );

                // Notify every involved origin first, then clean up
                for team in groups.iter().flatten() {
                    if let Some(tx) = inner.listeners.remove(&team.origin_token) {
                        if tx.send(groups.clone()).is_err() {
                            debug!(
                                "Listener for origin '{}' went away before notification",
                                team.origin_token
                            );
                        }
                    }
                }

                for team in groups.iter().flatten() {
                    if let Err(e) = strategy.remove_team(team.id).await {
                        warn!(
                            "Failed to remove matched team {} from queue '{}': {:#}",
                            team.id, self.name, e
                        );
                    }
                    inner.members.remove(&team.id);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{CompositionStrategy, Strategy};
    use crate::types::TeamRequest;
    use serde_json::Map;
    use std::sync::Arc;
    use uuid::Uuid;

    fn duel_queue() -> Queue {
        // Two teams of one player each
        let strategy = CompositionStrategy::new("duel".to_string(), 1, 1, 1, 2);
        Queue::new(
            "duels".to_string(),
            "duel".to_string(),
            Arc::new(Mutex::new(Box::new(strategy) as Box<dyn Strategy>)),
        )
    }

    fn solo_team(origin: &str) -> Team {
        Team::from_request(
            TeamRequest {
                players: vec![Uuid::new_v4()],
                attributes: Map::new(),
            },
            origin.to_string(),
        )
    }

    #[tokio::test]
    async fn test_admit_tick_notify() {
        let queue = duel_queue();

        let rx_a = queue.admit(solo_team("origin-a")).await.unwrap();
        assert!(matches!(queue.tick().await, MatchOutcome::NotYet));

        let rx_b = queue.admit(solo_team("origin-b")).await.unwrap();
        assert!(matches!(queue.tick().await, MatchOutcome::Matched { .. }));

        // Both origins see the same groups; the queue drains
        let groups_a = rx_a.await.unwrap();
        let groups_b = rx_b.await.unwrap();
        assert_eq!(groups_a.len(), 2);
        assert_eq!(groups_b.len(), 2);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_team_rejected() {
        let queue = duel_queue();
        let team = solo_team("origin-a");
        let duplicate = team.clone();

        queue.admit(team).await.unwrap();
        let err = queue.admit(duplicate).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::TeamAlreadyPooled { .. })
        ));
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_origin_rejected() {
        let queue = duel_queue();
        let rx = queue.admit(solo_team("origin-a")).await.unwrap();

        let err = queue.admit(solo_team("origin-a")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::OriginAlreadyWaiting { .. })
        ));
        assert_eq!(queue.len().await, 1);

        // The first team's listener survives and still hears its match
        queue.admit(solo_team("origin-b")).await.unwrap();
        assert!(matches!(queue.tick().await, MatchOutcome::Matched { .. }));
        assert_eq!(rx.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pooled_player_rejected() {
        let queue = duel_queue();
        let team = solo_team("origin-a");
        let player_id = team.player_ids[0];

        queue.admit(team).await.unwrap();

        let mut rejoin = solo_team("origin-b");
        rejoin.player_ids = vec![player_id];
        let err = queue.admit(rejoin).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::PlayerAlreadyPooled { .. })
        ));
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_strategy_rejection_leaves_queue_unchanged() {
        // Strategy only accepts parties of exactly one player
        let queue = duel_queue();

        let mut oversized = solo_team("origin-a");
        oversized.player_ids.push(Uuid::new_v4());
        assert!(queue.admit(oversized).await.is_err());

        assert!(queue.is_empty().await);
        // The rejected origin can still join with a valid party
        assert!(queue.admit(solo_team("origin-a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_withdraw() {
        let queue = duel_queue();
        let team = solo_team("origin-a");
        let team_id = team.id;

        let rx = queue.admit(team).await.unwrap();
        let withdrawn = queue.withdraw(team_id).await.unwrap();
        assert_eq!(withdrawn.id, team_id);
        assert!(queue.is_empty().await);

        // The listener is torn down with the team
        assert!(rx.await.is_err());

        let err = queue.withdraw(team_id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::TeamNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_listener_does_not_block_match() {
        let queue = duel_queue();

        let rx_a = queue.admit(solo_team("origin-a")).await.unwrap();
        drop(queue.admit(solo_team("origin-b")).await.unwrap());

        assert!(matches!(queue.tick().await, MatchOutcome::Matched { .. }));
        assert!(queue.is_empty().await);
        assert_eq!(rx_a.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let queue = duel_queue();
        queue.admit(solo_team("origin-a")).await.unwrap();

        let snapshot = queue.snapshot().await;
        assert_eq!(snapshot.name, "duels");
        assert_eq!(snapshot.strategy_name, "duel");
        assert_eq!(snapshot.pooled_teams, 1);
    }
}
