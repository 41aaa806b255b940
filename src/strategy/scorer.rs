//! External-scorer strategy: match assembly delegated over a message bus
//!
//! The matching function lives in an external scoring service (e.g. a
//! trained model). Evaluation projects the pooled teams into feature maps,
//! publishes them under a fresh correlation id, and waits — bounded — for
//! the correlated reply. This is the one strategy whose `evaluate` has an
//! externally observable side effect even when the outcome is `Failed`.

use crate::amqp::messages::ScorerRequest;
use crate::amqp::scorer_client::ScorerClient;
use crate::error::{MatchmakingError, Result};
use crate::strategy::config::{StrategyConfig, EXTERNAL_SCORER};
use crate::strategy::pool::TeamPool;
use crate::strategy::Strategy;
use crate::types::{MatchOutcome, Team, TeamId};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long one evaluation waits for the scorer's reply
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

/// Delegates match assembly to an external scorer over request/reply
pub struct ExternalScorerStrategy {
    name: String,
    batch_size: usize,
    features: Vec<String>,
    reply_timeout: Duration,
    client: Arc<dyn ScorerClient>,
    pool: TeamPool,
}

impl ExternalScorerStrategy {
    pub fn new(
        name: String,
        batch_size: usize,
        features: Vec<String>,
        client: Arc<dyn ScorerClient>,
    ) -> Self {
        Self::with_timeout(name, batch_size, features, client, DEFAULT_REPLY_TIMEOUT)
    }

    pub fn with_timeout(
        name: String,
        batch_size: usize,
        features: Vec<String>,
        client: Arc<dyn ScorerClient>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            name,
            batch_size,
            features,
            reply_timeout,
            client,
            pool: TeamPool::new(),
        }
    }

    /// Map the reply's team-id groups back onto pooled teams
    fn resolve_groups(&self, id_groups: Vec<Vec<TeamId>>) -> Result<Vec<Vec<Team>>> {
        let mut groups = Vec::with_capacity(id_groups.len());
        for ids in id_groups {
            let mut group = Vec::with_capacity(ids.len());
            for id in ids {
                let team = self.pool.get(&id).ok_or_else(|| {
                    MatchmakingError::ScorerFailure {
                        reason: format!("reply references unknown team {}", id),
                    }
                })?;
                group.push(team.clone());
            }
            groups.push(group);
        }
        Ok(groups)
    }
}

#[async_trait]
impl Strategy for ExternalScorerStrategy {
    fn kind(&self) -> &'static str {
        EXTERNAL_SCORER
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> StrategyConfig {
        StrategyConfig::ExternalScorer {
            name: self.name.clone(),
            batch_size: self.batch_size,
            features: self.features.clone(),
        }
    }

    async fn add_team(&mut self, team: Team) -> Result<()> {
        if !team.has_attributes(&self.features) {
            return Err(MatchmakingError::InvalidTeam {
                reason: format!("missing one or more required features: {:?}", self.features),
            }
            .into());
        }

        self.pool.insert(team)
    }

    async fn remove_team(&mut self, team_id: TeamId) -> Result<()> {
        self.pool.remove(team_id).map(|_| ())
    }

    async fn evaluate(&mut self) -> MatchOutcome {
        if self.pool.len() < self.batch_size {
            return MatchOutcome::NotYet;
        }

        // Project each pooled team's attributes, tagged with its id
        let teams = self
            .pool
            .iter()
            .map(|team| {
                let mut features = team.attributes.clone();
                features.insert("id".to_string(), json!(team.id.to_string()));
                features
            })
            .collect();

        let request_id = crate::utils::generate_request_id();
        let receiver = self.client.register(request_id);
        let request = ScorerRequest { request_id, teams };

        debug!(
            "Scorer strategy '{}' publishing request {} for {} teams",
            self.name,
            request_id,
            self.pool.len()
        );

        if let Err(e) = self.client.publish(&request).await {
            self.client.abandon(&request_id);
            return MatchOutcome::Failed { cause: e };
        }

        let reply = match tokio::time::timeout(self.reply_timeout, receiver).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => {
                // Listener dropped the sender without resolving
                self.client.abandon(&request_id);
                return MatchOutcome::failed(MatchmakingError::ScorerFailure {
                    reason: "reply channel closed".to_string(),
                });
            }
            Err(_) => {
                // Evict the stale entry so a late reply is dropped; the next
                // tick re-issues under a fresh correlation id
                self.client.abandon(&request_id);
                return MatchOutcome::failed(MatchmakingError::ScorerTimeout {
                    request_id: request_id.to_string(),
                });
            }
        };

        if let Some(error) = reply.error {
            return MatchOutcome::failed(MatchmakingError::ScorerFailure { reason: error });
        }

        let id_groups = match reply.teams {
            Some(groups) => groups,
            None => {
                return MatchOutcome::failed(MatchmakingError::ScorerFailure {
                    reason: "reply carried neither teams nor error".to_string(),
                });
            }
        };

        match self.resolve_groups(id_groups) {
            Ok(groups) => MatchOutcome::Matched { groups },
            Err(cause) => MatchOutcome::Failed { cause },
        }
    }

    async fn shutdown(&mut self) {
        // The reply consumer is shared across scorer strategies; the
        // service owns its teardown, not any single strategy.
        debug!("Scorer strategy '{}' released", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amqp::messages::ScorerReply;
    use crate::amqp::scorer_client::MockScorerClient;
    use serde_json::Map;
    use uuid::Uuid;

    fn scored_team(kdr: f64) -> Team {
        let mut attributes = Map::new();
        attributes.insert("kdr".to_string(), json!(kdr));
        Team {
            id: Uuid::new_v4(),
            player_ids: vec![Uuid::new_v4()],
            attributes,
            joined_at: crate::utils::current_timestamp(),
            origin_token: "test".to_string(),
        }
    }

    fn strategy_with_client(
        batch_size: usize,
        timeout: Duration,
    ) -> (ExternalScorerStrategy, Arc<MockScorerClient>) {
        let client = Arc::new(MockScorerClient::new());
        let strategy = ExternalScorerStrategy::with_timeout(
            "test".to_string(),
            batch_size,
            vec!["kdr".to_string()],
            client.clone(),
            timeout,
        );
        (strategy, client)
    }

    #[tokio::test]
    async fn test_features_validated() {
        let (mut strategy, _client) = strategy_with_client(2, DEFAULT_REPLY_TIMEOUT);

        let mut bare = scored_team(1.0);
        bare.attributes.clear();
        assert!(strategy.add_team(bare).await.is_err());
        assert!(strategy.add_team(scored_team(1.0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_below_batch_size_not_yet() {
        let (mut strategy, client) = strategy_with_client(3, DEFAULT_REPLY_TIMEOUT);
        strategy.add_team(scored_team(1.0)).await.unwrap();
        strategy.add_team(scored_team(2.0)).await.unwrap();

        assert!(matches!(strategy.evaluate().await, MatchOutcome::NotYet));
        // No request was even published
        assert!(client.published_requests().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_fails_and_pool_unchanged() {
        let (mut strategy, client) = strategy_with_client(2, Duration::from_millis(20));
        strategy.add_team(scored_team(1.0)).await.unwrap();
        strategy.add_team(scored_team(2.0)).await.unwrap();

        match strategy.evaluate().await {
            MatchOutcome::Failed { cause } => {
                assert!(matches!(
                    cause.downcast_ref::<MatchmakingError>(),
                    Some(MatchmakingError::ScorerTimeout { .. })
                ));
            }
            other => panic!("expected Failed, got {:?}", other),
        }

        // Pool untouched, pending entry evicted
        assert_eq!(strategy.pool.len(), 2);
        assert_eq!(client.pending_count(), 0);

        // A late reply for the abandoned correlation id is dropped
        let request_id = client.published_requests()[0].request_id;
        let delivered = client.inject_reply(ScorerReply {
            request_id,
            teams: Some(vec![]),
            error: None,
        });
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_successful_reply_matches() {
        let (mut strategy, client) = strategy_with_client(2, Duration::from_secs(5));
        let a = scored_team(1.0);
        let b = scored_team(2.0);
        let (a_id, b_id) = (a.id, b.id);
        strategy.add_team(a).await.unwrap();
        strategy.add_team(b).await.unwrap();

        let handle = tokio::spawn(async move {
            let outcome = strategy.evaluate().await;
            (strategy, outcome)
        });

        // Wait for the request to be published, then reply to it
        let request = loop {
            let published = client.published_requests();
            if let Some(request) = published.first() {
                break request.clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        assert_eq!(request.teams.len(), 2);
        assert!(request.teams[0].contains_key("id"));

        assert!(client.inject_reply(ScorerReply {
            request_id: request.request_id,
            teams: Some(vec![vec![a_id], vec![b_id]]),
            error: None,
        }));

        let (strategy, outcome) = handle.await.unwrap();
        match outcome {
            MatchOutcome::Matched { groups } => {
                assert_eq!(groups.len(), 2);
                assert_eq!(groups[0][0].id, a_id);
                assert_eq!(groups[1][0].id, b_id);
            }
            other => panic!("expected Matched, got {:?}", other),
        }
        assert_eq!(client.pending_count(), 0);
        // The strategy does not remove matched teams itself
        assert_eq!(strategy.pool.len(), 2);
    }

    #[tokio::test]
    async fn test_error_reply_fails() {
        let (mut strategy, client) = strategy_with_client(2, Duration::from_secs(5));
        strategy.add_team(scored_team(1.0)).await.unwrap();
        strategy.add_team(scored_team(2.0)).await.unwrap();

        let handle = tokio::spawn(async move { strategy.evaluate().await });

        let request = loop {
            let published = client.published_requests();
            if let Some(request) = published.first() {
                break request.clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        client.inject_reply(ScorerReply {
            request_id: request.request_id,
            teams: None,
            error: Some("model not loaded".to_string()),
        });

        assert!(matches!(
            handle.await.unwrap(),
            MatchOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_team_id_fails() {
        let (mut strategy, client) = strategy_with_client(2, Duration::from_secs(5));
        strategy.add_team(scored_team(1.0)).await.unwrap();
        strategy.add_team(scored_team(2.0)).await.unwrap();

        let handle = tokio::spawn(async move { strategy.evaluate().await });

        let request = loop {
            let published = client.published_requests();
            if let Some(request) = published.first() {
                break request.clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };

        client.inject_reply(ScorerReply {
            request_id: request.request_id,
            teams: Some(vec![vec![Uuid::new_v4()]]),
            error: None,
        });

        assert!(matches!(
            handle.await.unwrap(),
            MatchOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_shutdown_leaves_shared_client_running() {
        let client = Arc::new(MockScorerClient::new());
        let mut retiring = ExternalScorerStrategy::with_timeout(
            "retiring".to_string(),
            2,
            vec!["kdr".to_string()],
            client.clone(),
            Duration::from_secs(5),
        );
        let mut surviving = ExternalScorerStrategy::with_timeout(
            "surviving".to_string(),
            2,
            vec!["kdr".to_string()],
            client.clone(),
            Duration::from_secs(5),
        );

        retiring.shutdown().await;
        assert_eq!(client.shutdown_calls(), 0);

        // The remaining strategy still receives replies through the client
        let a = scored_team(1.0);
        let b = scored_team(2.0);
        let (a_id, b_id) = (a.id, b.id);
        surviving.add_team(a).await.unwrap();
        surviving.add_team(b).await.unwrap();

        let client2 = client.clone();
        let handle = tokio::spawn(async move { surviving.evaluate().await });

        let request = loop {
            let published = client2.published_requests();
            if let Some(request) = published.first() {
                break request.clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert!(client2.inject_reply(ScorerReply {
            request_id: request.request_id,
            teams: Some(vec![vec![a_id], vec![b_id]]),
            error: None,
        }));
        assert!(handle.await.unwrap().is_matched());
    }

    #[tokio::test]
    async fn test_publish_failure_fails() {
        let client = Arc::new(MockScorerClient::failing());
        let mut strategy = ExternalScorerStrategy::new(
            "test".to_string(),
            1,
            vec![],
            client.clone(),
        );
        strategy.add_team(scored_team(1.0)).await.unwrap();

        assert!(matches!(
            strategy.evaluate().await,
            MatchOutcome::Failed { .. }
        ));
        // Pending entry evicted on publish failure too
        assert_eq!(client.pending_count(), 0);
    }
}
