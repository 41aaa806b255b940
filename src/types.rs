//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Unique identifier for a waiting team
pub type TeamId = Uuid;

/// Unique identifier for a player within a team
pub type PlayerId = Uuid;

/// Opaque token used to route a match result back to the caller that
/// admitted the team (e.g. a websocket session id at the transport layer)
pub type OriginToken = String;

/// One party waiting to be matched as a unit
///
/// Immutable after creation: the queue assigns `id` and `joined_at` on
/// admission and drops the value when the team is matched or withdrawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub player_ids: Vec<PlayerId>,
    pub attributes: Map<String, Value>,
    pub joined_at: DateTime<Utc>,
    pub origin_token: OriginToken,
}

impl Team {
    /// Build a team from an admission payload, assigning id and join time
    pub fn from_request(request: TeamRequest, origin_token: OriginToken) -> Self {
        Self {
            id: crate::utils::generate_team_id(),
            player_ids: request.players,
            attributes: request.attributes,
            joined_at: crate::utils::current_timestamp(),
            origin_token,
        }
    }

    /// Number of players in the party
    pub fn size(&self) -> usize {
        self.player_ids.len()
    }

    /// Look up a numeric attribute
    pub fn attribute_f64(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(Value::as_f64)
    }

    /// Check that every named attribute is present
    pub fn has_attributes<'a, I>(&self, names: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        names.into_iter().all(|n| self.attributes.contains_key(n))
    }
}

/// Admission payload from the transport layer into the core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRequest {
    pub players: Vec<PlayerId>,
    pub attributes: Map<String, Value>,
}

/// A produced match: one inner vector per resulting group, disjoint in
/// team membership
pub type MatchGroups = Vec<Vec<Team>>;

/// Result of one strategy evaluation
#[derive(Debug)]
pub enum MatchOutcome {
    /// A valid match was assembled; the queue notifies listeners and then
    /// removes the matched teams
    Matched { groups: MatchGroups },
    /// Evaluation was attempted but could not complete (external dependency
    /// errored, timed out, or returned inconsistent data)
    Failed { cause: anyhow::Error },
    /// No valid combination currently exists; the pool is unchanged
    NotYet,
}

impl MatchOutcome {
    pub fn failed(cause: impl Into<anyhow::Error>) -> Self {
        MatchOutcome::Failed {
            cause: cause.into(),
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }
}
