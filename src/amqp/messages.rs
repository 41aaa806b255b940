//! Scorer request/reply message definitions and serialization

use crate::error::{MatchmakingError, Result};
use crate::types::TeamId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// AMQP queue names for the scorer bridge
pub const SCORER_REQUEST_QUEUE: &str = "matchmaking.scorer_requests";
pub const SCORER_REPLY_QUEUE: &str = "matchmaking.scorer_replies";

/// Outbound request asking the external scorer to assemble a match from a
/// batch of teams. Each entry in `teams` is the team's projected feature
/// map with its id injected under `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorerRequest {
    pub request_id: Uuid,
    pub teams: Vec<Map<String, Value>>,
}

impl ScorerRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize scorer request: {}", e),
            }
            .into()
        })
    }
}

/// Inbound reply correlated by request id. Either `teams` carries the
/// proposed grouping of team ids, or `error` explains why scoring failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorerReply {
    pub request_id: Uuid,
    #[serde(default)]
    pub teams: Option<Vec<Vec<TeamId>>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScorerReply {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::ScorerFailure {
                reason: format!("Failed to deserialize scorer reply: {}", e),
            }
            .into()
        })
    }
}
