//! Game server allocation for completed matches
//!
//! Once a match is assembled, the service asks a provider for a server to
//! host it. The pseudo provider hands out placeholder servers for local
//! development and tests; a real fleet allocator would sit behind the same
//! trait.

use crate::error::Result;
use crate::types::MatchGroups;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A server assigned to host one match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameServer {
    pub id: Uuid,
    pub address: String,
    pub port: u16,
}

/// What a caller waiting on a queue ultimately receives
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub groups: MatchGroups,
    pub server: GameServer,
}

/// Allocates game servers for matches
#[async_trait]
pub trait GameProvider: Send + Sync {
    async fn get_server(&self, groups: &MatchGroups) -> Result<GameServer>;
}

/// Provider that fabricates a localhost server per match
#[derive(Default)]
pub struct PseudoGameProvider;

impl PseudoGameProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GameProvider for PseudoGameProvider {
    async fn get_server(&self, _groups: &MatchGroups) -> Result<GameServer> {
        Ok(GameServer {
            id: Uuid::new_v4(),
            address: "127.0.0.1".to_string(),
            port: 25565,
        })
    }
}
