//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid team: {reason}")]
    InvalidTeam { reason: String },

    #[error("Team {team_id} is already in the pool")]
    TeamAlreadyPooled { team_id: String },

    #[error("Player {player_id} already belongs to a pooled team")]
    PlayerAlreadyPooled { player_id: String },

    #[error("Origin {origin} already has a team waiting")]
    OriginAlreadyWaiting { origin: String },

    #[error("Team not found: {team_id}")]
    TeamNotFound { team_id: String },

    #[error("Queue not found: {name}")]
    QueueNotFound { name: String },

    #[error("Queue already exists: {name}")]
    QueueAlreadyExists { name: String },

    #[error("Strategy not found: {name}")]
    StrategyNotFound { name: String },

    #[error("Strategy already exists: {name}")]
    StrategyAlreadyExists { name: String },

    #[error("Strategy {name} is still bound to a queue")]
    StrategyInUse { name: String },

    #[error("No creator registered for strategy type: {kind}")]
    UnknownStrategyType { kind: String },

    #[error("Scorer request failed: {reason}")]
    ScorerFailure { reason: String },

    #[error("Scorer request {request_id} timed out")]
    ScorerTimeout { request_id: String },

    #[error("Vector index error: {reason}")]
    IndexFailure { reason: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
