//! AMQP integration for the external scorer bridge
//!
//! Provides connection management, the scorer request/reply wire shapes,
//! and the client that correlates outbound requests with inbound replies.

pub mod connection;
pub mod messages;
pub mod scorer_client;

pub use connection::{AmqpConfig, AmqpConnection};
pub use messages::{ScorerReply, ScorerRequest};
pub use scorer_client::{AmqpScorerClient, MockScorerClient, ScorerClient};
