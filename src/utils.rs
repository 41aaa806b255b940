//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique team ID
pub fn generate_team_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new correlation ID for scorer requests
pub fn generate_request_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Elapsed seconds between a join time and now, clamped at zero
pub fn elapsed_seconds(joined_at: DateTime<Utc>) -> f64 {
    let elapsed = current_timestamp() - joined_at;
    (elapsed.num_milliseconds() as f64 / 1000.0).max(0.0)
}
