use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::live::Outcome;

/// One pelada instance as persisted by the record store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Uppercase join code, unique across sessions.
    pub code: String,
    /// Display name chosen by the organizer.
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Registered player of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Primary key of the player.
    pub id: Uuid,
    /// Owning session.
    pub session_id: Uuid,
    /// Display name, unique within the session (case-insensitive).
    pub name: String,
    /// Whether the player only plays in goal.
    pub is_goalkeeper: bool,
    /// Creation timestamp, used to list newest first.
    pub created_at: SystemTime,
}

impl PlayerEntity {
    /// Key used to enforce case-insensitive name uniqueness.
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Finished match as logged when the organizer confirms the outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchLogEntity {
    /// Primary key of the log entry.
    pub id: Uuid,
    /// Owning session.
    pub session_id: Uuid,
    /// Names of the Team A players.
    pub team_a: Vec<String>,
    /// Names of the Team B players.
    pub team_b: Vec<String>,
    /// Final Team A score.
    pub score_a: u32,
    /// Final Team B score.
    pub score_b: u32,
    /// Seconds actually played.
    pub duration_seconds: u32,
    /// Confirmed result.
    pub winner: Outcome,
    /// Creation timestamp, used to list newest first.
    pub created_at: SystemTime,
}

/// Normalize a player name for uniqueness checks.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
