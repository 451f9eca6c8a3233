use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state::{live::LiveMatchState, timer::SessionTimer};

/// Messages accepted from live-state clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Subscribe this connection to the group named by the code.
    JoinSession(String),
    /// Full snapshot published after a local mutation.
    UpdateState(UpdateStatePayload),
    /// Manual reset overriding the session clock.
    SyncTimer(SyncTimerPayload),
}

impl ClientMessage {
    /// Parse a websocket text frame.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Payload of [`ClientMessage::UpdateState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatePayload {
    /// Group the snapshot belongs to.
    pub session_code: String,
    /// Snapshot to relay.
    pub state: LiveMatchState,
    /// Undo snapshots are echoed to the publisher as well.
    #[serde(default)]
    pub is_undo: bool,
}

/// Payload of [`ClientMessage::SyncTimer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTimerPayload {
    /// Group whose clock is overridden.
    pub session_code: String,
    /// Replacement clock record.
    pub timer_state: SessionTimer,
}

/// Messages pushed to live-state clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Snapshot published by a group member.
    StateUpdated(Arc<LiveMatchState>),
    /// Current clock record of the session.
    TimerSync(SessionTimer),
}
