//! Device-side half of the live session: a local state store kept in sync
//! with the relay over a websocket, plus local persistence and match logging.

pub mod persistence;
pub mod recorder;
pub mod store;
pub mod ticker;
pub mod transport;

use std::io;

use thiserror::Error;

pub use persistence::{FilePersistence, LocalPersistence, MemoryPersistence, SessionIdentity};
pub use recorder::{HttpMatchRecorder, MatchRecorder};
pub use store::LiveStateStore;
pub use transport::{SyncTransport, TransportConfig};

/// Result alias for client-side operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by the client support layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Drawing teams needs a minimum number of registered players.
    #[error("at least {needed} players are needed to draw teams (got {got})")]
    NotEnoughPlayers { needed: usize, got: usize },
    /// Reading or writing a persisted key failed.
    #[error("local persistence failed for `{key}`")]
    Persistence {
        key: String,
        #[source]
        source: io::Error,
    },
    /// A persisted value could not be decoded.
    #[error("corrupt persisted value for `{key}`: {reason}")]
    Corrupt { key: String, reason: String },
    /// A message or state could not be encoded.
    #[error("failed to encode message")]
    Encoding(#[from] serde_json::Error),
    /// The websocket connection failed.
    #[error("websocket failure")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    /// Reconnecting gave up after the configured number of attempts.
    #[error("gave up reconnecting after {attempts} attempt(s)")]
    ReconnectExhausted { attempts: u32 },
    /// The match log request could not be sent.
    #[error("match log request failed")]
    Http(#[from] reqwest::Error),
    /// The server refused the match log.
    #[error("match log rejected with status {status}")]
    Rejected { status: reqwest::StatusCode },
}
