use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use super::{ClientError, ClientResult};
use crate::{
    dto::session::SessionResponse,
    state::{live::LiveMatchState, session_code::SessionCode},
};

/// Key holding the serialized live state.
pub const STATE_KEY: &str = "pelada-manager-state";
/// Key holding the id of the open session.
pub const SESSION_ID_KEY: &str = "game_session_id";
/// Key holding the join code of the open session.
pub const SESSION_CODE_KEY: &str = "game_session_code";
/// Key holding the display name of the open session.
pub const SESSION_NAME_KEY: &str = "game_session_name";

/// Small string key/value store surviving restarts of the device.
pub trait LocalPersistence: Send + Sync {
    fn load(&self, key: &str) -> ClientResult<Option<String>>;
    fn store(&self, key: &str, value: &str) -> ClientResult<()>;
    fn remove(&self, key: &str) -> ClientResult<()>;
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    /// Use `dir`, creating it when missing.
    pub fn new(dir: impl Into<PathBuf>) -> ClientResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ClientError::Persistence {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl LocalPersistence for FilePersistence {
    fn load(&self, key: &str) -> ClientResult<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ClientError::Persistence {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn store(&self, key: &str, value: &str) -> ClientResult<()> {
        fs::write(self.path(key), value).map_err(|source| ClientError::Persistence {
            key: key.to_owned(),
            source,
        })
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ClientError::Persistence {
                key: key.to_owned(),
                source,
            }),
        }
    }
}

/// Process-local persistence, mostly for tests and ephemeral viewers.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: DashMap<String, String>,
}

impl LocalPersistence for MemoryPersistence {
    fn load(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn store(&self, key: &str, value: &str) -> ClientResult<()> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Rehydrate the live state. Unreadable or corrupt blobs are logged and ignored.
pub fn load_state(persistence: &dyn LocalPersistence) -> Option<LiveMatchState> {
    let raw = match persistence.load(STATE_KEY) {
        Ok(raw) => raw?,
        Err(err) => {
            warn!(error = %err, "failed to read saved live state");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(state) => Some(state),
        Err(err) => {
            warn!(error = %err, "failed to parse saved live state; starting fresh");
            None
        }
    }
}

/// Persist the live state blob.
pub fn save_state(persistence: &dyn LocalPersistence, state: &LiveMatchState) -> ClientResult<()> {
    let raw = serde_json::to_string(state)?;
    persistence.store(STATE_KEY, &raw)
}

/// Which session this device has open, kept to rejoin the right group on restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub id: Uuid,
    pub code: SessionCode,
    pub name: String,
}

impl SessionIdentity {
    /// Read the saved identity, if all three keys are present.
    pub fn load(persistence: &dyn LocalPersistence) -> ClientResult<Option<Self>> {
        let (Some(id), Some(code), Some(name)) = (
            persistence.load(SESSION_ID_KEY)?,
            persistence.load(SESSION_CODE_KEY)?,
            persistence.load(SESSION_NAME_KEY)?,
        ) else {
            return Ok(None);
        };

        let id = Uuid::parse_str(id.trim()).map_err(|err| ClientError::Corrupt {
            key: SESSION_ID_KEY.into(),
            reason: err.to_string(),
        })?;
        let code = SessionCode::parse(&code).map_err(|err| ClientError::Corrupt {
            key: SESSION_CODE_KEY.into(),
            reason: err.to_string(),
        })?;
        Ok(Some(Self { id, code, name }))
    }

    /// Save the identity under its three keys.
    pub fn save(&self, persistence: &dyn LocalPersistence) -> ClientResult<()> {
        persistence.store(SESSION_ID_KEY, &self.id.to_string())?;
        persistence.store(SESSION_CODE_KEY, self.code.as_str())?;
        persistence.store(SESSION_NAME_KEY, &self.name)
    }

    /// Forget the open session and its live state.
    pub fn clear(persistence: &dyn LocalPersistence) -> ClientResult<()> {
        for key in [SESSION_ID_KEY, SESSION_CODE_KEY, SESSION_NAME_KEY, STATE_KEY] {
            persistence.remove(key)?;
        }
        Ok(())
    }
}

impl TryFrom<&SessionResponse> for SessionIdentity {
    type Error = ClientError;

    fn try_from(value: &SessionResponse) -> Result<Self, Self::Error> {
        let code = SessionCode::parse(&value.code).map_err(|err| ClientError::Corrupt {
            key: SESSION_CODE_KEY.into(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            id: value.id,
            code,
            name: value.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::live::MatchPhase;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            id: Uuid::new_v4(),
            code: SessionCode::parse("QWE123").unwrap(),
            name: "Pelada de sábado".into(),
        }
    }

    #[test]
    fn file_persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = FilePersistence::new(dir.path().join("device")).unwrap();
        let mut state = LiveMatchState::default();
        state.phase = MatchPhase::Paused;
        state.score_b = 3;
        save_state(&first, &state).unwrap();
        identity().save(&first).unwrap();

        let reopened = FilePersistence::new(first.dir()).unwrap();
        assert_eq!(load_state(&reopened), Some(state));
        assert!(SessionIdentity::load(&reopened).unwrap().is_some());
    }

    #[test]
    fn corrupt_state_is_ignored() {
        let persistence = MemoryPersistence::default();
        persistence.store(STATE_KEY, "{not json").unwrap();
        assert_eq!(load_state(&persistence), None);
    }

    #[test]
    fn identity_round_trips_and_clears() {
        let persistence = MemoryPersistence::default();
        assert_eq!(SessionIdentity::load(&persistence).unwrap(), None);

        let saved = identity();
        saved.save(&persistence).unwrap();
        save_state(&persistence, &LiveMatchState::default()).unwrap();
        assert_eq!(SessionIdentity::load(&persistence).unwrap(), Some(saved));

        SessionIdentity::clear(&persistence).unwrap();
        assert_eq!(SessionIdentity::load(&persistence).unwrap(), None);
        assert_eq!(load_state(&persistence), None);
    }

    #[test]
    fn removing_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = FilePersistence::new(dir.path()).unwrap();
        persistence.remove(STATE_KEY).unwrap();
    }
}
