//! Process-local record store used when no database is configured.

use std::{cmp::Reverse, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{BoxFuture, ready};
use uuid::Uuid;

use super::RecordStore;
use crate::dao::{
    models::{MatchLogEntity, PlayerEntity, SessionEntity},
    storage::{StorageError, StorageResult},
};

/// [`RecordStore`] keeping everything in concurrent maps. Contents die with the process.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    sessions: DashMap<Uuid, SessionEntity>,
    codes: DashMap<String, Uuid>,
    players: DashMap<Uuid, PlayerEntity>,
    player_names: DashMap<(Uuid, String), Uuid>,
    matches: DashMap<Uuid, MatchLogEntity>,
}

impl MemoryRecordStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryInner {
    fn create_session(&self, session: SessionEntity) -> StorageResult<()> {
        match self.codes.entry(session.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::conflict(format!(
                "session code `{}` already in use",
                session.code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.id);
                self.sessions.insert(session.id, session);
                Ok(())
            }
        }
    }

    fn delete_session(&self, id: Uuid) -> bool {
        let Some((_, session)) = self.sessions.remove(&id) else {
            return false;
        };
        self.codes.remove(&session.code);
        self.players.retain(|_, player| player.session_id != id);
        self.player_names.retain(|(session_id, _), _| *session_id != id);
        self.matches.retain(|_, entry| entry.session_id != id);
        true
    }

    fn create_player(&self, player: PlayerEntity) -> StorageResult<()> {
        if !self.sessions.contains_key(&player.session_id) {
            return Err(StorageError::conflict(format!(
                "session `{}` does not exist",
                player.session_id
            )));
        }
        match self.player_names.entry((player.session_id, player.name_key())) {
            Entry::Occupied(_) => Err(StorageError::conflict(format!(
                "player `{}` already exists in this session",
                player.name.trim()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(player.id);
                self.players.insert(player.id, player);
                Ok(())
            }
        }
    }

    fn delete_player(&self, id: Uuid) -> bool {
        let Some((_, player)) = self.players.remove(&id) else {
            return false;
        };
        self.player_names
            .remove(&(player.session_id, player.name_key()));
        true
    }

    fn list_players(&self, session_id: Uuid) -> Vec<PlayerEntity> {
        let mut players: Vec<PlayerEntity> = self
            .players
            .iter()
            .filter(|entry| entry.session_id == session_id)
            .map(|entry| entry.value().clone())
            .collect();
        players.sort_by_key(|player| Reverse(player.created_at));
        players
    }

    fn list_matches(&self, session_id: Uuid) -> Vec<MatchLogEntity> {
        let mut matches: Vec<MatchLogEntity> = self
            .matches
            .iter()
            .filter(|entry| entry.session_id == session_id)
            .map(|entry| entry.value().clone())
            .collect();
        matches.sort_by_key(|entry| Reverse(entry.created_at));
        matches
    }
}

impl RecordStore for MemoryRecordStore {
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(self.inner.create_session(session)))
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let found = self.inner.sessions.get(&id).map(|entry| entry.value().clone());
        Box::pin(ready(Ok(found)))
    }

    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let found = self
            .inner
            .codes
            .get(&code)
            .map(|entry| *entry.value())
            .and_then(|id| self.inner.sessions.get(&id).map(|entry| entry.value().clone()));
        Box::pin(ready(Ok(found)))
    }

    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(ready(Ok(self.inner.delete_session(id))))
    }

    fn list_players(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        Box::pin(ready(Ok(self.inner.list_players(session_id))))
    }

    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(self.inner.create_player(player)))
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        Box::pin(ready(Ok(self.inner.delete_player(id))))
    }

    fn list_matches(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchLogEntity>>> {
        Box::pin(ready(Ok(self.inner.list_matches(session_id))))
    }

    fn create_match(&self, entry: MatchLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.matches.insert(entry.id, entry);
        Box::pin(ready(Ok(())))
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(ready(Ok(())))
    }
}
