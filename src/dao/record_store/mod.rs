pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{MatchLogEntity, PlayerEntity, SessionEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for sessions, players and match logs.
///
/// Deleting a session cascades to its players and match logs.
pub trait RecordStore: Send + Sync {
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_players(&self, session_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_matches(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchLogEntity>>>;
    fn create_match(&self, entry: MatchLogEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
