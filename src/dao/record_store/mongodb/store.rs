use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::doc,
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoMatchDocument, MongoPlayerDocument, MongoSessionDocument, by_session, doc_id},
};
use crate::dao::{
    models::{MatchLogEntity, PlayerEntity, SessionEntity},
    record_store::RecordStore,
    storage::StorageResult,
};

const SESSION_COLLECTION: &str = "sessions";
const PLAYER_COLLECTION: &str = "players";
const MATCH_COLLECTION: &str = "matches";

/// [`RecordStore`] backed by a MongoDB database.
#[derive(Clone)]
pub struct MongoRecordStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRecordStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let unique = |name: &str| {
            IndexOptions::builder()
                .name(Some(name.to_owned()))
                .unique(Some(true))
                .build()
        };

        self.sessions()
            .await
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "code": 1 })
                    .options(unique("session_code_idx"))
                    .build(),
            )
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SESSION_COLLECTION,
                index: "code",
                source,
            })?;

        self.players()
            .await
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "session_id": 1, "name_key": 1 })
                    .options(unique("player_name_idx"))
                    .build(),
            )
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_COLLECTION,
                index: "session_id,name_key",
                source,
            })?;

        self.matches()
            .await
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "session_id": 1, "created_at": -1 })
                    .build(),
            )
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MATCH_COLLECTION,
                index: "session_id,created_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn sessions(&self) -> Collection<MongoSessionDocument> {
        self.database().await.collection(SESSION_COLLECTION)
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        self.database().await.collection(PLAYER_COLLECTION)
    }

    async fn matches(&self) -> Collection<MongoMatchDocument> {
        self.database().await.collection(MATCH_COLLECTION)
    }

    async fn create_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id;
        let code = session.code.clone();
        let document: MongoSessionDocument = session.into();
        self.sessions()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                MongoDaoError::from_insert(
                    SESSION_COLLECTION,
                    id,
                    || format!("session code `{code}` already in use"),
                    source,
                )
            })?;
        Ok(())
    }

    async fn find_session(&self, id: Uuid) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: SESSION_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn find_session_by_code(&self, code: String) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .sessions()
            .await
            .find_one(doc! { "code": code })
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: SESSION_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn delete_session(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .sessions()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: SESSION_COLLECTION,
                id,
                source,
            })?;
        if result.deleted_count == 0 {
            return Ok(false);
        }

        self.players()
            .await
            .delete_many(by_session(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: PLAYER_COLLECTION,
                id,
                source,
            })?;
        self.matches()
            .await
            .delete_many(by_session(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: MATCH_COLLECTION,
                id,
                source,
            })?;
        Ok(true)
    }

    async fn list_players(&self, session_id: Uuid) -> MongoResult<Vec<PlayerEntity>> {
        let documents: Vec<MongoPlayerDocument> = self
            .players()
            .await
            .find(by_session(session_id))
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: PLAYER_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: PLAYER_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn create_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let id = player.id;
        let name = player.name.trim().to_owned();
        let document: MongoPlayerDocument = player.into();
        self.players()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                MongoDaoError::from_insert(
                    PLAYER_COLLECTION,
                    id,
                    || format!("player `{name}` already exists in this session"),
                    source,
                )
            })?;
        Ok(())
    }

    async fn delete_player(&self, id: Uuid) -> MongoResult<bool> {
        let result = self
            .players()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection: PLAYER_COLLECTION,
                id,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_matches(&self, session_id: Uuid) -> MongoResult<Vec<MatchLogEntity>> {
        let documents: Vec<MongoMatchDocument> = self
            .matches()
            .await
            .find(by_session(session_id))
            .sort(doc! { "created_at": -1 })
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: MATCH_COLLECTION,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Query {
                collection: MATCH_COLLECTION,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn create_match(&self, entry: MatchLogEntity) -> MongoResult<()> {
        let id = entry.id;
        let document: MongoMatchDocument = entry.into();
        self.matches()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MATCH_COLLECTION,
                id,
                source,
            })?;
        Ok(())
    }
}

impl RecordStore for MongoRecordStore {
    fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_session(session).await.map_err(Into::into) })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn find_session_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_session_by_code(code).await.map_err(Into::into) })
    }

    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_session(id).await.map_err(Into::into) })
    }

    fn list_players(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players(session_id).await.map_err(Into::into) })
    }

    fn create_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_player(player).await.map_err(Into::into) })
    }

    fn delete_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_player(id).await.map_err(Into::into) })
    }

    fn list_matches(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<MatchLogEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_matches(session_id).await.map_err(Into::into) })
    }

    fn create_match(&self, entry: MatchLogEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_match(entry).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
