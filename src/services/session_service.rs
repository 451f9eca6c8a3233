use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{models::SessionEntity, storage::StorageError},
    dto::{
        session::{CreateSessionRequest, SessionResponse},
        timer::TimerResponse,
    },
    error::ServiceError,
    state::{SharedState, session_code::SessionCode},
};

/// Open a new session under a freshly drawn join code.
///
/// Codes are drawn at random and retried on collision up to the configured
/// number of attempts.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<SessionResponse, ServiceError> {
    let store = state.require_record_store().await?;
    let name = request.name.trim().to_owned();
    let attempts = state.config().session_code_attempts();

    for attempt in 1..=attempts {
        let code = SessionCode::generate(&mut rand::rng());
        let entity = SessionEntity {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.clone(),
            created_at: SystemTime::now(),
        };

        match store.create_session(entity.clone()).await {
            Ok(()) => {
                info!(session_id = %entity.id, code = %entity.code, "session created");
                return Ok(SessionResponse::from_entity(
                    entity,
                    state.config().default_settings(),
                ));
            }
            Err(StorageError::Conflict { .. }) => {
                debug!(attempt, code = %entity.code, "session code collision; drawing another");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::CodesExhausted { attempts })
}

/// Look a session up by its (case-insensitive) join code.
pub async fn get_session_by_code(
    state: &SharedState,
    raw_code: &str,
) -> Result<SessionResponse, ServiceError> {
    let code = SessionCode::parse(raw_code)?;
    let store = state.require_record_store().await?;
    let Some(entity) = store.find_session_by_code(code.clone().into()).await? else {
        return Err(ServiceError::NotFound(format!("session `{code}` not found")));
    };
    Ok(SessionResponse::from_entity(
        entity,
        state.config().default_settings(),
    ))
}

/// Delete a session together with its players and match logs.
///
/// A live group using the same code is left alone and keeps relaying.
pub async fn delete_session(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_record_store().await?;
    if !store.delete_session(id).await? {
        return Err(ServiceError::NotFound(format!("session `{id}` not found")));
    }
    info!(session_id = %id, "session deleted");
    Ok(())
}

/// Current clock of a live session group as held by its Timer Authority.
pub async fn session_timer(
    state: &SharedState,
    raw_code: &str,
) -> Result<TimerResponse, ServiceError> {
    let code = SessionCode::parse(raw_code)?;
    let Some(timer) = state.hub().timer(&code).await else {
        return Err(ServiceError::NotFound(format!(
            "session `{code}` has no running clock"
        )));
    };
    Ok(TimerResponse {
        remaining_seconds: state.hub().remaining(&timer),
        code: code.into(),
        timer,
    })
}

/// Fail with [`ServiceError::NotFound`] unless the session exists.
pub(crate) async fn ensure_session(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_record_store().await?;
    match store.find_session(id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::NotFound(format!("session `{id}` not found"))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::{BoxFuture, ready};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{MatchLogEntity, PlayerEntity},
            record_store::{RecordStore, memory::MemoryRecordStore},
            storage::StorageResult,
        },
        state::{AppState, broadcaster::Participant, live::{LiveMatchState, MatchPhase}},
    };

    async fn ready_state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state
            .install_record_store(Arc::new(MemoryRecordStore::new()))
            .await;
        state
    }

    #[tokio::test]
    async fn created_session_is_found_by_lowercase_code() {
        let state = ready_state().await;
        let created = create_session(&state, CreateSessionRequest { name: "  Quinta ".into() })
            .await
            .unwrap();
        assert_eq!(created.name, "Quinta");
        assert_eq!(created.settings, *state.config().default_settings());

        let found = get_session_by_code(&state, &created.code.to_lowercase())
            .await
            .unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn malformed_code_is_invalid_input() {
        let state = ready_state().await;
        let err = get_session_by_code(&state, "nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn degraded_mode_refuses_creation() {
        let state = AppState::new(AppConfig::default());
        let err = create_session(&state, CreateSessionRequest { name: "Quinta".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    /// Store on which every join code is already taken.
    struct SaturatedCodes;

    fn done<T: Send + 'static>(value: T) -> BoxFuture<'static, StorageResult<T>> {
        Box::pin(ready(Ok(value)))
    }

    impl RecordStore for SaturatedCodes {
        fn create_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(ready(Err(StorageError::conflict(format!(
                "session code `{}` already exists",
                session.code
            )))))
        }
        fn find_session(&self, _: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
            done(None)
        }
        fn find_session_by_code(
            &self,
            _: String,
        ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
            done(None)
        }
        fn delete_session(&self, _: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            done(false)
        }
        fn list_players(&self, _: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
            done(Vec::new())
        }
        fn create_player(&self, _: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
            done(())
        }
        fn delete_player(&self, _: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            done(false)
        }
        fn list_matches(&self, _: Uuid) -> BoxFuture<'static, StorageResult<Vec<MatchLogEntity>>> {
            done(Vec::new())
        }
        fn create_match(&self, _: MatchLogEntity) -> BoxFuture<'static, StorageResult<()>> {
            done(())
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            done(())
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            done(())
        }
    }

    #[tokio::test]
    async fn exhausted_codes_report_attempts() {
        let state = AppState::new(AppConfig::default());
        state.install_record_store(Arc::new(SaturatedCodes)).await;

        let err = create_session(&state, CreateSessionRequest { name: "Quinta".into() })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::CodesExhausted { attempts } if attempts == state.config().session_code_attempts()
        ));
    }

    #[tokio::test]
    async fn deleting_twice_reports_not_found() {
        let state = ready_state().await;
        let created = create_session(&state, CreateSessionRequest { name: "Quinta".into() })
            .await
            .unwrap();
        delete_session(&state, created.id).await.unwrap();
        let err = delete_session(&state, created.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn timer_view_reflects_the_live_group() {
        let state = ready_state().await;
        assert!(matches!(
            session_timer(&state, "ABC123").await,
            Err(ServiceError::NotFound(_))
        ));

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        state.hub().join(Participant { id, tx }, "abc123");
        let mut snapshot = LiveMatchState::default();
        snapshot.phase = MatchPhase::Playing;
        snapshot.timer = 420;
        state.hub().publish(id, "ABC123", snapshot, false);

        let view = session_timer(&state, "abc123").await.unwrap();
        assert_eq!(view.code, "ABC123");
        assert!(view.timer.is_running);
        assert_eq!(view.remaining_seconds, 420);
    }
}
