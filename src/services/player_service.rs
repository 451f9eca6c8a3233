use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, normalize_name},
    dto::player::{CreatePlayerRequest, PlayerResponse},
    error::ServiceError,
    services::session_service::ensure_session,
    state::SharedState,
};

/// Players of a session, newest first.
pub async fn list_players(
    state: &SharedState,
    session_id: Uuid,
) -> Result<Vec<PlayerResponse>, ServiceError> {
    ensure_session(state, session_id).await?;
    let store = state.require_record_store().await?;
    let players = store.list_players(session_id).await?;
    Ok(players.into_iter().map(Into::into).collect())
}

/// Register a player. Names are unique per session, ignoring case and surrounding blanks.
pub async fn create_player(
    state: &SharedState,
    session_id: Uuid,
    request: CreatePlayerRequest,
) -> Result<PlayerResponse, ServiceError> {
    ensure_session(state, session_id).await?;
    let store = state.require_record_store().await?;

    let name = request.name.trim().to_owned();
    let key = normalize_name(&name);
    let existing = store.list_players(session_id).await?;
    if existing.iter().any(|player| player.name_key() == key) {
        return Err(ServiceError::InvalidInput(format!(
            "player `{name}` already exists in this session"
        )));
    }

    let entity = PlayerEntity {
        id: Uuid::new_v4(),
        session_id,
        name,
        is_goalkeeper: request.is_goalkeeper,
        created_at: SystemTime::now(),
    };
    store.create_player(entity.clone()).await?;
    info!(session_id = %session_id, player_id = %entity.id, "player registered");
    Ok(entity.into())
}

/// Remove a registered player. Live rosters are not touched.
pub async fn delete_player(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_record_store().await?;
    if !store.delete_player(id).await? {
        return Err(ServiceError::NotFound(format!("player `{id}` not found")));
    }
    Ok(())
}
