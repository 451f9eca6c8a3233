use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::MatchLogEntity,
    dto::match_log::{CreateMatchRequest, MatchLogResponse},
    error::ServiceError,
    services::session_service::ensure_session,
    state::SharedState,
};

/// Match logs of a session, newest first.
pub async fn list_matches(
    state: &SharedState,
    session_id: Uuid,
) -> Result<Vec<MatchLogResponse>, ServiceError> {
    ensure_session(state, session_id).await?;
    let store = state.require_record_store().await?;
    let matches = store.list_matches(session_id).await?;
    Ok(matches.into_iter().map(Into::into).collect())
}

/// Append a finished match to the session log.
pub async fn record_match(
    state: &SharedState,
    session_id: Uuid,
    request: CreateMatchRequest,
) -> Result<MatchLogResponse, ServiceError> {
    ensure_session(state, session_id).await?;
    let store = state.require_record_store().await?;

    let entity = MatchLogEntity {
        id: Uuid::new_v4(),
        session_id,
        team_a: request.team_a,
        team_b: request.team_b,
        score_a: request.score_a,
        score_b: request.score_b,
        duration_seconds: request.duration_seconds,
        winner: request.winner,
        created_at: SystemTime::now(),
    };
    store.create_match(entity.clone()).await?;
    info!(
        session_id = %session_id,
        score_a = entity.score_a,
        score_b = entity.score_b,
        winner = ?entity.winner,
        "match recorded"
    );
    Ok(entity.into())
}
