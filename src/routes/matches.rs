use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::match_log::{CreateMatchRequest, MatchLogResponse},
    error::AppError,
    services::match_service,
    state::SharedState,
};

/// Routes exposing the match log of a session.
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/sessions/{id}/matches",
        get(list_matches).post(record_match),
    )
}

/// List finished matches, newest first.
#[utoipa::path(
    get,
    path = "/sessions/{id}/matches",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Match log", body = [MatchLogResponse]))
)]
pub async fn list_matches(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MatchLogResponse>>, AppError> {
    Ok(Json(match_service::list_matches(&state, id).await?))
}

/// Append a finished match to the log.
#[utoipa::path(
    post,
    path = "/sessions/{id}/matches",
    tag = "matches",
    params(("id" = String, Path, description = "Identifier of the session")),
    request_body = CreateMatchRequest,
    responses((status = 201, description = "Match recorded", body = MatchLogResponse))
)]
pub async fn record_match(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CreateMatchRequest>>,
) -> Result<(StatusCode, Json<MatchLogResponse>), AppError> {
    let entry = match_service::record_match(&state, id, payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
