use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::player::{CreatePlayerRequest, PlayerResponse},
    error::AppError,
    services::player_service,
    state::SharedState,
};

/// Routes managing the player registry of a session.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/sessions/{id}/players",
            get(list_players).post(create_player),
        )
        .route("/players/{id}", delete(delete_player))
}

/// List the players of a session, newest first.
#[utoipa::path(
    get,
    path = "/sessions/{id}/players",
    tag = "players",
    params(("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Players", body = [PlayerResponse]))
)]
pub async fn list_players(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PlayerResponse>>, AppError> {
    Ok(Json(player_service::list_players(&state, id).await?))
}

/// Register a player in a session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/players",
    tag = "players",
    params(("id" = String, Path, description = "Identifier of the session")),
    request_body = CreatePlayerRequest,
    responses(
        (status = 201, description = "Player registered", body = PlayerResponse),
        (status = 400, description = "Blank or duplicate name")
    )
)]
pub async fn create_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CreatePlayerRequest>>,
) -> Result<(StatusCode, Json<PlayerResponse>), AppError> {
    let player = player_service::create_player(&state, id, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// Remove a registered player.
#[utoipa::path(
    delete,
    path = "/players/{id}",
    tag = "players",
    params(("id" = String, Path, description = "Identifier of the player")),
    responses(
        (status = 204, description = "Player removed"),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn delete_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    player_service::delete_player(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
