use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        session::{CreateSessionRequest, SessionResponse},
        timer::TimerResponse,
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Routes handling session creation, lookup and deletion.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/by-code/{code}", get(get_session_by_code))
        .route("/sessions/by-code/{code}/timer", get(get_session_timer))
        .route("/sessions/{id}", delete(delete_session))
}

/// Open a new session and allocate its join code.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Invalid name"),
        (status = 503, description = "Record store unavailable")
    )
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = session_service::create_session(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Find a session from the join code typed on another device.
#[utoipa::path(
    get,
    path = "/sessions/by-code/{code}",
    tag = "sessions",
    params(("code" = String, Path, description = "Join code, case-insensitive")),
    responses(
        (status = 200, description = "Session", body = SessionResponse),
        (status = 404, description = "Unknown code")
    )
)]
pub async fn get_session_by_code(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    Ok(Json(
        session_service::get_session_by_code(&state, &code).await?,
    ))
}

/// Read the clock the server holds for a live session.
#[utoipa::path(
    get,
    path = "/sessions/by-code/{code}/timer",
    tag = "sessions",
    params(("code" = String, Path, description = "Join code, case-insensitive")),
    responses(
        (status = 200, description = "Session clock", body = TimerResponse),
        (status = 404, description = "No clock for this code yet")
    )
)]
pub async fn get_session_timer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<TimerResponse>, AppError> {
    Ok(Json(session_service::session_timer(&state, &code).await?))
}

/// Delete a session with its players and match log.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Identifier of the session to delete")),
    responses(
        (status = 204, description = "Session deleted"),
        (status = 404, description = "Unknown session")
    )
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    session_service::delete_session(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
