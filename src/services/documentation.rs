use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Pelada Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sessions::create_session,
        crate::routes::sessions::get_session_by_code,
        crate::routes::sessions::get_session_timer,
        crate::routes::sessions::delete_session,
        crate::routes::players::list_players,
        crate::routes::players::create_player,
        crate::routes::players::delete_player,
        crate::routes::matches::list_matches,
        crate::routes::matches::record_match,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::SessionResponse,
            crate::dto::player::CreatePlayerRequest,
            crate::dto::player::PlayerResponse,
            crate::dto::match_log::CreateMatchRequest,
            crate::dto::match_log::MatchLogResponse,
            crate::dto::timer::TimerResponse,
            crate::state::live::MatchSettings,
            crate::state::live::WinCondition,
            crate::state::live::Outcome,
            crate::state::timer::SessionTimer,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Session lifecycle and join codes"),
        (name = "players", description = "Player registry of a session"),
        (name = "matches", description = "Finished match log"),
        (name = "live", description = "WebSocket relay of live match state"),
    )
)]
pub struct ApiDoc;
