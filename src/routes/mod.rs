use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

pub mod health;
pub mod matches;
pub mod players;
pub mod sessions;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sessions::router())
        .merge(players::router())
        .merge(matches::router())
        .merge(websocket::router());

    api_router.merge(docs_router()).with_state(state)
}

/// Swagger UI at `/docs` over the generated OpenAPI document.
fn docs_router() -> Router<SharedState> {
    SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into()
}
