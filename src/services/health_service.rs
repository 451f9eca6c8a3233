use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the record store and report whether the backend runs degraded.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.record_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "record store health check failed");
            }
        }
        None => warn!("record store unavailable (degraded mode)"),
    }

    let live_sessions = state.hub().group_count();
    if state.is_degraded().await {
        HealthResponse::degraded(live_sessions)
    } else {
        HealthResponse::ok(live_sessions)
    }
}
