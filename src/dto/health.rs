use serde::Serialize;
use utoipa::ToSchema;

/// Whether REST persistence is currently served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything is served.
    Ok,
    /// Record store missing or unhealthy; live relay still works.
    Degraded,
}

/// Body of `GET /healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Persistence status.
    pub status: HealthStatus,
    /// Session groups currently relaying live state.
    pub live_sessions: usize,
}

impl HealthResponse {
    /// Healthy backend.
    pub fn ok(live_sessions: usize) -> Self {
        Self {
            status: HealthStatus::Ok,
            live_sessions,
        }
    }

    /// Backend without a usable record store.
    pub fn degraded(live_sessions: usize) -> Self {
        Self {
            status: HealthStatus::Degraded,
            live_sessions,
        }
    }
}
