use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::timer::SessionTimer;

/// Read-only view of a session clock.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TimerResponse {
    pub code: String,
    /// Clock record held by the server.
    pub timer: SessionTimer,
    /// Seconds left at the time of the request.
    pub remaining_seconds: u32,
}
