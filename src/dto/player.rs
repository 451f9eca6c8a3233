use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerEntity,
    dto::{format_system_time, validation::validate_display_name},
    state::live::PlayerSnapshot,
};

/// Payload used to register a player in a session.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreatePlayerRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
    #[serde(default)]
    pub is_goalkeeper: bool,
}

/// Registered player as exposed over REST.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlayerResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub name: String,
    pub is_goalkeeper: bool,
    pub created_at: String,
}

impl From<PlayerEntity> for PlayerResponse {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            name: value.name,
            is_goalkeeper: value.is_goalkeeper,
            created_at: format_system_time(value.created_at),
        }
    }
}

impl From<&PlayerResponse> for PlayerSnapshot {
    fn from(value: &PlayerResponse) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            is_goalkeeper: value.is_goalkeeper,
        }
    }
}
