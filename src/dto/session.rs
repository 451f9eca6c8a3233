use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::SessionEntity,
    dto::{format_system_time, validation::validate_display_name},
    state::live::MatchSettings,
};

/// Payload used to open a new pelada session.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    #[validate(custom(function = "validate_display_name"))]
    pub name: String,
}

/// Session as exposed over REST.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    /// Join code shared with the other devices of the session.
    pub code: String,
    pub name: String,
    pub created_at: String,
    /// Match rules a fresh client should start from.
    pub settings: MatchSettings,
}

impl SessionResponse {
    /// Project a stored session together with the configured default rules.
    pub fn from_entity(entity: SessionEntity, settings: &MatchSettings) -> Self {
        Self {
            id: entity.id,
            code: entity.code,
            name: entity.name,
            created_at: format_system_time(entity.created_at),
            settings: settings.clone(),
        }
    }
}
