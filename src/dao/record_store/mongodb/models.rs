use mongodb::bson::{self, DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::models::{MatchLogEntity, PlayerEntity, SessionEntity},
    state::live::Outcome,
};

fn to_bson(id: Uuid) -> bson::Uuid {
    bson::Uuid::from_bytes(id.into_bytes())
}

fn from_bson(id: bson::Uuid) -> Uuid {
    Uuid::from_bytes(id.bytes())
}

pub fn doc_id(id: Uuid) -> Document {
    doc! { "_id": to_bson(id) }
}

pub fn by_session(session_id: Uuid) -> Document {
    doc! { "session_id": to_bson(session_id) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    code: String,
    name: String,
    created_at: DateTime,
}

impl From<SessionEntity> for MongoSessionDocument {
    fn from(value: SessionEntity) -> Self {
        Self {
            id: to_bson(value.id),
            code: value.code,
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoSessionDocument> for SessionEntity {
    fn from(value: MongoSessionDocument) -> Self {
        Self {
            id: from_bson(value.id),
            code: value.code,
            name: value.name,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    session_id: bson::Uuid,
    name: String,
    /// Lowercased trimmed name backing the per-session unique index.
    name_key: String,
    is_goalkeeper: bool,
    created_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            name_key: value.name_key(),
            id: to_bson(value.id),
            session_id: to_bson(value.session_id),
            name: value.name,
            is_goalkeeper: value.is_goalkeeper,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: from_bson(value.id),
            session_id: from_bson(value.session_id),
            name: value.name,
            is_goalkeeper: value.is_goalkeeper,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id")]
    id: bson::Uuid,
    session_id: bson::Uuid,
    team_a: Vec<String>,
    team_b: Vec<String>,
    score_a: u32,
    score_b: u32,
    duration_seconds: u32,
    winner: Outcome,
    created_at: DateTime,
}

impl From<MatchLogEntity> for MongoMatchDocument {
    fn from(value: MatchLogEntity) -> Self {
        Self {
            id: to_bson(value.id),
            session_id: to_bson(value.session_id),
            team_a: value.team_a,
            team_b: value.team_b,
            score_a: value.score_a,
            score_b: value.score_b,
            duration_seconds: value.duration_seconds,
            winner: value.winner,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoMatchDocument> for MatchLogEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            id: from_bson(value.id),
            session_id: from_bson(value.session_id),
            team_a: value.team_a,
            team_b: value.team_b,
            score_a: value.score_a,
            score_b: value.score_b,
            duration_seconds: value.duration_seconds,
            winner: value.winner,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn player_document_carries_name_key() {
        let entity = PlayerEntity {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            name: "  Zico ".into(),
            is_goalkeeper: true,
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        };
        let document = MongoPlayerDocument::from(entity.clone());
        assert_eq!(document.name_key, "zico");
        assert_eq!(PlayerEntity::from(document), entity);
    }

    #[test]
    fn ids_are_stored_as_binary_uuids() {
        let id = Uuid::new_v4();
        let filter = doc_id(id);
        assert!(matches!(filter.get("_id"), Some(bson::Bson::Binary(_))));
    }
}
