use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::MatchLogEntity,
    dto::{format_system_time, validation::validate_roster},
    state::live::{LiveMatchState, Outcome, PlayerSnapshot},
};

/// Finished match submitted by the organizer's device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateMatchRequest {
    #[validate(custom(function = "validate_roster"))]
    pub team_a: Vec<String>,
    #[validate(custom(function = "validate_roster"))]
    pub team_b: Vec<String>,
    pub score_a: u32,
    pub score_b: u32,
    pub duration_seconds: u32,
    pub winner: Outcome,
}

impl CreateMatchRequest {
    /// Draft a log entry from the live state right before rotation.
    pub fn draft(state: &LiveMatchState, winner: Outcome, remaining_secs: u32) -> Self {
        let names = |team: &[PlayerSnapshot]| team.iter().map(|p| p.name.clone()).collect();
        Self {
            team_a: names(&state.team_a),
            team_b: names(&state.team_b),
            score_a: state.score_a,
            score_b: state.score_b,
            duration_seconds: state
                .settings
                .match_duration_secs()
                .saturating_sub(remaining_secs),
            winner,
        }
    }
}

/// Logged match as exposed over REST.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MatchLogResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub team_a: Vec<String>,
    pub team_b: Vec<String>,
    pub score_a: u32,
    pub score_b: u32,
    pub duration_seconds: u32,
    pub winner: Outcome,
    pub created_at: String,
}

impl From<MatchLogEntity> for MatchLogResponse {
    fn from(value: MatchLogEntity) -> Self {
        Self {
            id: value.id,
            session_id: value.session_id,
            team_a: value.team_a,
            team_b: value.team_b,
            score_a: value.score_a,
            score_b: value.score_b,
            duration_seconds: value.duration_seconds,
            winner: value.winner,
            created_at: format_system_time(value.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::state::live::MatchSettings;

    #[test]
    fn draft_measures_elapsed_time() {
        let mut state = LiveMatchState::new(MatchSettings::default());
        state.team_a.push(PlayerSnapshot {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            is_goalkeeper: false,
        });
        state.score_a = 2;

        let draft = CreateMatchRequest::draft(&state, Outcome::A, 150);
        assert_eq!(draft.team_a, ["Ana"]);
        assert!(draft.team_b.is_empty());
        assert_eq!(draft.duration_seconds, 450);
        assert_eq!(draft.score_a, 2);
    }

    #[test]
    fn winner_uses_wire_names() {
        let value = serde_json::to_value(Outcome::Draw).unwrap();
        assert_eq!(value, serde_json::json!("DRAW"));
    }
}
